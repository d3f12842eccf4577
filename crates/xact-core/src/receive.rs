//! Receiver and arbiter role.

use crate::contract::{ActionReceiver, CallContext};
use crate::error::{Result, XactError};
use crate::event::Event;
use crate::host::Host;
use crate::ledger::fingerprint;
use crate::participant::Participant;
use crate::resolver::Resolver;
use crate::types::{Action, Address, Leg, Role};
use tracing::debug;

impl Participant {
    /// Which legs of `action` this object plays.
    fn legs(&self, resolver: &Resolver, action: &Action) -> (bool, bool) {
        let is_target = resolver.resolves_to_self(action.to().address, Role::Receiver);
        let is_arbiter = resolver.resolves_to_self(action.state(), Role::Receiver);
        (is_target, is_arbiter)
    }

    fn check_caller(
        &self,
        resolver: &Resolver,
        ctx: &CallContext,
        action: &Action,
        arbiter_only: bool,
    ) -> Result<()> {
        let from = action.from().address;
        if ctx.caller == from || ctx.caller == resolver.resolve_sender(from) {
            return Ok(());
        }
        if arbiter_only {
            let to = action.to().address;
            if ctx.caller == to || ctx.caller == resolver.resolve_receiver(to) {
                return Ok(());
            }
        }
        Err(XactError::InvalidOrigin(ctx.caller))
    }

    /// Ask the initiator whether `counter` and the local fingerprint are the
    /// pair its latest dispatch recorded.
    fn validate(
        &self,
        host: &Host,
        resolver: &Resolver,
        action: &Action,
        counter: u64,
    ) -> Result<()> {
        if counter == 0 {
            return Err(XactError::InvalidAction(
                "no dispatch counter to validate".to_string(),
            ));
        }
        let initiator = resolver.resolve_sender(action.from().address);
        let expected = fingerprint(action, counter);
        let valid = host
            .check_validity(initiator, &expected, counter)
            .map_err(|e| XactError::InvalidAction(format!("initiator unreachable: {e}")))?;
        if !valid {
            return Err(XactError::InvalidAction(format!(
                "{initiator} did not record counter {counter} for this action"
            )));
        }
        Ok(())
    }

    fn receive(&self, host: &Host, ctx: &CallContext, action: &Action, counter: u64) -> Result<()> {
        let selector = action.selector();
        if !self.receivable.contains(selector) {
            return Err(XactError::UnsupportedAction(selector));
        }

        let resolver = self.resolver();
        let (is_target, is_arbiter) = self.legs(&resolver, action);
        if !is_target && !is_arbiter {
            return Err(XactError::InvalidReceiver(self.address));
        }
        self.check_caller(&resolver, ctx, action, !is_target)?;

        if is_arbiter {
            self.validate(host, &resolver, action, counter)?;
        }

        let leg = if is_target { Leg::Target } else { Leg::Arbiter };
        debug!(object = %self.address, selector = %selector, leg = %leg, counter, "action received");
        self.handler.on_receive(host, ctx, action, leg)?;

        if is_target && !is_arbiter {
            let arbiter = resolver.resolve_receiver(action.state());
            if arbiter != self.address && host.is_live(arbiter) {
                host.call_receive(self.address, arbiter, action, counter, ctx.value)
                    .map_err(XactError::surfaced)?;
            }
        }

        host.emit(
            self.address,
            Event::ActionReceived {
                action: action.clone(),
                counter,
                leg,
                via_controller: false,
            },
        );
        Ok(())
    }

    fn receive_as_controller(
        &self,
        host: &Host,
        ctx: &CallContext,
        action: &Action,
        counter: u64,
    ) -> Result<()> {
        let resolver = self.resolver();
        let leg = if resolver.resolves_to_self(action.to().address, Role::Receiver) {
            Leg::Target
        } else {
            Leg::Arbiter
        };
        debug!(object = %self.address, controller = %ctx.caller, leg = %leg, "controller relay received");
        self.handler.on_receive(host, ctx, action, leg)?;
        host.emit(
            self.address,
            Event::ActionReceived {
                action: action.clone(),
                counter,
                leg,
                via_controller: true,
            },
        );
        Ok(())
    }

    fn is_controller_call(&self, caller: Address, action: &Action) -> bool {
        self.is_approved_controller(caller, action.selector())
    }
}

impl ActionReceiver for Participant {
    fn on_action_received(
        &self,
        host: &Host,
        ctx: &CallContext,
        action: &Action,
        counter: u64,
    ) -> Result<()> {
        if self.is_controller_call(ctx.caller, action) {
            self.receive_as_controller(host, ctx, action, counter)
        } else {
            self.receive(host, ctx, action, counter)
        }
    }

    fn receivable_actions(&self) -> Vec<String> {
        self.receivable.names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ActionSender;
    use crate::types::{ObjectRef, Selector};
    use std::rc::Rc;

    const PARRY: Selector = Selector::from_u32(0x9A11);

    fn addr(n: u64) -> Address {
        Address::from_low_u64(n)
    }

    fn parry(from: Address, to: Address, state: Address) -> Action {
        Action::new(
            PARRY,
            addr(2),
            ObjectRef::object(from),
            ObjectRef::object(to),
            state,
            vec![1, 2, 3],
        )
        .unwrap()
    }

    fn receiver(address: Address) -> Rc<Participant> {
        Rc::new(
            Participant::builder(address, addr(1))
                .receivable_selector(PARRY, "parry")
                .build(),
        )
    }

    #[test]
    fn unsupported_selector() {
        let mut host = Host::new();
        let b = Rc::new(Participant::builder(addr(20), addr(1)).build());
        host.deploy(b).unwrap();
        let action = parry(addr(10), addr(20), Address::ZERO);
        let err = host
            .submit_receive(addr(10), addr(20), &action, 0, 0)
            .unwrap_err();
        assert!(matches!(err, XactError::UnsupportedAction(_)));
    }

    #[test]
    fn neither_target_nor_arbiter() {
        let mut host = Host::new();
        host.deploy(receiver(addr(20))).unwrap();
        let action = parry(addr(10), addr(21), addr(30));
        let err = host
            .submit_receive(addr(10), addr(20), &action, 0, 0)
            .unwrap_err();
        assert!(matches!(err, XactError::InvalidReceiver(a) if a == addr(20)));
    }

    #[test]
    fn target_accepts_call_from_initiator_only() {
        let mut host = Host::new();
        host.deploy(receiver(addr(20))).unwrap();
        let action = parry(addr(10), addr(20), Address::ZERO);

        let err = host
            .submit_receive(addr(11), addr(20), &action, 0, 0)
            .unwrap_err();
        assert!(matches!(err, XactError::InvalidOrigin(a) if a == addr(11)));

        let receipt = host
            .submit_receive(addr(10), addr(20), &action, 0, 0)
            .unwrap();
        assert!(matches!(
            receipt.events[0].event,
            Event::ActionReceived { leg: Leg::Target, via_controller: false, .. }
        ));
    }

    #[test]
    fn arbiter_rejects_zero_counter() {
        let mut host = Host::new();
        host.deploy(receiver(addr(30))).unwrap();
        let action = parry(addr(10), addr(20), addr(30));
        let err = host
            .submit_receive(addr(20), addr(30), &action, 0, 0)
            .unwrap_err();
        assert!(matches!(err, XactError::InvalidAction(_)));
    }

    #[test]
    fn arbiter_rejects_unreachable_initiator() {
        let mut host = Host::new();
        host.deploy(receiver(addr(30))).unwrap();
        let action = parry(addr(10), addr(20), addr(30));
        let err = host
            .submit_receive(addr(20), addr(30), &action, 1, 0)
            .unwrap_err();
        assert!(matches!(err, XactError::InvalidAction(m) if m.contains("unreachable")));
    }

    #[test]
    fn controller_relay_skips_checks() {
        let mut host = Host::new();
        let c = receiver(addr(30));
        c.approve_controller(&host, addr(1), addr(9), PARRY).unwrap();
        host.deploy(c).unwrap();
        // Zero counter and an unknown initiator would both fail normally.
        let action = parry(addr(10), addr(20), addr(30));
        let receipt = host
            .submit_receive(addr(9), addr(30), &action, 0, 0)
            .unwrap();
        assert!(matches!(
            receipt.events[0].event,
            Event::ActionReceived { leg: Leg::Arbiter, via_controller: true, .. }
        ));
    }

    #[test]
    fn lists_receivable_actions() {
        let r = receiver(addr(30));
        assert_eq!(r.receivable_actions(), vec!["parry"]);
        assert!(r.sendable_actions().is_empty());
    }
}
