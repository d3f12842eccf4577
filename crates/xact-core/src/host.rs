//! Synchronous execution host.
//!
//! The host owns every deployed object, routes calls between them, moves
//! attached value, and collects emitted events. Each top-level call runs as
//! one atomic unit: object state, balances and the event log are
//! checkpointed first and restored if anything in the chain fails.

use crate::contract::{CallContext, Contract};
use crate::error::{Result, XactError};
use crate::event::{Event, EventRecord};
use crate::ledger::Fingerprint;
use crate::resolver::ProxyRegistry;
use crate::types::{Action, Address, Role};
use chrono::Utc;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{error, trace, warn};
use uuid::Uuid;

pub const DEFAULT_MAX_CALL_DEPTH: usize = 64;

// ---------------------------------------------------------------------------
// Receipt
// ---------------------------------------------------------------------------

/// Outcome of a successful atomic unit.
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub tx: Uuid,
    pub origin: Address,
    pub events: Vec<EventRecord>,
}

impl Receipt {
    pub fn events_of(&self, kind: &str) -> impl Iterator<Item = &EventRecord> {
        let kind = kind.to_string();
        self.events.iter().filter(move |r| r.event.kind() == kind)
    }
}

struct Checkpoint {
    objects: Vec<(Address, serde_json::Value)>,
    balances: BTreeMap<Address, u64>,
    events: usize,
    sequence: u64,
}

/// Decrements the call depth when a nested call returns, on every path.
struct Frame<'a> {
    depth: &'a Cell<usize>,
}

impl Drop for Frame<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

pub struct Host {
    objects: BTreeMap<Address, Rc<dyn Contract>>,
    registry: Rc<ProxyRegistry>,
    balances: RefCell<BTreeMap<Address, u64>>,
    events: RefCell<Vec<EventRecord>>,
    next_sequence: Cell<u64>,
    depth: Cell<usize>,
    max_call_depth: usize,
    /// Current atomic unit: (tx id, origin).
    unit: Cell<Option<(Uuid, Address)>>,
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}

impl Host {
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            registry: Rc::new(ProxyRegistry::new()),
            balances: RefCell::new(BTreeMap::new()),
            events: RefCell::new(Vec::new()),
            next_sequence: Cell::new(0),
            depth: Cell::new(0),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            unit: Cell::new(None),
        }
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Shared proxy registry objects can be wired to.
    pub fn registry(&self) -> Rc<ProxyRegistry> {
        Rc::clone(&self.registry)
    }

    // -----------------------------------------------------------------------
    // Objects
    // -----------------------------------------------------------------------

    pub fn deploy(&mut self, object: Rc<dyn Contract>) -> Result<()> {
        let address = object.address();
        if address.is_zero() {
            return Err(XactError::InvalidAddress(address.to_string()));
        }
        if self.objects.contains_key(&address) {
            return Err(XactError::ObjectExists(address));
        }
        self.objects.insert(address, object);
        Ok(())
    }

    pub fn object(&self, address: Address) -> Option<Rc<dyn Contract>> {
        self.objects.get(&address).cloned()
    }

    /// Whether a deployed object lives at `address`.
    pub fn is_live(&self, address: Address) -> bool {
        !address.is_zero() && self.objects.contains_key(&address)
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.objects.keys().copied().collect()
    }

    pub fn sendable_actions(&self, address: Address) -> Result<Vec<String>> {
        let object = self.object(address).ok_or(XactError::ObjectNotFound(address))?;
        let sender = object
            .as_sender()
            .ok_or(XactError::RoleNotImplemented(address, Role::Sender))?;
        Ok(sender.sendable_actions())
    }

    pub fn receivable_actions(&self, address: Address) -> Result<Vec<String>> {
        let object = self.object(address).ok_or(XactError::ObjectNotFound(address))?;
        let receiver = object
            .as_receiver()
            .ok_or(XactError::RoleNotImplemented(address, Role::Receiver))?;
        Ok(receiver.receivable_actions())
    }

    // -----------------------------------------------------------------------
    // Balances
    // -----------------------------------------------------------------------

    pub fn fund(&self, account: Address, amount: u64) -> Result<()> {
        let mut balances = self.balances.borrow_mut();
        let current = balances.get(&account).copied().unwrap_or(0);
        let funded = current
            .checked_add(amount)
            .ok_or(XactError::BalanceOverflow { account })?;
        balances.insert(account, funded);
        Ok(())
    }

    pub fn balance_of(&self, account: Address) -> u64 {
        self.balances.borrow().get(&account).copied().unwrap_or(0)
    }

    fn transfer(&self, from: Address, to: Address, amount: u64) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let mut balances = self.balances.borrow_mut();
        let available = balances.get(&from).copied().unwrap_or(0);
        if available < amount {
            return Err(XactError::InsufficientBalance {
                account: from,
                available,
                required: amount,
            });
        }
        if from == to {
            return Ok(());
        }
        let credited = balances
            .get(&to)
            .copied()
            .unwrap_or(0)
            .checked_add(amount)
            .ok_or(XactError::BalanceOverflow { account: to })?;
        balances.insert(from, available - amount);
        balances.insert(to, credited);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    pub fn emit(&self, emitter: Address, event: Event) {
        let tx = self.unit.get().map(|(tx, _)| tx).unwrap_or_else(Uuid::new_v4);
        let sequence = self.next_sequence.get();
        self.next_sequence.set(sequence + 1);
        trace!(tx = %tx, emitter = %emitter, kind = event.kind(), sequence, "event emitted");
        self.events.borrow_mut().push(EventRecord {
            tx,
            sequence,
            emitter,
            event,
            recorded_at: Utc::now(),
        });
    }

    pub fn events(&self) -> Vec<EventRecord> {
        self.events.borrow().clone()
    }

    // -----------------------------------------------------------------------
    // Atomic units
    // -----------------------------------------------------------------------

    /// Top-level dispatch: `origin` asks `initiator` to send `action`.
    pub fn submit(
        &self,
        origin: Address,
        initiator: Address,
        action: &Action,
        value: u64,
    ) -> Result<Receipt> {
        self.atomic(origin, |host| {
            host.call_send(origin, initiator, action, value)
        })
        .map(|(receipt, ())| receipt)
    }

    /// Top-level receive call, as made by a controller relaying hop by hop.
    pub fn submit_receive(
        &self,
        origin: Address,
        receiver: Address,
        action: &Action,
        counter: u64,
        value: u64,
    ) -> Result<Receipt> {
        self.atomic(origin, |host| {
            host.call_receive(origin, receiver, action, counter, value)
        })
        .map(|(receipt, ())| receipt)
    }

    /// Run `f` as one atomic unit opened by `origin`.
    pub fn transact<T>(&self, origin: Address, f: impl FnOnce(&Host) -> Result<T>) -> Result<T> {
        self.atomic(origin, f).map(|(_, out)| out)
    }

    fn atomic<T>(
        &self,
        origin: Address,
        f: impl FnOnce(&Host) -> Result<T>,
    ) -> Result<(Receipt, T)> {
        // Nested units fold into the enclosing one, which owns rollback.
        if let Some((tx, outer_origin)) = self.unit.get() {
            let start = self.events.borrow().len();
            let out = f(self)?;
            let events = self.events.borrow()[start..].to_vec();
            let receipt = Receipt {
                tx,
                origin: outer_origin,
                events,
            };
            return Ok((receipt, out));
        }

        let tx = Uuid::new_v4();
        let checkpoint = self.checkpoint()?;
        self.unit.set(Some((tx, origin)));
        let result = f(self);
        self.unit.set(None);

        match result {
            Ok(out) => {
                let events = self.events.borrow()[checkpoint.events..].to_vec();
                Ok((Receipt { tx, origin, events }, out))
            }
            Err(err) => {
                warn!(tx = %tx, origin = %origin, error = %err, "atomic unit failed, rolling back");
                self.rollback(checkpoint);
                Err(err)
            }
        }
    }

    fn checkpoint(&self) -> Result<Checkpoint> {
        let mut objects = Vec::with_capacity(self.objects.len());
        for (address, object) in &self.objects {
            objects.push((*address, object.snapshot()?));
        }
        Ok(Checkpoint {
            objects,
            balances: self.balances.borrow().clone(),
            events: self.events.borrow().len(),
            sequence: self.next_sequence.get(),
        })
    }

    fn rollback(&self, checkpoint: Checkpoint) {
        for (address, state) in checkpoint.objects {
            if let Some(object) = self.objects.get(&address) {
                if let Err(e) = object.restore(state) {
                    error!(object = %address, error = %e, "failed to restore object state");
                }
            }
        }
        *self.balances.borrow_mut() = checkpoint.balances;
        self.events.borrow_mut().truncate(checkpoint.events);
        self.next_sequence.set(checkpoint.sequence);
    }

    // -----------------------------------------------------------------------
    // Calls
    // -----------------------------------------------------------------------

    fn enter(&self) -> Result<Frame<'_>> {
        let depth = self.depth.get();
        if depth >= self.max_call_depth {
            return Err(XactError::CallDepthExceeded(self.max_call_depth));
        }
        self.depth.set(depth + 1);
        Ok(Frame { depth: &self.depth })
    }

    fn context(&self, caller: Address, value: u64) -> CallContext {
        let origin = self.unit.get().map(|(_, o)| o).unwrap_or(caller);
        CallContext {
            caller,
            origin,
            value,
        }
    }

    /// `caller` asks `target` to send `action`.
    pub fn call_send(
        &self,
        caller: Address,
        target: Address,
        action: &Action,
        value: u64,
    ) -> Result<()> {
        let _frame = self.enter()?;
        let object = self.object(target).ok_or(XactError::ObjectNotFound(target))?;
        let sender = object
            .as_sender()
            .ok_or(XactError::RoleNotImplemented(target, Role::Sender))?;
        self.transfer(caller, target, value)?;
        let ctx = self.context(caller, value);
        sender.send_action(self, &ctx, action)
    }

    /// `caller` delivers `action` to `target` with the initiator's counter.
    pub fn call_receive(
        &self,
        caller: Address,
        target: Address,
        action: &Action,
        counter: u64,
        value: u64,
    ) -> Result<()> {
        let _frame = self.enter()?;
        let object = self.object(target).ok_or(XactError::ObjectNotFound(target))?;
        let receiver = object
            .as_receiver()
            .ok_or(XactError::RoleNotImplemented(target, Role::Receiver))?;
        self.transfer(caller, target, value)?;
        let ctx = self.context(caller, value);
        receiver.on_action_received(self, &ctx, action, counter)
    }

    /// Read an initiator's integrity ledger.
    pub fn check_validity(
        &self,
        initiator: Address,
        fingerprint: &Fingerprint,
        counter: u64,
    ) -> Result<bool> {
        let object = self
            .object(initiator)
            .ok_or(XactError::ObjectNotFound(initiator))?;
        let sender = object
            .as_sender()
            .ok_or(XactError::RoleNotImplemented(initiator, Role::Sender))?;
        Ok(sender.check_validity(fingerprint, counter))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{ActionReceiver, LegacyObject};
    use crate::types::{ObjectRef, Selector};

    fn addr(n: u64) -> Address {
        Address::from_low_u64(n)
    }

    fn action() -> Action {
        Action::new(
            Selector::from_u32(0xABCD),
            addr(1),
            ObjectRef::object(addr(1)),
            ObjectRef::object(addr(20)),
            Address::ZERO,
            vec![],
        )
        .unwrap()
    }

    /// Counts receptions; fails on the configured count.
    struct Tally {
        address: Address,
        hits: RefCell<u64>,
        fail_at: Option<u64>,
        recurse: bool,
    }

    impl Tally {
        fn new(n: u64) -> Self {
            Self {
                address: addr(n),
                hits: RefCell::new(0),
                fail_at: None,
                recurse: false,
            }
        }
    }

    impl Contract for Tally {
        fn address(&self) -> Address {
            self.address
        }

        fn snapshot(&self) -> Result<serde_json::Value> {
            Ok(serde_json::json!(*self.hits.borrow()))
        }

        fn restore(&self, state: serde_json::Value) -> Result<()> {
            *self.hits.borrow_mut() = serde_json::from_value(state)?;
            Ok(())
        }

        fn as_receiver(&self) -> Option<&dyn ActionReceiver> {
            Some(self)
        }
    }

    impl ActionReceiver for Tally {
        fn on_action_received(
            &self,
            host: &Host,
            _ctx: &CallContext,
            action: &Action,
            counter: u64,
        ) -> Result<()> {
            let hits = {
                let mut hits = self.hits.borrow_mut();
                *hits += 1;
                *hits
            };
            host.emit(
                self.address,
                Event::ActionReceived {
                    action: action.clone(),
                    counter,
                    leg: crate::types::Leg::Target,
                    via_controller: false,
                },
            );
            if self.fail_at == Some(hits) {
                return Err(XactError::revert("tally overflow"));
            }
            if self.recurse {
                host.call_receive(self.address, self.address, action, counter, 0)?;
            }
            Ok(())
        }

        fn receivable_actions(&self) -> Vec<String> {
            vec!["tally".to_string()]
        }
    }

    #[test]
    fn deploy_rejects_duplicates_and_zero() {
        let mut host = Host::new();
        host.deploy(Rc::new(LegacyObject::new(addr(5)))).unwrap();
        assert!(matches!(
            host.deploy(Rc::new(LegacyObject::new(addr(5)))),
            Err(XactError::ObjectExists(_))
        ));
        assert!(matches!(
            host.deploy(Rc::new(LegacyObject::new(Address::ZERO))),
            Err(XactError::InvalidAddress(_))
        ));
        assert!(host.is_live(addr(5)));
        assert!(!host.is_live(addr(6)));
    }

    #[test]
    fn missing_role_is_reported() {
        let mut host = Host::new();
        host.deploy(Rc::new(LegacyObject::new(addr(5)))).unwrap();
        let err = host.submit(addr(1), addr(5), &action(), 0).unwrap_err();
        assert!(matches!(err, XactError::RoleNotImplemented(a, Role::Sender) if a == addr(5)));
        assert!(matches!(
            host.check_validity(addr(5), &Fingerprint::ZERO, 1),
            Err(XactError::RoleNotImplemented(_, Role::Sender))
        ));
        assert!(matches!(
            host.submit(addr(1), addr(6), &action(), 0),
            Err(XactError::ObjectNotFound(_))
        ));
    }

    #[test]
    fn failure_rolls_back_state_events_and_balances() {
        let mut host = Host::new();
        let tally = Rc::new(Tally {
            fail_at: Some(2),
            ..Tally::new(20)
        });
        host.deploy(tally.clone()).unwrap();
        host.fund(addr(1), 10).unwrap();

        let receipt = host.submit_receive(addr(1), addr(20), &action(), 0, 3).unwrap();
        assert_eq!(receipt.events.len(), 1);
        assert_eq!(receipt.events_of("action_received").count(), 1);
        assert_eq!(receipt.events_of("send_action").count(), 0);
        assert_eq!(host.balance_of(addr(20)), 3);

        let err = host.submit_receive(addr(1), addr(20), &action(), 0, 3).unwrap_err();
        assert_eq!(err.to_string(), "tally overflow");
        assert_eq!(*tally.hits.borrow(), 1);
        assert_eq!(host.events().len(), 1);
        assert_eq!(host.balance_of(addr(1)), 7);
        assert_eq!(host.balance_of(addr(20)), 3);
    }

    #[test]
    fn value_requires_balance() {
        let mut host = Host::new();
        host.deploy(Rc::new(Tally::new(20))).unwrap();
        let err = host.submit_receive(addr(1), addr(20), &action(), 0, 1).unwrap_err();
        assert!(matches!(
            err,
            XactError::InsufficientBalance { available: 0, required: 1, .. }
        ));
        assert!(host.events().is_empty());
    }

    #[test]
    fn value_that_would_overflow_the_receiver_is_refused() {
        let mut host = Host::new();
        host.deploy(Rc::new(Tally::new(20))).unwrap();
        host.fund(addr(20), u64::MAX).unwrap();
        host.fund(addr(1), 10).unwrap();

        let err = host.submit_receive(addr(1), addr(20), &action(), 0, 10).unwrap_err();
        assert!(matches!(err, XactError::BalanceOverflow { account } if account == addr(20)));
        assert_eq!(host.balance_of(addr(1)), 10);
        assert_eq!(host.balance_of(addr(20)), u64::MAX);
        assert!(host.events().is_empty());
    }

    #[test]
    fn funding_past_the_maximum_fails() {
        let host = Host::new();
        host.fund(addr(1), u64::MAX).unwrap();
        assert!(matches!(
            host.fund(addr(1), 1),
            Err(XactError::BalanceOverflow { account }) if account == addr(1)
        ));
        assert_eq!(host.balance_of(addr(1)), u64::MAX);
    }

    #[test]
    fn unbounded_recursion_hits_depth_limit() {
        let mut host = Host::new().with_max_call_depth(8);
        let tally = Rc::new(Tally {
            recurse: true,
            ..Tally::new(20)
        });
        host.deploy(tally.clone()).unwrap();
        let err = host.submit_receive(addr(1), addr(20), &action(), 0, 0).unwrap_err();
        assert!(matches!(err, XactError::CallDepthExceeded(8)));
        assert_eq!(*tally.hits.borrow(), 0);
        assert_eq!(host.depth.get(), 0);
    }

    #[test]
    fn events_share_the_unit_tx_id() {
        let mut host = Host::new();
        host.deploy(Rc::new(Tally::new(20))).unwrap();
        let receipt = host
            .transact(addr(1), |h| {
                h.call_receive(addr(1), addr(20), &action(), 0, 0)?;
                h.call_receive(addr(1), addr(20), &action(), 0, 0)
            })
            .map(|()| host.events())
            .unwrap();
        assert_eq!(receipt.len(), 2);
        assert_eq!(receipt[0].tx, receipt[1].tx);
        assert_eq!(receipt[0].sequence + 1, receipt[1].sequence);
    }
}
