//! The standard protocol object.
//!
//! A `Participant` speaks both roles: it initiates actions (see
//! `dispatch.rs`) and receives them as a target or arbiter (see
//! `receive.rs`). Business logic is plugged in through [`ActionHandler`].

use crate::actions::ActionSet;
use crate::capability::CapabilityStore;
use crate::contract::{ActionReceiver, ActionSender, CallContext, Contract};
use crate::controller::ControllerSet;
use crate::dispatch::Latch;
use crate::error::Result;
use crate::host::Host;
use crate::ledger::IntegrityLedger;
use crate::resolver::{AddressRegistry, Resolver};
use crate::types::{Action, Address, Leg, Role, Selector};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

// ---------------------------------------------------------------------------
// ActionHandler
// ---------------------------------------------------------------------------

/// Object-specific behaviour run once the protocol has accepted an action.
///
/// Reject with [`XactError::revert`](crate::error::XactError::revert); the
/// message reaches the dispatch caller unchanged.
pub trait ActionHandler {
    fn on_send(&self, _host: &Host, _ctx: &CallContext, _action: &Action) -> Result<()> {
        Ok(())
    }

    fn on_receive(
        &self,
        _host: &Host,
        _ctx: &CallContext,
        _action: &Action,
        _leg: Leg,
    ) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

impl ActionHandler for NoopHandler {}

// ---------------------------------------------------------------------------
// Participant
// ---------------------------------------------------------------------------

/// Everything rolled back when an atomic unit fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ParticipantState {
    pub capabilities: CapabilityStore,
    pub ledger: IntegrityLedger,
    pub controllers: ControllerSet,
}

pub struct Participant {
    pub(crate) address: Address,
    pub(crate) sendable: ActionSet,
    pub(crate) receivable: ActionSet,
    pub(crate) resolver: RefCell<Resolver>,
    pub(crate) state: RefCell<ParticipantState>,
    pub(crate) latch: Latch,
    pub(crate) handler: Box<dyn ActionHandler>,
}

impl Participant {
    pub fn builder(address: Address, owner: Address) -> ParticipantBuilder {
        ParticipantBuilder {
            address,
            owner,
            sendable: ActionSet::new(),
            receivable: ActionSet::new(),
            resolver: Resolver::new(address),
            handler: Box::new(NoopHandler),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.state.borrow().controllers.owner()
    }

    pub fn sendable(&self) -> &ActionSet {
        &self.sendable
    }

    pub fn receivable(&self) -> &ActionSet {
        &self.receivable
    }

    pub fn is_dispatching(&self) -> bool {
        self.latch.is_busy()
    }

    // -----------------------------------------------------------------------
    // Capabilities
    // -----------------------------------------------------------------------

    pub fn approve_for_action(
        &self,
        host: &Host,
        caller: Address,
        account: Address,
        selector: Selector,
        delegate: Address,
    ) -> Result<()> {
        let event = self
            .state
            .borrow_mut()
            .capabilities
            .authorize(caller, account, selector, delegate)?;
        host.emit(self.address, event);
        Ok(())
    }

    pub fn set_approval_for_all_actions(
        &self,
        host: &Host,
        caller: Address,
        operator: Address,
        approved: bool,
    ) -> Result<()> {
        let event = self
            .state
            .borrow_mut()
            .capabilities
            .set_operator(caller, operator, approved)?;
        host.emit(self.address, event);
        Ok(())
    }

    pub fn approved_for_action(&self, account: Address, selector: Selector) -> Address {
        self.state.borrow().capabilities.approved_for(account, selector)
    }

    pub fn is_approved_for_all_actions(&self, account: Address, operator: Address) -> bool {
        self.state.borrow().capabilities.is_operator(account, operator)
    }

    pub fn is_authorized(&self, caller: Address, account: Address, selector: Selector) -> bool {
        self.state
            .borrow()
            .capabilities
            .is_authorized(caller, account, selector)
    }

    // -----------------------------------------------------------------------
    // Controllers
    // -----------------------------------------------------------------------

    pub fn approve_controller(
        &self,
        host: &Host,
        caller: Address,
        controller: Address,
        selector: Selector,
    ) -> Result<()> {
        let event = self
            .state
            .borrow_mut()
            .controllers
            .approve_controller(caller, controller, selector)?;
        host.emit(self.address, event);
        Ok(())
    }

    pub fn revoke_controller(
        &self,
        host: &Host,
        caller: Address,
        controller: Address,
        selector: Selector,
    ) -> Result<()> {
        let event = self
            .state
            .borrow_mut()
            .controllers
            .revoke_controller(caller, controller, selector)?;
        host.emit(self.address, event);
        Ok(())
    }

    pub fn is_approved_controller(&self, controller: Address, selector: Selector) -> bool {
        self.state
            .borrow()
            .controllers
            .is_approved_controller(controller, selector)
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    /// Owner-only: point the resolver at a registry, or detach it.
    pub fn set_registry(
        &self,
        caller: Address,
        registry: Option<Rc<dyn AddressRegistry>>,
    ) -> Result<()> {
        self.state.borrow().controllers.ensure_owner(caller)?;
        self.resolver.borrow_mut().set_registry(registry);
        Ok(())
    }

    pub fn resolve_sender(&self, address: Address) -> Address {
        self.resolver.borrow().resolve_sender(address)
    }

    pub fn resolve_receiver(&self, address: Address) -> Address {
        self.resolver.borrow().resolve_receiver(address)
    }

    /// Copy of the resolver so no borrow is held across nested calls.
    pub(crate) fn resolver(&self) -> Resolver {
        self.resolver.borrow().clone()
    }

    // -----------------------------------------------------------------------
    // Ledger
    // -----------------------------------------------------------------------

    pub fn counter(&self) -> u64 {
        self.state.borrow().ledger.counter()
    }
}

impl Contract for Participant {
    fn address(&self) -> Address {
        self.address
    }

    fn snapshot(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(&*self.state.borrow())?)
    }

    fn restore(&self, state: serde_json::Value) -> Result<()> {
        *self.state.borrow_mut() = serde_json::from_value(state)?;
        Ok(())
    }

    fn as_sender(&self) -> Option<&dyn ActionSender> {
        Some(self)
    }

    fn as_receiver(&self) -> Option<&dyn ActionReceiver> {
        Some(self)
    }
}

// ---------------------------------------------------------------------------
// ParticipantBuilder
// ---------------------------------------------------------------------------

pub struct ParticipantBuilder {
    address: Address,
    owner: Address,
    sendable: ActionSet,
    receivable: ActionSet,
    resolver: Resolver,
    handler: Box<dyn ActionHandler>,
}

impl ParticipantBuilder {
    pub fn sendable<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            self.sendable.insert_name(name.as_ref());
        }
        self
    }

    pub fn sendable_selector(mut self, selector: Selector, label: impl Into<String>) -> Self {
        self.sendable.insert(selector, label);
        self
    }

    pub fn receivable<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            self.receivable.insert_name(name.as_ref());
        }
        self
    }

    pub fn receivable_selector(mut self, selector: Selector, label: impl Into<String>) -> Self {
        self.receivable.insert(selector, label);
        self
    }

    /// Speak for a legacy object in `role`.
    pub fn proxy_for(mut self, role: Role, principal: Address) -> Self {
        self.resolver = self.resolver.with_principal(role, principal);
        self
    }

    pub fn registry<R: AddressRegistry + 'static>(mut self, registry: Rc<R>) -> Self {
        self.resolver = self.resolver.with_registry(registry);
        self
    }

    pub fn handler(mut self, handler: impl ActionHandler + 'static) -> Self {
        self.handler = Box::new(handler);
        self
    }

    pub fn build(self) -> Participant {
        Participant {
            address: self.address,
            sendable: self.sendable,
            receivable: self.receivable,
            resolver: RefCell::new(self.resolver),
            state: RefCell::new(ParticipantState {
                capabilities: CapabilityStore::new(),
                ledger: IntegrityLedger::new(),
                controllers: ControllerSet::new(self.owner),
            }),
            latch: Latch::default(),
            handler: self.handler,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
