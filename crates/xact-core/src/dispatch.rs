//! Sender-side state machine.
//!
//! ```text
//! Idle -> Authorizing -> Resolving -> Recording -> Invoking -> Idle
//!   \
//!    -> ControllerBypass -> Idle
//! ```
//!
//! A standard dispatch holds the per-object latch from the end of
//! `Authorizing` until it returns; any send that re-enters the same object
//! in that window fails with `Reentrant`. The controller path never touches
//! the latch.

use crate::contract::{ActionSender, CallContext};
use crate::error::{Result, XactError};
use crate::event::Event;
use crate::host::Host;
use crate::ledger::Fingerprint;
use crate::participant::Participant;
use crate::types::{Action, Address, Role, Selector};
use serde::Serialize;
use std::cell::Cell;
use std::fmt;
use tracing::debug;

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPhase {
    Idle,
    Authorizing,
    Resolving,
    Recording,
    Invoking,
    ControllerBypass,
}

impl DispatchPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            DispatchPhase::Idle => "idle",
            DispatchPhase::Authorizing => "authorizing",
            DispatchPhase::Resolving => "resolving",
            DispatchPhase::Recording => "recording",
            DispatchPhase::Invoking => "invoking",
            DispatchPhase::ControllerBypass => "controller_bypass",
        }
    }
}

impl fmt::Display for DispatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which path a send takes, decided before any check runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendPath {
    Standard,
    Controller,
}

// ---------------------------------------------------------------------------
// Latch
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub(crate) struct Latch {
    busy: Cell<bool>,
}

impl Latch {
    pub(crate) fn is_busy(&self) -> bool {
        self.busy.get()
    }

    pub(crate) fn engage(&self, owner: Address) -> Result<LatchGuard<'_>> {
        if self.busy.replace(true) {
            return Err(XactError::Reentrant(owner));
        }
        Ok(LatchGuard { busy: &self.busy })
    }
}

/// Releases the latch on every exit path.
pub(crate) struct LatchGuard<'a> {
    busy: &'a Cell<bool>,
}

impl Drop for LatchGuard<'_> {
    fn drop(&mut self) {
        self.busy.set(false);
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

impl Participant {
    pub fn send_path(&self, caller: Address, selector: Selector) -> SendPath {
        if self.is_approved_controller(caller, selector) {
            SendPath::Controller
        } else {
            SendPath::Standard
        }
    }

    fn enter_phase(&self, phase: DispatchPhase, action: &Action) {
        debug!(
            object = %self.address,
            selector = %action.selector(),
            phase = %phase,
            "dispatch phase"
        );
    }

    fn dispatch(&self, host: &Host, ctx: &CallContext, action: &Action) -> Result<()> {
        let selector = action.selector();

        self.enter_phase(DispatchPhase::Authorizing, action);
        if self.latch.is_busy() {
            return Err(XactError::Reentrant(self.address));
        }
        if !self.sendable.contains(selector) {
            return Err(XactError::UnsupportedAction(selector));
        }
        if !self.is_authorized(ctx.caller, action.user(), selector) {
            return Err(XactError::Unauthorized(format!(
                "{} may not send {} for {}",
                ctx.caller,
                selector,
                action.user()
            )));
        }
        let resolver = self.resolver();
        if !resolver.resolves_to_self(action.from().address, Role::Sender) {
            return Err(XactError::InvalidOrigin(action.from().address));
        }
        let _guard = self.latch.engage(self.address)?;

        self.enter_phase(DispatchPhase::Resolving, action);
        let receiver = resolver.resolve_receiver(action.to().address);
        let arbiter = resolver.resolve_receiver(action.state());
        let receiver_live = host.is_live(receiver);
        let arbiter_live = host.is_live(arbiter);

        let counter = if receiver_live && arbiter_live {
            self.enter_phase(DispatchPhase::Recording, action);
            self.state
                .borrow_mut()
                .ledger
                .record_dispatch(self.address, action)?
        } else {
            0
        };

        self.enter_phase(DispatchPhase::Invoking, action);
        self.handler.on_send(host, ctx, action)?;
        if receiver_live {
            host.call_receive(self.address, receiver, action, counter, ctx.value)
                .map_err(XactError::surfaced)?;
        } else {
            debug!(object = %self.address, to = %action.to(), "no live receiver");
        }

        host.emit(
            self.address,
            Event::SendAction {
                action: action.clone(),
                counter,
                via_controller: false,
            },
        );
        self.enter_phase(DispatchPhase::Idle, action);
        Ok(())
    }

    fn dispatch_as_controller(
        &self,
        host: &Host,
        ctx: &CallContext,
        action: &Action,
    ) -> Result<()> {
        self.enter_phase(DispatchPhase::ControllerBypass, action);
        self.handler.on_send(host, ctx, action)?;
        host.emit(
            self.address,
            Event::SendAction {
                action: action.clone(),
                counter: 0,
                via_controller: true,
            },
        );
        self.enter_phase(DispatchPhase::Idle, action);
        Ok(())
    }
}

impl ActionSender for Participant {
    fn send_action(&self, host: &Host, ctx: &CallContext, action: &Action) -> Result<()> {
        match self.send_path(ctx.caller, action.selector()) {
            SendPath::Controller => self.dispatch_as_controller(host, ctx, action),
            SendPath::Standard => self.dispatch(host, ctx, action),
        }
    }

    fn check_validity(&self, fingerprint: &Fingerprint, counter: u64) -> bool {
        self.state
            .borrow()
            .ledger
            .check_validity(fingerprint, counter)
    }

    fn sendable_actions(&self) -> Vec<String> {
        self.sendable.names()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
