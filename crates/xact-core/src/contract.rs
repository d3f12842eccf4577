//! The seam between the [`Host`](crate::host::Host) and the objects it runs.
//!
//! Role support is an explicit typed capability: an object either hands out
//! an `ActionSender` / `ActionReceiver` view of itself or it does not.

use crate::error::Result;
use crate::host::Host;
use crate::ledger::Fingerprint;
use crate::types::{Action, Address};

/// Who is calling, on whose behalf, and with how much value attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// Immediate caller.
    pub caller: Address,
    /// Account that opened the enclosing atomic unit.
    pub origin: Address,
    pub value: u64,
}

pub trait Contract {
    fn address(&self) -> Address;

    /// Serializable view of every piece of mutable state, used for rollback.
    fn snapshot(&self) -> Result<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }

    fn restore(&self, _state: serde_json::Value) -> Result<()> {
        Ok(())
    }

    fn as_sender(&self) -> Option<&dyn ActionSender> {
        None
    }

    fn as_receiver(&self) -> Option<&dyn ActionReceiver> {
        None
    }
}

/// Initiator role.
pub trait ActionSender {
    fn send_action(&self, host: &Host, ctx: &CallContext, action: &Action) -> Result<()>;

    /// Read used by arbiters: is this the pair written by the latest dispatch?
    fn check_validity(&self, fingerprint: &Fingerprint, counter: u64) -> bool;

    fn sendable_actions(&self) -> Vec<String>;
}

/// Receiver (and arbiter) role.
pub trait ActionReceiver {
    fn on_action_received(
        &self,
        host: &Host,
        ctx: &CallContext,
        action: &Action,
        counter: u64,
    ) -> Result<()>;

    fn receivable_actions(&self) -> Vec<String>;
}

/// An object that predates the protocol and implements neither role.
/// A proxy registered in the resolver speaks for it.
#[derive(Debug, Clone)]
pub struct LegacyObject {
    address: Address,
}

impl LegacyObject {
    pub fn new(address: Address) -> Self {
        Self { address }
    }
}

impl Contract for LegacyObject {
    fn address(&self) -> Address {
        self.address
    }
}
