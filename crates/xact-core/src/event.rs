//! Observable records for off-chain indexers.

use crate::types::{Action, Address, Leg, Selector};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    ApprovalForAction {
        account: Address,
        selector: Selector,
        approved: Address,
    },
    ApprovalForAllActions {
        account: Address,
        operator: Address,
        approved: bool,
    },
    ControllerApproval {
        controller: Address,
        selector: Selector,
        approved: bool,
    },
    /// A dispatch completed on the initiator, whether or not anything lived
    /// at the receiving address.
    SendAction {
        action: Action,
        counter: u64,
        via_controller: bool,
    },
    ActionReceived {
        action: Action,
        counter: u64,
        leg: Leg,
        via_controller: bool,
    },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::ApprovalForAction { .. } => "approval_for_action",
            Event::ApprovalForAllActions { .. } => "approval_for_all_actions",
            Event::ControllerApproval { .. } => "controller_approval",
            Event::SendAction { .. } => "send_action",
            Event::ActionReceived { .. } => "action_received",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Atomic unit the event was emitted in.
    pub tx: Uuid,
    pub sequence: u64,
    pub emitter: Address,
    pub event: Event,
    pub recorded_at: DateTime<Utc>,
}
