//! Per-account authorization data.
//!
//! Two tables live here:
//!   approvals: (account, selector) -> delegate allowed to send that action
//!   operators: (account, operator) -> blanket approval for every action
//!
//! The only mutation paths are [`CapabilityStore::authorize`] and
//! [`CapabilityStore::set_operator`]; both return the event to emit.

use crate::error::{Result, XactError};
use crate::event::Event;
use crate::types::{Address, Selector};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityStore {
    #[serde(default)]
    approvals: BTreeMap<Address, BTreeMap<Selector, Address>>,
    #[serde(default)]
    operators: BTreeMap<Address, BTreeSet<Address>>,
}

impl CapabilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Set the delegate allowed to send `selector` on behalf of `account`.
    /// Writing the zero address revokes the entry.
    pub fn authorize(
        &mut self,
        caller: Address,
        account: Address,
        selector: Selector,
        delegate: Address,
    ) -> Result<Event> {
        if caller != account && !self.is_operator(account, caller) {
            return Err(XactError::Unauthorized(format!(
                "{caller} is neither {account} nor one of its operators"
            )));
        }
        if delegate == account {
            return Err(XactError::ApproveToCaller);
        }

        if delegate.is_zero() {
            if let Some(entries) = self.approvals.get_mut(&account) {
                entries.remove(&selector);
                if entries.is_empty() {
                    self.approvals.remove(&account);
                }
            }
        } else {
            self.approvals
                .entry(account)
                .or_default()
                .insert(selector, delegate);
        }

        Ok(Event::ApprovalForAction {
            account,
            selector,
            approved: delegate,
        })
    }

    /// Grant or clear blanket approval of `operator` over the caller's account.
    pub fn set_operator(
        &mut self,
        caller: Address,
        operator: Address,
        approved: bool,
    ) -> Result<Event> {
        if operator == caller {
            return Err(XactError::ApproveToCaller);
        }

        if approved {
            self.operators.entry(caller).or_default().insert(operator);
        } else if let Some(ops) = self.operators.get_mut(&caller) {
            ops.remove(&operator);
            if ops.is_empty() {
                self.operators.remove(&caller);
            }
        }

        Ok(Event::ApprovalForAllActions {
            account: caller,
            operator,
            approved,
        })
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn approved_for(&self, account: Address, selector: Selector) -> Address {
        self.approvals
            .get(&account)
            .and_then(|m| m.get(&selector))
            .copied()
            .unwrap_or(Address::ZERO)
    }

    pub fn is_operator(&self, account: Address, operator: Address) -> bool {
        self.operators
            .get(&account)
            .is_some_and(|ops| ops.contains(&operator))
    }

    pub fn is_authorized(&self, caller: Address, account: Address, selector: Selector) -> bool {
        if caller == account || self.is_operator(account, caller) {
            return true;
        }
        let delegate = self.approved_for(account, selector);
        !delegate.is_zero() && delegate == caller
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
