use crate::error::{Result, XactError};
use crate::event::Event;
use crate::types::{Address, Selector};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Owner-gated allow-list of controllers permitted to relay a selector by
/// hand. An approved controller bypasses the latch, authorization, origin
/// checks and automatic forwarding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerSet {
    owner: Address,
    #[serde(default)]
    approved: BTreeMap<Address, BTreeSet<Selector>>,
}

impl ControllerSet {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            approved: BTreeMap::new(),
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn approve_controller(
        &mut self,
        caller: Address,
        controller: Address,
        selector: Selector,
    ) -> Result<Event> {
        self.ensure_owner(caller)?;
        self.approved.entry(controller).or_default().insert(selector);
        Ok(Event::ControllerApproval {
            controller,
            selector,
            approved: true,
        })
    }

    pub fn revoke_controller(
        &mut self,
        caller: Address,
        controller: Address,
        selector: Selector,
    ) -> Result<Event> {
        self.ensure_owner(caller)?;
        if let Some(selectors) = self.approved.get_mut(&controller) {
            selectors.remove(&selector);
            if selectors.is_empty() {
                self.approved.remove(&controller);
            }
        }
        Ok(Event::ControllerApproval {
            controller,
            selector,
            approved: false,
        })
    }

    pub fn is_approved_controller(&self, controller: Address, selector: Selector) -> bool {
        self.approved
            .get(&controller)
            .is_some_and(|s| s.contains(&selector))
    }

    pub(crate) fn ensure_owner(&self, caller: Address) -> Result<()> {
        if self.owner.is_zero() || caller != self.owner {
            return Err(XactError::Unauthorized(format!(
                "{caller} is not the owner"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> Address {
        Address::from_low_u64(n)
    }

    const RELAY: Selector = Selector::from_u32(0x5E1A);

    #[test]
    fn owner_approves_and_revokes() {
        let mut set = ControllerSet::new(addr(1));
        set.approve_controller(addr(1), addr(9), RELAY).unwrap();
        assert!(set.is_approved_controller(addr(9), RELAY));
        assert!(!set.is_approved_controller(addr(9), Selector::from_u32(1)));

        let event = set.revoke_controller(addr(1), addr(9), RELAY).unwrap();
        assert_eq!(
            event,
            Event::ControllerApproval {
                controller: addr(9),
                selector: RELAY,
                approved: false,
            }
        );
        assert!(!set.is_approved_controller(addr(9), RELAY));
    }

    #[test]
    fn non_owner_is_rejected() {
        let mut set = ControllerSet::new(addr(1));
        let err = set.approve_controller(addr(2), addr(9), RELAY).unwrap_err();
        assert!(matches!(err, XactError::Unauthorized(_)));
        assert!(!set.is_approved_controller(addr(9), RELAY));
    }

    #[test]
    fn ownerless_set_is_frozen() {
        let mut set = ControllerSet::new(Address::ZERO);
        assert!(set
            .approve_controller(Address::ZERO, addr(9), RELAY)
            .is_err());
    }
}
