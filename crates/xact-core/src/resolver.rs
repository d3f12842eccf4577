//! Proxy indirection.
//!
//! A legacy object that cannot speak the protocol is represented by a proxy.
//! The [`Resolver`] maps an address to whoever speaks for it in a given role.
//! Resolution never fails: an address nobody proxies resolves to itself.

use crate::types::{Address, Role};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

// ---------------------------------------------------------------------------
// AddressRegistry
// ---------------------------------------------------------------------------

/// Backing store mapping (object, role) to the proxy that speaks for it.
pub trait AddressRegistry {
    /// Returns the proxy, or `object` itself when it is not proxied.
    fn lookup(&self, object: Address, role: Role) -> Address;
}

/// In-memory registry maintained by a registry operator.
#[derive(Debug, Default)]
pub struct ProxyRegistry {
    entries: RefCell<BTreeMap<(Address, Role), Address>>,
}

impl ProxyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, object: Address, role: Role, proxy: Address) {
        self.entries.borrow_mut().insert((object, role), proxy);
    }

    pub fn deregister(&self, object: Address, role: Role) -> Option<Address> {
        self.entries.borrow_mut().remove(&(object, role))
    }

}

impl AddressRegistry for ProxyRegistry {
    fn lookup(&self, object: Address, role: Role) -> Address {
        self.entries
            .borrow()
            .get(&(object, role))
            .copied()
            .unwrap_or(object)
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct Resolver {
    this: Address,
    principals: BTreeMap<Role, Address>,
    registry: Option<Rc<dyn AddressRegistry>>,
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("this", &self.this)
            .field("principals", &self.principals)
            .field("registry", &self.registry.is_some())
            .finish()
    }
}

impl Resolver {
    pub fn new(this: Address) -> Self {
        Self {
            this,
            principals: BTreeMap::new(),
            registry: None,
        }
    }

    /// Mark this resolver's owner as the proxy of `principal` for `role`.
    pub fn with_principal(mut self, role: Role, principal: Address) -> Self {
        self.principals.insert(role, principal);
        self
    }

    pub fn with_registry(mut self, registry: Rc<dyn AddressRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn set_registry(&mut self, registry: Option<Rc<dyn AddressRegistry>>) {
        self.registry = registry;
    }

    pub fn resolve(&self, address: Address, role: Role) -> Address {
        if address.is_zero() {
            return address;
        }
        if self.principals.get(&role) == Some(&address) {
            return self.this;
        }
        match &self.registry {
            None => address,
            Some(registry) => registry.lookup(address, role),
        }
    }

    pub fn resolve_sender(&self, address: Address) -> Address {
        self.resolve(address, Role::Sender)
    }

    pub fn resolve_receiver(&self, address: Address) -> Address {
        self.resolve(address, Role::Receiver)
    }

    /// Whether `address` is this object or is spoken for by it in `role`.
    pub fn resolves_to_self(&self, address: Address, role: Role) -> bool {
        !address.is_zero() && (address == self.this || self.resolve(address, role) == self.this)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
