pub mod actions;
pub mod capability;
pub mod config;
pub mod contract;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod host;
pub mod io;
pub mod ledger;
pub mod participant;
mod receive;
pub mod resolver;
pub mod types;

pub use contract::{ActionReceiver, ActionSender, CallContext, Contract, LegacyObject};
pub use error::{Result, XactError};
pub use event::{Event, EventRecord};
pub use host::{Host, Receipt};
pub use ledger::{fingerprint, Fingerprint, IntegrityLedger};
pub use participant::{ActionHandler, NoopHandler, Participant};
pub use resolver::{AddressRegistry, ProxyRegistry};
pub use types::{Action, Address, Leg, ObjectRef, Role, Selector};
