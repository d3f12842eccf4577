//! Integrity ledger held by every initiator.
//!
//! Each recorded dispatch bumps a counter and stores a fingerprint binding the
//! full action to that counter. An arbiter later recomputes the fingerprint
//! from what it received and asks the initiator whether the pair is current.
//! Only the most recent dispatch is ever provable, which defeats replay.

use crate::error::{Result, XactError};
use crate::types::{strip_hex_prefix, Action, Address};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

pub const FINGERPRINT_LEN: usize = 32;

// ---------------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    pub const ZERO: Fingerprint = Fingerprint([0u8; FINGERPRINT_LEN]);

    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Fingerprint {
    type Err = XactError;

    fn from_str(s: &str) -> Result<Self> {
        let digits = strip_hex_prefix(s);
        let mut out = [0u8; FINGERPRINT_LEN];
        hex::decode_to_slice(digits, &mut out)
            .map_err(|e| XactError::MalformedAction(format!("fingerprint '{s}': {e}")))?;
        Ok(Fingerprint(out))
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Digest binding every field of `action` to `counter`.
///
/// Integers are big-endian; the payload is length-prefixed so that no two
/// distinct actions share an encoding.
pub fn fingerprint(action: &Action, counter: u64) -> Fingerprint {
    let from = action.from();
    let to = action.to();

    let mut hasher = Sha256::new();
    hasher.update(action.selector().as_bytes());
    hasher.update(action.user().as_bytes());
    hasher.update(from.address.as_bytes());
    hasher.update(from.token_id.to_be_bytes());
    hasher.update(to.address.as_bytes());
    hasher.update(to.token_id.to_be_bytes());
    hasher.update(action.state().as_bytes());
    hasher.update((action.payload().len() as u64).to_be_bytes());
    hasher.update(action.payload());
    hasher.update(counter.to_be_bytes());

    let mut out = [0u8; FINGERPRINT_LEN];
    out.copy_from_slice(&hasher.finalize());
    Fingerprint(out)
}

// ---------------------------------------------------------------------------
// IntegrityLedger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityLedger {
    counter: u64,
    fingerprint: Fingerprint,
}

impl IntegrityLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a dispatch that will reach an arbiter and return the new counter.
    ///
    /// `owner` only labels the exhaustion error.
    pub fn record_dispatch(&mut self, owner: Address, action: &Action) -> Result<u64> {
        let next = self
            .counter
            .checked_add(1)
            .ok_or(XactError::CounterExhausted(owner))?;
        self.fingerprint = fingerprint(action, next);
        self.counter = next;
        Ok(next)
    }

    /// True only for the exact pair written by the latest dispatch.
    pub fn check_validity(&self, fingerprint: &Fingerprint, counter: u64) -> bool {
        counter != 0 && counter == self.counter && *fingerprint == self.fingerprint
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ObjectRef, Selector};

    fn addr(n: u64) -> Address {
        Address::from_low_u64(n)
    }

    fn action(payload: &[u8]) -> Action {
        Action::new(
            Selector::from_u32(0xABCD),
            addr(1),
            ObjectRef::object(addr(10)),
            ObjectRef::new(addr(11), 3),
            addr(12),
            payload.to_vec(),
        )
        .unwrap()
    }

    #[test]
    fn fresh_ledger_validates_nothing() {
        let ledger = IntegrityLedger::new();
        assert_eq!(ledger.counter(), 0);
        assert!(!ledger.check_validity(&Fingerprint::ZERO, 0));
        assert!(!ledger.check_validity(&fingerprint(&action(b""), 0), 0));
    }

    #[test]
    fn record_increments_by_one_and_binds_counter() {
        let mut ledger = IntegrityLedger::new();
        let a = action(b"hit");
        let counter = ledger.record_dispatch(addr(10), &a).unwrap();
        assert_eq!(counter, 1);
        assert!(ledger.check_validity(&fingerprint(&a, 1), 1));
        assert!(!ledger.check_validity(&fingerprint(&a, 1), 2));
        assert!(!ledger.check_validity(&fingerprint(&a, 2), 1));
    }

    #[test]
    fn previous_pair_is_invalid_after_next_dispatch() {
        let mut ledger = IntegrityLedger::new();
        let first = action(b"one");
        let second = action(b"two");
        ledger.record_dispatch(addr(10), &first).unwrap();
        let old = fingerprint(&first, 1);
        ledger.record_dispatch(addr(10), &second).unwrap();

        assert_eq!(ledger.counter(), 2);
        assert!(!ledger.check_validity(&old, 1));
        assert!(ledger.check_validity(&fingerprint(&second, 2), 2));
    }

    #[test]
    fn identical_action_gets_fresh_fingerprint_each_time() {
        let mut ledger = IntegrityLedger::new();
        let a = action(b"same");
        ledger.record_dispatch(addr(10), &a).unwrap();
        let first = ledger.fingerprint();
        ledger.record_dispatch(addr(10), &a).unwrap();
        assert_ne!(first, ledger.fingerprint());
        assert!(!ledger.check_validity(&first, 1));
    }

    #[test]
    fn every_field_feeds_the_fingerprint() {
        let base = action(b"x");
        let variants = [
            Action::new(
                Selector::from_u32(0xABCE),
                addr(1),
                base.from(),
                base.to(),
                base.state(),
                b"x".to_vec(),
            ),
            Action::new(
                base.selector(),
                addr(2),
                base.from(),
                base.to(),
                base.state(),
                b"x".to_vec(),
            ),
            Action::new(
                base.selector(),
                addr(1),
                ObjectRef::new(addr(10), 1),
                base.to(),
                base.state(),
                b"x".to_vec(),
            ),
            Action::new(
                base.selector(),
                addr(1),
                base.from(),
                ObjectRef::new(addr(11), 4),
                base.state(),
                b"x".to_vec(),
            ),
            Action::new(
                base.selector(),
                addr(1),
                base.from(),
                base.to(),
                Address::ZERO,
                b"x".to_vec(),
            ),
            Action::new(
                base.selector(),
                addr(1),
                base.from(),
                base.to(),
                base.state(),
                b"y".to_vec(),
            ),
        ];
        let reference = fingerprint(&base, 1);
        for v in variants {
            assert_ne!(fingerprint(&v.unwrap(), 1), reference);
        }
    }

    #[test]
    fn exhausted_counter_is_an_error() {
        let mut ledger = IntegrityLedger {
            counter: u64::MAX,
            fingerprint: Fingerprint::ZERO,
        };
        let err = ledger.record_dispatch(addr(10), &action(b"")).unwrap_err();
        assert!(matches!(err, XactError::CounterExhausted(a) if a == addr(10)));
        assert_eq!(ledger.counter(), u64::MAX);
    }

    #[test]
    fn fingerprint_text_roundtrip() {
        let fp = fingerprint(&action(b"z"), 5);
        let parsed: Fingerprint = fp.to_string().parse().unwrap();
        assert_eq!(parsed, fp);
    }

    #[test]
    fn fingerprint_accepts_either_prefix_case() {
        let fp = fingerprint(&action(b"z"), 5);
        let digits = hex::encode(fp.as_bytes());
        assert_eq!(format!("0X{digits}").parse::<Fingerprint>().unwrap(), fp);
        assert_eq!(digits.parse::<Fingerprint>().unwrap(), fp);
        assert!("0x1234".parse::<Fingerprint>().is_err());
    }
}
