use crate::error::{Result, XactError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Hex helpers
// ---------------------------------------------------------------------------

/// Drop a leading `0x` or `0X`, if any.
pub(crate) fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Parse `0x`-prefixed (or bare) hex into a fixed-width big-endian array.
/// Shorter inputs are left-padded with zeros.
fn parse_fixed_hex<const N: usize>(s: &str) -> Option<[u8; N]> {
    let digits = strip_hex_prefix(s);
    if digits.is_empty() || digits.len() > N * 2 {
        return None;
    }
    let padded = format!("{digits:0>width$}", width = N * 2);
    let mut out = [0u8; N];
    hex::decode_to_slice(padded, &mut out).ok()?;
    Some(out)
}

macro_rules! string_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
                s.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
                let raw = String::deserialize(d)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

pub const ADDRESS_LEN: usize = 20;

/// Identifier of an object or account. The zero address means "none".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Address whose low eight bytes hold `n`. Handy for fixtures.
    pub fn from_low_u64(n: u64) -> Self {
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes[ADDRESS_LEN - 8..].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = XactError;

    fn from_str(s: &str) -> Result<Self> {
        parse_fixed_hex::<ADDRESS_LEN>(s.trim())
            .map(Address)
            .ok_or_else(|| XactError::InvalidAddress(s.to_string()))
    }
}

string_serde!(Address);

// ---------------------------------------------------------------------------
// Selector
// ---------------------------------------------------------------------------

/// Four-byte action identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Selector([u8; 4]);

impl Selector {
    pub const ZERO: Selector = Selector([0u8; 4]);

    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub const fn from_u32(value: u32) -> Self {
        Self(value.to_be_bytes())
    }

    /// First four bytes of SHA-256 over the action name.
    pub fn from_name(name: &str) -> Self {
        let digest = Sha256::digest(name.as_bytes());
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&digest[..4]);
        Self(bytes)
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Selector {
    type Err = XactError;

    fn from_str(s: &str) -> Result<Self> {
        parse_fixed_hex::<4>(s.trim())
            .map(Selector)
            .ok_or_else(|| XactError::InvalidSelector(s.to_string()))
    }
}

string_serde!(Selector);

// ---------------------------------------------------------------------------
// Role / Leg
// ---------------------------------------------------------------------------

/// Protocol role an address can be resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Sender,
    Receiver,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Sender => "sender",
            Role::Receiver => "receiver",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = XactError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sender" => Ok(Role::Sender),
            "receiver" => Ok(Role::Receiver),
            _ => Err(XactError::InvalidConfig(format!("unknown role '{s}'"))),
        }
    }
}

/// Which side of an action a receiving object is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Leg {
    /// Named in `action.to`.
    Target,
    /// Named in `action.state`.
    Arbiter,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Leg::Target => "target",
            Leg::Arbiter => "arbiter",
        })
    }
}

// ---------------------------------------------------------------------------
// ObjectRef
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ObjectRef {
    pub address: Address,
    /// Sub-token id inside the object; `0` when unused.
    #[serde(default)]
    pub token_id: u64,
}

impl ObjectRef {
    pub fn new(address: Address, token_id: u64) -> Self {
        Self { address, token_id }
    }

    pub fn object(address: Address) -> Self {
        Self::new(address, 0)
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.token_id == 0 {
            write!(f, "{}", self.address)
        } else {
            write!(f, "{}#{}", self.address, self.token_id)
        }
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// Wire form of an [`Action`]. Converting into an `Action` validates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionRecord {
    pub selector: Selector,
    pub user: Address,
    pub from: ObjectRef,
    pub to: ObjectRef,
    #[serde(default)]
    pub state: Address,
    #[serde(default, with = "hex::serde")]
    pub payload: Vec<u8>,
}

/// The unit of work dispatched from initiator to receiver to arbiter.
///
/// Immutable once constructed: fields are only reachable through accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ActionRecord", into = "ActionRecord")]
pub struct Action {
    selector: Selector,
    user: Address,
    from: ObjectRef,
    to: ObjectRef,
    state: Address,
    payload: Vec<u8>,
}

impl Action {
    pub fn new(
        selector: Selector,
        user: Address,
        from: ObjectRef,
        to: ObjectRef,
        state: Address,
        payload: Vec<u8>,
    ) -> Result<Self> {
        if selector.is_zero() {
            return Err(XactError::MalformedAction("selector is zero".to_string()));
        }
        if from.address.is_zero() {
            return Err(XactError::MalformedAction("from address is zero".to_string()));
        }
        if to.address.is_zero() {
            return Err(XactError::MalformedAction("to address is zero".to_string()));
        }
        Ok(Self {
            selector,
            user,
            from,
            to,
            state,
            payload,
        })
    }

    pub fn selector(&self) -> Selector {
        self.selector
    }

    pub fn user(&self) -> Address {
        self.user
    }

    pub fn from(&self) -> ObjectRef {
        self.from
    }

    pub fn to(&self) -> ObjectRef {
        self.to
    }

    /// Arbiter address, zero when the action names none.
    pub fn state(&self) -> Address {
        self.state
    }

    pub fn has_arbiter(&self) -> bool {
        !self.state.is_zero()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

impl TryFrom<ActionRecord> for Action {
    type Error = XactError;

    fn try_from(r: ActionRecord) -> Result<Self> {
        Action::new(r.selector, r.user, r.from, r.to, r.state, r.payload)
    }
}

impl From<Action> for ActionRecord {
    fn from(a: Action) -> Self {
        Self {
            selector: a.selector,
            user: a.user,
            from: a.from,
            to: a.to,
            state: a.state,
            payload: a.payload,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
