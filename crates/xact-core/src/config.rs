use crate::contract::LegacyObject;
use crate::error::{Result, XactError};
use crate::host::{Host, DEFAULT_MAX_CALL_DEPTH};
use crate::participant::Participant;
use crate::types::{Address, Role, Selector};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::rc::Rc;
use std::sync::OnceLock;

pub const CONFIG_FILE: &str = "xact.yaml";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl ConfigWarning {
    fn warning(message: String) -> Self {
        Self {
            level: WarnLevel::Warning,
            message,
        }
    }

    fn error(message: String) -> Self {
        Self {
            level: WarnLevel::Error,
            message,
        }
    }
}

// ---------------------------------------------------------------------------
// Action names
// ---------------------------------------------------------------------------

static ACTION_NAME_RE: OnceLock<Regex> = OnceLock::new();

fn action_name_re() -> &'static Regex {
    ACTION_NAME_RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.:-]*$").unwrap())
}

pub fn is_valid_action_name(name: &str) -> bool {
    action_name_re().is_match(name)
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    #[serde(default = "default_max_call_depth")]
    pub max_call_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

fn default_max_call_depth() -> usize {
    DEFAULT_MAX_CALL_DEPTH
}

/// A plain account: can originate calls and hold value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountConfig {
    pub name: String,
    pub address: Address,
    #[serde(default)]
    pub balance: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    #[default]
    Participant,
    Legacy,
}

impl ObjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Participant => "participant",
            ObjectKind::Legacy => "legacy",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControllerGrant {
    pub controller: Address,
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectConfig {
    pub name: String,
    pub address: Address,
    #[serde(default)]
    pub owner: Address,
    #[serde(default)]
    pub kind: ObjectKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sendable: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub receivable: Vec<String>,
    /// Legacy principals this object speaks for, by role.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub proxy_for: BTreeMap<Role, Address>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub controllers: Vec<ControllerGrant>,
    #[serde(default)]
    pub balance: u64,
}

/// Shared registry entry: `proxy` speaks for `object` in `role`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryEntry {
    pub object: Address,
    pub role: Role,
    pub proxy: Address,
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accounts: Vec<AccountConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub objects: Vec<ObjectConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub registry: Vec<RegistryEntry>,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            runtime: RuntimeConfig::default(),
            accounts: Vec::new(),
            objects: Vec::new(),
            registry: Vec::new(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(XactError::InvalidConfig(format!(
                "{} does not exist",
                path.display()
            )));
        }
        let data = std::fs::read_to_string(path)?;
        Self::from_yaml(&data)
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(data)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    pub fn object(&self, name: &str) -> Option<&ObjectConfig> {
        self.objects.iter().find(|o| o.name == name)
    }

    /// Look up an account or object by name, falling back to a literal
    /// address.
    pub fn resolve(&self, name_or_address: &str) -> Result<Address> {
        if let Some(account) = self.accounts.iter().find(|a| a.name == name_or_address) {
            return Ok(account.address);
        }
        if let Some(object) = self.object(name_or_address) {
            return Ok(object.address);
        }
        name_or_address.parse().map_err(|_| {
            XactError::InvalidConfig(format!(
                "'{name_or_address}' is neither a configured name nor an address"
            ))
        })
    }

    /// Display name for `address`, if configured.
    pub fn name_of(&self, address: Address) -> Option<&str> {
        self.accounts
            .iter()
            .find(|a| a.address == address)
            .map(|a| a.name.as_str())
            .or_else(|| {
                self.objects
                    .iter()
                    .find(|o| o.address == address)
                    .map(|o| o.name.as_str())
            })
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.version != 1 {
            warnings.push(ConfigWarning::warning(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        if self.runtime.max_call_depth == 0 {
            warnings.push(ConfigWarning::error(
                "runtime.max_call_depth is 0; no call could ever run".to_string(),
            ));
        }

        // Names and addresses are shared between accounts and objects.
        let mut names = BTreeSet::new();
        let mut addresses = BTreeSet::new();
        let entries = self
            .accounts
            .iter()
            .map(|a| (a.name.as_str(), a.address))
            .chain(self.objects.iter().map(|o| (o.name.as_str(), o.address)));
        for (name, address) in entries {
            if !names.insert(name) {
                warnings.push(ConfigWarning::error(format!("duplicate name '{name}'")));
            }
            if address.is_zero() {
                warnings.push(ConfigWarning::error(format!("'{name}' has the zero address")));
            } else if !addresses.insert(address) {
                warnings.push(ConfigWarning::error(format!(
                    "'{name}' reuses address {address}"
                )));
            }
        }

        for object in &self.objects {
            let declared = object
                .sendable
                .iter()
                .chain(&object.receivable)
                .chain(object.controllers.iter().flat_map(|g| &g.actions));
            for action in declared {
                if !is_valid_action_name(action) {
                    warnings.push(ConfigWarning::error(format!(
                        "object '{}' declares invalid action name '{}'",
                        object.name, action
                    )));
                }
            }

            match object.kind {
                ObjectKind::Legacy => {
                    if !object.sendable.is_empty()
                        || !object.receivable.is_empty()
                        || !object.controllers.is_empty()
                        || !object.proxy_for.is_empty()
                    {
                        warnings.push(ConfigWarning::warning(format!(
                            "legacy object '{}' declares protocol settings that will be ignored",
                            object.name
                        )));
                    }
                }
                ObjectKind::Participant => {
                    if !object.controllers.is_empty() && object.owner.is_zero() {
                        warnings.push(ConfigWarning::error(format!(
                            "object '{}' grants controllers but has no owner",
                            object.name
                        )));
                    }
                    for (role, principal) in &object.proxy_for {
                        if principal.is_zero() {
                            warnings.push(ConfigWarning::warning(format!(
                                "object '{}' is a {} proxy for the zero address",
                                object.name, role
                            )));
                        }
                    }
                }
            }
        }

        let participants: BTreeSet<Address> = self
            .objects
            .iter()
            .filter(|o| o.kind == ObjectKind::Participant)
            .map(|o| o.address)
            .collect();
        for entry in &self.registry {
            if entry.object.is_zero() {
                warnings.push(ConfigWarning::error(
                    "registry entry for the zero address".to_string(),
                ));
            }
            if !participants.contains(&entry.proxy) {
                warnings.push(ConfigWarning::warning(format!(
                    "registry proxy {} for {} ({}) is not a configured participant",
                    entry.proxy, entry.object, entry.role
                )));
            }
        }

        warnings
    }

    // -----------------------------------------------------------------------
    // Host construction
    // -----------------------------------------------------------------------

    /// Deploy every configured object into a fresh host, wire the shared
    /// registry, apply controller grants as the owner and fund balances.
    pub fn build_host(&self) -> Result<Host> {
        let mut host = Host::new().with_max_call_depth(self.runtime.max_call_depth);
        let registry = host.registry();
        for entry in &self.registry {
            registry.register(entry.object, entry.role, entry.proxy);
        }

        for account in &self.accounts {
            host.fund(account.address, account.balance)?;
        }

        for object in &self.objects {
            match object.kind {
                ObjectKind::Legacy => {
                    host.deploy(Rc::new(LegacyObject::new(object.address)))?;
                }
                ObjectKind::Participant => {
                    let mut builder = Participant::builder(object.address, object.owner)
                        .sendable(&object.sendable)
                        .receivable(&object.receivable)
                        .registry(registry.clone());
                    for (role, principal) in &object.proxy_for {
                        builder = builder.proxy_for(*role, *principal);
                    }
                    let participant = builder.build();
                    for grant in &object.controllers {
                        for action in &grant.actions {
                            participant.approve_controller(
                                &host,
                                object.owner,
                                grant.controller,
                                Selector::from_name(action),
                            )?;
                        }
                    }
                    host.deploy(Rc::new(participant))?;
                }
            }
            host.fund(object.address, object.balance)?;
        }

        Ok(host)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::AddressRegistry;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
version: 1
accounts:
  - name: alice
    address: "0x01"
    balance: 50
objects:
  - name: sword
    address: "0x0a"
    owner: "0x01"
    sendable: [attack]
    controllers:
      - controller: "0x09"
        actions: [attack]
  - name: shield
    address: "0x0b"
    receivable: [attack]
    balance: 5
  - name: relic
    address: "0x0c"
    kind: legacy
registry:
  - object: "0x0c"
    role: sender
    proxy: "0x0a"
"#;

    #[test]
    fn sample_parses_and_is_clean() {
        let cfg = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(cfg.runtime.max_call_depth, DEFAULT_MAX_CALL_DEPTH);
        assert_eq!(cfg.objects.len(), 3);
        assert_eq!(cfg.objects[2].kind, ObjectKind::Legacy);
        assert!(cfg.validate().is_empty(), "{:?}", cfg.validate());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let yaml = "version: 1\nobjects:\n  - name: a\n    address: \"0x01\"\n    colour: red\n";
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn resolve_names_and_literals() {
        let cfg = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(cfg.resolve("alice").unwrap(), Address::from_low_u64(1));
        assert_eq!(cfg.resolve("shield").unwrap(), Address::from_low_u64(0x0b));
        assert_eq!(cfg.resolve("0x2a").unwrap(), Address::from_low_u64(42));
        assert!(matches!(
            cfg.resolve("nobody"),
            Err(XactError::InvalidConfig(_))
        ));
        assert_eq!(cfg.name_of(Address::from_low_u64(0x0a)), Some("sword"));
    }

    #[test]
    fn validate_flags_problems() {
        let yaml = r#"
runtime:
  max_call_depth: 0
accounts:
  - name: alice
    address: "0x01"
objects:
  - name: alice
    address: "0x01"
    sendable: ["9lives"]
    controllers:
      - controller: "0x09"
        actions: [attack]
  - name: ghost
    address: "0x00"
  - name: relic
    address: "0x0c"
    kind: legacy
    receivable: [attack]
registry:
  - object: "0x0c"
    role: receiver
    proxy: "0x0d"
"#;
        let cfg = Config::from_yaml(yaml).unwrap();
        let warnings = cfg.validate();
        let errors: Vec<&str> = warnings
            .iter()
            .filter(|w| w.level == WarnLevel::Error)
            .map(|w| w.message.as_str())
            .collect();
        assert!(errors.iter().any(|m| m.contains("max_call_depth")));
        assert!(errors.iter().any(|m| m.contains("duplicate name 'alice'")));
        assert!(errors.iter().any(|m| m.contains("reuses address")));
        assert!(errors.iter().any(|m| m.contains("zero address")));
        assert!(errors.iter().any(|m| m.contains("'9lives'")));
        assert!(errors.iter().any(|m| m.contains("no owner")));

        let soft: Vec<&str> = warnings
            .iter()
            .filter(|w| w.level == WarnLevel::Warning)
            .map(|w| w.message.as_str())
            .collect();
        assert!(soft.iter().any(|m| m.contains("legacy object 'relic'")));
        assert!(soft.iter().any(|m| m.contains("not a configured participant")));
    }

    #[test]
    fn action_name_pattern() {
        assert!(is_valid_action_name("attack"));
        assert!(is_valid_action_name("game.attack:v2"));
        assert!(is_valid_action_name("_internal"));
        assert!(!is_valid_action_name(""));
        assert!(!is_valid_action_name("2fast"));
        assert!(!is_valid_action_name("has space"));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let cfg = Config::from_yaml(SAMPLE).unwrap();
        cfg.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.objects.len(), 3);
        assert_eq!(loaded.registry[0].proxy, Address::from_low_u64(0x0a));
        assert_eq!(loaded.objects[0].controllers[0].actions, vec!["attack"]);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(&dir.path().join(CONFIG_FILE)).unwrap_err();
        assert!(matches!(err, XactError::InvalidConfig(_)));
    }

    #[test]
    fn build_host_deploys_and_funds() {
        let cfg = Config::from_yaml(SAMPLE).unwrap();
        let host = cfg.build_host().unwrap();
        assert_eq!(host.addresses().len(), 3);
        assert_eq!(host.balance_of(Address::from_low_u64(1)), 50);
        assert_eq!(host.balance_of(Address::from_low_u64(0x0b)), 5);
        assert_eq!(
            host.sendable_actions(Address::from_low_u64(0x0a)).unwrap(),
            vec!["attack"]
        );
        assert_eq!(
            host.registry().lookup(Address::from_low_u64(0x0c), Role::Sender),
            Address::from_low_u64(0x0a)
        );
    }
}
