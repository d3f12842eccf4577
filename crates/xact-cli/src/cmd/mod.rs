pub mod dispatch;
pub mod fingerprint;
pub mod objects;
pub mod selector;
pub mod validate;

use anyhow::Context;
use clap::Args;
use std::path::Path;
use xact_core::config::Config;
use xact_core::{Action, Address, ObjectRef, Selector};

pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    Config::load(path).with_context(|| format!("failed to load config {}", path.display()))
}

/// Config if one exists, otherwise an empty one so that literal addresses
/// still work.
pub fn load_config_or_default(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::default())
    }
}

/// `0x`-prefixed input is a literal selector; anything else is a name.
pub fn parse_selector(input: &str) -> anyhow::Result<Selector> {
    if input.starts_with("0x") || input.starts_with("0X") {
        return input
            .parse()
            .with_context(|| format!("bad selector '{input}'"));
    }
    Ok(Selector::from_name(input))
}

/// Fields shared by every command that builds an action. Names are looked
/// up in the config; literal addresses are accepted too.
#[derive(Args, Debug, Clone)]
pub struct ActionArgs {
    /// Action name or 0x-prefixed selector
    #[arg(long)]
    pub action: String,

    /// Account the action is performed for
    #[arg(long)]
    pub user: String,

    /// Initiating object (defaults to --via where applicable)
    #[arg(long)]
    pub from: Option<String>,

    #[arg(long, default_value_t = 0)]
    pub from_token: u64,

    /// Receiving object
    #[arg(long)]
    pub to: String,

    #[arg(long, default_value_t = 0)]
    pub to_token: u64,

    /// Arbiter object
    #[arg(long)]
    pub state: Option<String>,

    /// Opaque payload as hex
    #[arg(long, default_value = "")]
    pub payload: String,
}

impl ActionArgs {
    pub fn build(&self, config: &Config, default_from: Option<Address>) -> anyhow::Result<Action> {
        let selector = parse_selector(&self.action)?;
        let user = config.resolve(&self.user)?;
        let from = match (&self.from, default_from) {
            (Some(name), _) => config.resolve(name)?,
            (None, Some(address)) => address,
            (None, None) => anyhow::bail!("--from is required"),
        };
        let to = config.resolve(&self.to)?;
        let state = match &self.state {
            Some(name) => config.resolve(name)?,
            None => Address::ZERO,
        };
        let digits = self.payload.trim_start_matches("0x");
        let payload = hex::decode(digits)
            .with_context(|| format!("payload is not valid hex: '{}'", self.payload))?;

        let action = Action::new(
            selector,
            user,
            ObjectRef::new(from, self.from_token),
            ObjectRef::new(to, self.to_token),
            state,
            payload,
        )?;
        Ok(action)
    }
}
