use crate::cmd::{load_config_or_default, ActionArgs};
use crate::output::print_json;
use clap::Args;
use std::path::Path;
use xact_core::fingerprint;

#[derive(Args, Debug)]
pub struct FingerprintArgs {
    #[command(flatten)]
    pub action: ActionArgs,

    /// Counter the initiator recorded for this action
    #[arg(long)]
    pub counter: u64,
}

pub fn run(config_path: &Path, args: FingerprintArgs, json: bool) -> anyhow::Result<()> {
    let config = load_config_or_default(config_path)?;
    let action = args.action.build(&config, None)?;
    let digest = fingerprint(&action, args.counter);

    if json {
        print_json(&serde_json::json!({
            "action": action,
            "counter": args.counter,
            "fingerprint": digest,
        }))?;
    } else {
        println!("{digest}");
    }
    Ok(())
}
