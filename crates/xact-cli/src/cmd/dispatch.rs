use crate::cmd::{load_config, ActionArgs};
use crate::output::print_json;
use anyhow::Context;
use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;
use xact_core::config::Config;
use xact_core::{Address, Event, EventRecord, Receipt};

#[derive(Args, Debug)]
pub struct DispatchArgs {
    /// Object whose send path runs
    #[arg(long)]
    pub via: String,

    #[command(flatten)]
    pub action: ActionArgs,

    /// Value attached to each dispatch, moved from the origin
    #[arg(long, default_value_t = 0)]
    pub value: u64,

    /// Account making the call (defaults to --user)
    #[arg(long)]
    pub origin: Option<String>,

    /// Number of identical dispatches to run
    #[arg(long, default_value_t = 1)]
    pub times: u32,

    /// Write every receipt as JSON to this file
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Serialize)]
struct DispatchReport {
    via: Address,
    receipts: Vec<Receipt>,
    counter: u64,
}

pub fn run(config_path: &Path, args: DispatchArgs, json: bool) -> anyhow::Result<()> {
    if args.times == 0 {
        anyhow::bail!("--times must be at least 1");
    }
    let config = load_config(config_path)?;
    let host = config.build_host().context("failed to build host from config")?;

    let via = config.resolve(&args.via)?;
    let action = args.action.build(&config, Some(via))?;
    let origin = match &args.origin {
        Some(name) => config.resolve(name)?,
        None => action.user(),
    };

    let mut receipts = Vec::with_capacity(args.times as usize);
    for n in 1..=args.times {
        debug!(n, via = %via, "submitting dispatch");
        let receipt = host
            .submit(origin, via, &action, args.value)
            .with_context(|| format!("dispatch {n} of {} failed", args.times))?;
        receipts.push(receipt);
    }

    let counter = last_counter(&receipts, via);
    let report = DispatchReport {
        via,
        receipts,
        counter,
    };

    if let Some(out) = &args.out {
        xact_core::io::write_json(out, &report)
            .with_context(|| format!("failed to write {}", out.display()))?;
    }

    if json {
        return print_json(&report);
    }

    for receipt in &report.receipts {
        println!("tx {}", receipt.tx);
        for record in &receipt.events {
            println!("  {}", describe(&config, record));
        }
    }
    println!("counter: {}", report.counter);
    Ok(())
}

/// Ledger counter of `via` after the run, as reported by its own events.
fn last_counter(receipts: &[Receipt], via: Address) -> u64 {
    receipts
        .iter()
        .flat_map(|r| r.events_of("send_action"))
        .filter(|r| r.emitter == via)
        .filter_map(|r| match &r.event {
            Event::SendAction { counter, .. } => Some(*counter),
            _ => None,
        })
        .last()
        .unwrap_or(0)
}

fn describe(config: &Config, record: &EventRecord) -> String {
    let who = config
        .name_of(record.emitter)
        .map(str::to_string)
        .unwrap_or_else(|| record.emitter.to_string());
    let detail = match &record.event {
        Event::SendAction {
            counter,
            via_controller,
            ..
        } => format!("counter={counter} via_controller={via_controller}"),
        Event::ActionReceived {
            counter,
            leg,
            via_controller,
            ..
        } => format!("counter={counter} leg={leg} via_controller={via_controller}"),
        _ => String::new(),
    };
    format!("#{} {} {} {}", record.sequence, who, record.event.kind(), detail)
        .trim_end()
        .to_string()
}
