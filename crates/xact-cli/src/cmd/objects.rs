use crate::cmd::load_config;
use crate::output::{print_json, Table};
use serde::Serialize;
use std::path::Path;
use xact_core::config::ObjectConfig;
use xact_core::{Address, Selector};

#[derive(Serialize)]
struct DeclaredAction<'a> {
    name: &'a str,
    selector: Selector,
}

#[derive(Serialize)]
struct ObjectRow<'a> {
    name: &'a str,
    address: Address,
    kind: &'static str,
    owner: Address,
    sendable: Vec<DeclaredAction<'a>>,
    receivable: Vec<DeclaredAction<'a>>,
}

fn declared(names: &[String]) -> Vec<DeclaredAction<'_>> {
    names
        .iter()
        .map(|n| DeclaredAction {
            name: n,
            selector: Selector::from_name(n),
        })
        .collect()
}

fn row(object: &ObjectConfig) -> ObjectRow<'_> {
    ObjectRow {
        name: &object.name,
        address: object.address,
        kind: object.kind.as_str(),
        owner: object.owner,
        sendable: declared(&object.sendable),
        receivable: declared(&object.receivable),
    }
}

fn render(actions: &[DeclaredAction<'_>]) -> String {
    actions
        .iter()
        .map(|a| format!("{}({})", a.name, a.selector))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn run(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let rows: Vec<ObjectRow<'_>> = config.objects.iter().map(row).collect();

    if json {
        return print_json(&rows);
    }

    let mut table = Table::new(&["NAME", "ADDRESS", "KIND", "SENDABLE", "RECEIVABLE"]);
    for r in &rows {
        table.push(vec![
            r.name.to_string(),
            r.address.to_string(),
            r.kind.to_string(),
            render(&r.sendable),
            render(&r.receivable),
        ]);
    }
    if table.is_empty() {
        println!("No objects configured.");
    } else {
        table.print();
    }
    Ok(())
}
