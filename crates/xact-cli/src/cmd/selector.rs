use crate::output::print_json;
use xact_core::Selector;

pub fn run(name: &str, json: bool) -> anyhow::Result<()> {
    let selector = Selector::from_name(name);
    if json {
        print_json(&serde_json::json!({
            "name": name,
            "selector": selector,
        }))?;
    } else {
        println!("{selector}");
    }
    Ok(())
}
