// Basic usage example for rsettings
//
// Run with: cargo run --example basic_usage

use rsettings::{MemoryBackend, Rule, SettingsConfig, SettingsStore};
use serde_json::json;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = SettingsConfig::builder("site_settings")
        .allow_keys(["site_name", "theme", "per_page", "maintenance"])
        .default("site_name", "My Site")
        .default("theme", "light")
        .default("per_page", 20)
        .default("maintenance", false)
        .rule("theme", Rule::one_of(["light", "dark"]))
        .rule("per_page", Rule::range(Some(1.0), Some(100.0)))
        .build()?;

    let store = SettingsStore::new(config, MemoryBackend::new());

    println!("Defaults:");
    for (key, value) in store.get_all()? {
        println!("  {key} = {value}");
    }

    store.set("theme", "dark")?;
    println!("\ntheme is now {}", store.get("theme")?.unwrap_or_default());

    // Unknown key
    if let Err(e) = store.set("font", "Comic Sans") {
        println!("rejected: {e}");
    }

    // Invalid batch: nothing is written
    match store.set_many([("maintenance", json!(true)), ("per_page", json!(500))]) {
        Ok(_) => println!("batch saved"),
        Err(e) => println!("batch rejected: {e}"),
    }
    println!("maintenance is still {}", store.get("maintenance")?.unwrap_or_default());

    // Valid batch
    let all = store.set_many([("maintenance", json!(true)), ("per_page", json!(50))])?;
    println!("\nAfter batch:");
    for (key, value) in all {
        println!("  {key} = {value}");
    }

    store.destroy("theme")?;
    println!("\ntheme after destroy: {}", store.get("theme")?.unwrap_or_default());

    Ok(())
}
