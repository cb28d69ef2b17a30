// Derive macro example for rsettings
//
// Run with: cargo run --example derive_usage --features derive

use rsettings::{DeriveSettingsSchema, MemoryBackend, SettingsStore};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(dead_code)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

#[derive(DeriveSettingsSchema)]
#[settings(table = "server_settings")]
struct ServerSettings {
    #[setting(required, pattern = "^[a-z0-9.-]+$")]
    hostname: String,

    #[setting(min = 1, max = 65535)]
    port: u16,

    log_level: LogLevel,

    #[setting(max_length = 8)]
    admins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            hostname: "localhost".into(),
            port: 8080,
            log_level: LogLevel::Info,
            admins: Vec::new(),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let store = SettingsStore::from_schema::<ServerSettings>(MemoryBackend::new())?;

    println!("hostname  = {}", store.hostname()?);
    println!("port      = {}", store.port()?);
    println!("log_level = {:?}", store.log_level()?);

    store.set_port(9090)?;
    store.set_log_level(LogLevel::Debug)?;
    store.set_admins(vec!["root".into()])?;

    if let Err(e) = store.set_hostname("Not A Hostname".into()) {
        println!("\nrejected hostname: {e}");
    }

    println!("\nport      = {}", store.port()?);
    println!("log_level = {:?}", store.log_level()?);
    println!("admins    = {:?}", store.admins()?);

    Ok(())
}
