// Owner-scoped settings in a SQLite database
//
// Run with: cargo run --example owner_scoped

use rsettings::{Owner, SettingsConfig, SettingsStore, SqliteBackend};

struct Account {
    id: u32,
    name: &'static str,
}

impl Owner for Account {
    fn owner_type(&self) -> String {
        "Account".into()
    }

    fn owner_id(&self) -> String {
        self.id.to_string()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let dir = std::env::temp_dir().join("rsettings-owner-demo");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("settings.db");

    let config = SettingsConfig::builder("account_settings")
        .allow_keys(["locale", "timezone", "digest"])
        .default("locale", "en")
        .default("timezone", "UTC")
        .default("digest", "weekly")
        .build()?;
    let store = SettingsStore::new(config, SqliteBackend::open(&path)?);

    let accounts = [
        Account { id: 1, name: "acme" },
        Account { id: 2, name: "globex" },
    ];

    store.for_owner(&accounts[0]).set("locale", "de")?;
    store.for_owner(&accounts[1]).set_many([("timezone", "Asia/Tokyo"), ("digest", "daily")])?;

    for account in &accounts {
        println!("{}:", account.name);
        for (key, value) in store.for_owner(account).get_all()? {
            println!("  {key} = {value}");
        }
    }

    println!("\nDatabase: {}", path.display());
    Ok(())
}
