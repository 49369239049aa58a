//! `ragchat config` — Configuration management commands.

use ragchat_config::{AppConfig, DatastoreKind};

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ok  Config parsed and validated");

            let mut warnings = Vec::new();

            if config.api_key.is_none() {
                warnings.push("No API key set (set RAGCHAT_API_KEY or OPENAI_API_KEY)".to_string());
            }

            for store in &config.datastores {
                if let (DatastoreKind::File, Some(path)) = (store.kind, &store.path) {
                    if !path.exists() {
                        warnings.push(format!(
                            "Datastore '{}' points at a missing file: {}",
                            store.id,
                            path.display()
                        ));
                    }
                }
            }

            if config.gateway.host == "0.0.0.0" && config.gateway.allowed_origins.is_empty() {
                warnings.push(
                    "Gateway is public but no allowed_origins are set for browser widgets"
                        .to_string(),
                );
            }

            if warnings.is_empty() {
                println!("   ok  All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   warn  {w}");
                }
            }

            println!();
            println!("   Provider:   {}", config.default_provider);
            println!("   Model:      {}", config.default_model);
            println!("   Strategy:   {}", config.chat.default_strategy);
            println!(
                "   Gateway:    {}:{}",
                config.gateway.host, config.gateway.port
            );
            println!("   Datastores: {}", config.datastores.len());
        }
        Err(e) => {
            println!("   error  {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    redact(&mut config);
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

/// Mask every API key before printing.
fn redact(config: &mut AppConfig) {
    let mask = |key: &mut Option<String>| {
        if key.is_some() {
            *key = Some("***".into());
        }
    };

    mask(&mut config.api_key);
    for provider in config.providers.values_mut() {
        mask(&mut provider.api_key);
    }
    for store in &mut config.datastores {
        mask(&mut store.api_key);
    }
}
