use crate::config::generate::generate_starter_config;
use crate::config::{load_config, resolve_config_path, user_config_path};
use std::fs;
use std::path::{Path, PathBuf};

pub fn init(stdout: bool, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_content = generate_starter_config();

    if stdout {
        print!("{}", config_content);
        return Ok(());
    }

    let config_path = default_write_path();
    write_config(&config_content, &config_path, force)?;
    println!("Config file written to {}", config_path.display());
    Ok(())
}

/// `~/.config/storebench/config.yml` when its directory can be created, else `/etc/storebench/config.yml`.
fn default_write_path() -> PathBuf {
    if let Some(user_config) = user_config_path() {
        if let Some(parent) = user_config.parent() {
            match fs::create_dir_all(parent) {
                Ok(()) => return user_config,
                Err(_) => {
                    eprintln!("Warning: Could not create directory {}", parent.display());
                    eprintln!("Falling back to /etc/storebench/config.yml");
                }
            }
        }
    }
    PathBuf::from("/etc/storebench/config.yml")
}

pub fn write_config(
    config_content: &str,
    config_path: &Path,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if config_path.exists() && !force {
        return Err(format!(
            "Config file already exists at {}. Remove it first, pass --force, or use --stdout to print the config",
            config_path.display()
        )
        .into());
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(config_path, config_content)?;
    Ok(())
}

pub fn validate(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let path = resolve_config_path(config_path)
        .ok_or("No config file found. Use --config to specify a path.")?;

    println!("Validating config file: {}", path.display());

    match load_config(&path) {
        Ok(config) => {
            println!("✓ Config is valid");
            println!("  backends: {}", config.enabled_backends().join(", "));
            println!(
                "  workload: {} reports, batch size {}, concurrency {}",
                config.workload.total_reports,
                config.workload.batch_size,
                config.workload.max_concurrency
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Config validation failed:\n{}", e);
            Err(e.into())
        }
    }
}
