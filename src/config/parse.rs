use super::types::*;
use crate::config::{env_var_pattern, expand_env_vars, expand_tilde};
use std::fs::File;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    use std::io::Read;

    let mut file = File::open(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut yaml_string = String::new();
    file.read_to_string(&mut yaml_string).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    load_config_str(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(e) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        )),
        other => other,
    })
}

/// Parse and validate config text, expanding `$env{VAR}` references first.
pub fn load_config_str(yaml: &str) -> Result<Config, ConfigError> {
    let yaml_string = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml_string)?;

    // An empty or comment-only file means "all defaults"
    let mut config: Config = if yaml_string.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml::from_str::<Option<Config>>(&yaml_string)?.unwrap_or_default()
    };

    expand_paths(&mut config);
    validate_config(&config)?;

    Ok(config)
}

/// The part of a YAML line before any comment.
///
/// A `#` opens a comment only outside quotes and at the start of the line or
/// after whitespace.
fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;
    for (i, c) in line.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == '#' && prev.map_or(true, char::is_whitespace) => return &line[..i],
            None => {}
        }
        prev = Some(c);
    }
    line
}

fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let mut unexpanded_vars: Vec<String> = yaml_string
        .lines()
        .map(strip_comment)
        .flat_map(|line| env_var_pattern().captures_iter(line))
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    let error_msg = if unexpanded_vars.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=...\n\
             2. Replace $env{{{0}}} in the config file with an actual value",
            unexpanded_vars[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variables (e.g., export PG_PASSWORD=secret)\n\
             2. Replace the variables in the config file with actual values",
            unexpanded_vars.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

fn expand_paths(config: &mut Config) {
    config.backends.duckdb.path = expand_tilde(&config.backends.duckdb.path);
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    validate_workload(&config.workload, &mut errors);
    validate_backends(config, &mut errors);

    if config.web.listen.parse::<std::net::SocketAddr>().is_err() {
        errors.push(format!(
            "web.listen: '{}' is not a socket address (expected host:port)",
            config.web.listen
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

fn validate_workload(workload: &WorkloadConfig, errors: &mut Vec<String>) {
    if workload.batch_size == 0 {
        errors.push("workload.batch_size must be at least 1".to_string());
    }
    if workload.max_concurrency == 0 {
        errors.push("workload.max_concurrency must be at least 1".to_string());
    }
    if workload.round_size == Some(0) {
        errors.push("workload.round_size must be at least 1".to_string());
    }
}

fn validate_backends(config: &Config, errors: &mut Vec<String>) {
    let backends = &config.backends;

    if config.enabled_backends().is_empty() {
        errors.push(
            "at least one backend must be enabled under 'backends' (postgres, mongo, duckdb)"
                .to_string(),
        );
    }

    if backends.postgres.enabled && backends.postgres.url.trim().is_empty() {
        errors.push("backends.postgres.url cannot be empty".to_string());
    }

    if backends.mongo.enabled {
        if backends.mongo.uri.trim().is_empty() {
            errors.push("backends.mongo.uri cannot be empty".to_string());
        }
        if backends.mongo.database.is_empty() {
            errors.push("backends.mongo.database cannot be empty".to_string());
        }
        if backends.mongo.collection.is_empty() {
            errors.push("backends.mongo.collection cannot be empty".to_string());
        }
    }

    if backends.duckdb.enabled && backends.duckdb.path.as_os_str().is_empty() {
        errors.push("backends.duckdb.path cannot be empty".to_string());
    }

    let timeouts = [
        (
            "postgres",
            backends.postgres.enabled,
            backends.postgres.write_timeout,
            backends.postgres.read_timeout,
        ),
        (
            "mongo",
            backends.mongo.enabled,
            backends.mongo.write_timeout,
            backends.mongo.read_timeout,
        ),
        (
            "duckdb",
            backends.duckdb.enabled,
            backends.duckdb.write_timeout,
            backends.duckdb.read_timeout,
        ),
    ];
    for (name, enabled, write, read) in timeouts {
        if !enabled {
            continue;
        }
        if write.is_zero() {
            errors.push(format!("backends.{}.write_timeout must be greater than zero", name));
        }
        if read.is_zero() {
            errors.push(format!("backends.{}.read_timeout must be greater than zero", name));
        }
    }
}
