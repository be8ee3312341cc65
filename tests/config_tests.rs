use std::fs;
use std::time::Duration;
use storebench::config::{load_config, load_or_default, ConfigError};
use tempfile::TempDir;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        let db_path = dir.path().join("bench.duckdb");
        fs::write(
            &path,
            format!(
                r#"
workload:
  total_reports: 20000
  batch_size: 500
  max_concurrency: 8
  round_size: 5000
backends:
  postgres:
    enabled: false
  mongo:
    database: bench
    write_timeout: 5s
  duckdb:
    path: {}
run:
  clear_before: true
"#,
                db_path.display()
            ),
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.workload.total_reports, 20_000);
        assert_eq!(config.workload.effective_round_size(), 5_000);
        assert_eq!(config.enabled_backends(), vec!["mongodb", "duckdb"]);
        assert_eq!(config.backends.mongo.database, "bench");
        assert_eq!(config.backends.mongo.collection, "reports");
        assert_eq!(config.backends.mongo.write_timeout, Duration::from_secs(5));
        assert_eq!(config.backends.duckdb.path, db_path);
        assert!(config.run.clear_before);
        assert!(!config.run.skip_insert);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = load_config(&dir.path().join("absent.yml")).unwrap_err();

        assert!(matches!(err, ConfigError::Io(_)));
        assert!(err.to_string().contains("absent.yml"));
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.yml");
        fs::write(&path, "workload:\n  batch_size: [oops\n").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("broken.yml"), "{}", err);
    }

    #[test]
    fn test_explicit_path_used_by_load_or_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("explicit.yml");
        fs::write(&path, "workload:\n  max_concurrency: 3\n").unwrap();

        let (config, loaded_from) = load_or_default(Some(path.as_path())).unwrap();
        assert_eq!(config.workload.max_concurrency, 3);
        assert_eq!(loaded_from, Some(path));
    }

    #[test]
    fn test_invalid_workload_rejected_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "workload:\n  max_concurrency: 0\n").unwrap();

        match load_config(&path) {
            Err(ConfigError::ValidationList(errors)) => {
                assert_eq!(errors, vec!["workload.max_concurrency must be at least 1".to_string()]);
            }
            other => panic!("expected ValidationList, got {:?}", other),
        }
    }
}
