use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub docker_url: Option<String>,
    pub docker_timeout_sec: Option<u64>,
    pub label_prefix: Option<String>,
    pub metrics_port: Option<u16>,

    // Feature configs
    pub scheduler: Option<SchedulerConfig>,
    pub backup: Option<BackupConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tick_interval_secs: Option<u64>,
    pub trigger_poll_secs: Option<u64>,
    pub reconcile_interval_secs: Option<u64>,
    pub resubscribe_delay_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct BackupConfig {
    pub output_dir: Option<String>,
    pub dump_command: Option<String>,
    pub dump_timeout_secs: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_full_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("warden.toml");
        std::fs::write(
            &path,
            r#"
docker_url = "http://docker-proxy:2375"
label_prefix = "mybackup"

[scheduler]
trigger_poll_secs = 30

[backup]
output_dir = "/var/backups"
dump_timeout_secs = 600
"#,
        )
        .unwrap();

        let config = FileConfig::load(&path).unwrap();

        assert_eq!(
            config.docker_url,
            Some("http://docker-proxy:2375".to_string())
        );
        assert_eq!(config.label_prefix, Some("mybackup".to_string()));
        assert_eq!(config.docker_timeout_sec, None);
        assert_eq!(config.scheduler.unwrap().trigger_poll_secs, Some(30));
        let backup = config.backup.unwrap();
        assert_eq!(backup.output_dir, Some("/var/backups".to_string()));
        assert_eq!(backup.dump_command, None);
        assert_eq!(backup.dump_timeout_secs, Some(600));
    }

    #[test]
    fn test_load_empty_file_is_all_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("warden.toml");
        std::fs::write(&path, "").unwrap();

        let config = FileConfig::load(&path).unwrap();

        assert!(config.docker_url.is_none());
        assert!(config.scheduler.is_none());
        assert!(config.backup.is_none());
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = FileConfig::load(Path::new("/no/such/warden.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_load_malformed_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("warden.toml");
        std::fs::write(&path, "docker_url = [not toml").unwrap();

        let err = FileConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
