//! Config schema types (server, scheduler, runner).

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CadenceConfig {
    pub server: ServerConfig,
    pub cron: CronSection,
    pub runner: RunnerConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "127.0.0.1".
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 2503,
        }
    }
}

impl ServerConfig {
    /// `bind:port`, as accepted by both the listener and the client.
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Which backend holds the schedule and log stores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    #[default]
    File,
    Sqlite,
}

/// Scheduler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CronSection {
    pub check_interval_secs: u64,
    /// Kill a run after this many seconds. Unset means no limit.
    pub job_timeout_secs: Option<u64>,
    pub store: StoreKind,
    /// Overrides the platform data directory.
    pub data_dir: Option<PathBuf>,
}

impl Default for CronSection {
    fn default() -> Self {
        Self {
            check_interval_secs: 60,
            job_timeout_secs: None,
            store: StoreKind::default(),
            data_dir: None,
        }
    }
}

impl CronSection {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_secs.map(Duration::from_secs)
    }
}

/// How the host executes jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Interpreter for shell script jobs.
    pub shell: String,
    /// Executable invoked as `<dataset_command> save <ref>` for dataset jobs.
    pub dataset_command: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            shell: "sh".into(),
            dataset_command: "qri".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = CadenceConfig::default();
        assert_eq!(cfg.server.address(), "127.0.0.1:2503");
        assert_eq!(cfg.cron.check_interval(), Duration::from_secs(60));
        assert_eq!(cfg.cron.job_timeout(), None);
        assert_eq!(cfg.cron.store, StoreKind::File);
        assert_eq!(cfg.runner.shell, "sh");
    }

    #[test]
    fn zero_interval_is_clamped() {
        let section = CronSection {
            check_interval_secs: 0,
            ..CronSection::default()
        };
        assert_eq!(section.check_interval(), Duration::from_secs(1));
    }
}
