use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing::{debug, warn};

use crate::{
    env_subst::substitute_env,
    error::{Error, Result},
    schema::CadenceConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "cadence.toml",
    "cadence.yaml",
    "cadence.yml",
    "cadence.json",
];

static CONFIG_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);
static DATA_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "cadence")
}

/// Use `dir` instead of the platform config directory.
pub fn set_config_dir(dir: PathBuf) {
    *CONFIG_DIR_OVERRIDE.lock().unwrap_or_else(|e| e.into_inner()) = Some(dir);
}

/// Use `dir` instead of the platform data directory, unless the config file
/// sets `cron.data_dir`.
pub fn set_data_dir(dir: PathBuf) {
    *DATA_DIR_OVERRIDE.lock().unwrap_or_else(|e| e.into_inner()) = Some(dir);
}

/// Returns the user-global config directory (`~/.config/cadence/`).
pub fn config_dir() -> Option<PathBuf> {
    let overridden = CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clone();
    overridden.or_else(|| project_dirs().map(|d| d.config_dir().to_path_buf()))
}

/// Where stores and run output live.
///
/// Order: `cron.data_dir` from the config, then [`set_data_dir`], then the
/// platform data directory, then `./.cadence`.
pub fn data_dir(config: &CadenceConfig) -> PathBuf {
    if let Some(dir) = &config.cron.data_dir {
        return dir.clone();
    }
    let overridden = DATA_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clone();
    overridden
        .or_else(|| project_dirs().map(|d| d.data_dir().to_path_buf()))
        .unwrap_or_else(|| PathBuf::from(".cadence"))
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<CadenceConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&substitute_env(&raw), path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./cadence.{toml,yaml,yml,json}` (project-local)
/// 2. `<config dir>/cadence.{toml,yaml,yml,json}` (user-global)
///
/// Returns `CadenceConfig::default()` if no config file is found or the one
/// found cannot be parsed.
pub fn discover_and_load() -> CadenceConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    CadenceConfig::default()
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES.iter().map(PathBuf::from);
    let global = config_dir()
        .into_iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)));
    local.chain(global).find(|p| p.exists())
}

fn parse_config(raw: &str, path: &Path) -> Result<CadenceConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => Err(Error::UnsupportedFormat {
            extension: ext.to_string(),
        }),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::schema::StoreKind,
        std::{path::Path, time::Duration},
    };

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_toml() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write(
            tmp.path(),
            "cadence.toml",
            r#"
[server]
port = 9000

[cron]
check_interval_secs = 5
job_timeout_secs = 30
store = "sqlite"
"#,
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.bind, "127.0.0.1");
        assert_eq!(cfg.cron.check_interval(), Duration::from_secs(5));
        assert_eq!(cfg.cron.job_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(cfg.cron.store, StoreKind::Sqlite);
        assert_eq!(cfg.runner.dataset_command, "qri");
    }

    #[test]
    fn loads_json_and_yaml() {
        let tmp = tempfile::tempdir().unwrap();
        let json = write(
            tmp.path(),
            "cadence.json",
            r#"{"runner": {"shell": "bash"}, "cron": {"store": "memory"}}"#,
        );
        let cfg = load_config(&json).unwrap();
        assert_eq!(cfg.runner.shell, "bash");
        assert_eq!(cfg.cron.store, StoreKind::Memory);

        let yaml = write(tmp.path(), "cadence.yml", "server:\n  bind: 0.0.0.0\n");
        assert_eq!(load_config(&yaml).unwrap().server.bind, "0.0.0.0");
    }

    #[test]
    fn empty_file_is_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write(tmp.path(), "cadence.toml", "");
        assert_eq!(load_config(&path).unwrap(), CadenceConfig::default());
    }

    #[test]
    fn rejects_unknown_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write(tmp.path(), "cadence.ini", "port=1");
        assert!(matches!(
            load_config(&path),
            Err(Error::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn reports_parse_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write(tmp.path(), "cadence.toml", "[server\nport = ");
        assert!(matches!(load_config(&path), Err(Error::Toml(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load_config(&tmp.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn configured_data_dir_wins() {
        let mut cfg = CadenceConfig::default();
        cfg.cron.data_dir = Some(PathBuf::from("/srv/cadence"));
        assert_eq!(data_dir(&cfg), PathBuf::from("/srv/cadence"));
    }
}
