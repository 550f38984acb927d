use std::fs;
use std::{env, path::PathBuf};

use color_eyre::Result;
use directories::ProjectDirs;
use lazy_static::lazy_static;
use registration::BackendConfig;
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub config_dir: PathBuf,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default, flatten)]
    pub config: AppConfig,
    #[serde(default)]
    pub backend: BackendConfig,
}

lazy_static! {
    pub static ref PROJECT_NAME: String = "HOSTEL_WIZARD".to_string();
    pub static ref DATA_FOLDER: Option<PathBuf> =
        env::var(format!("{}_DATA", PROJECT_NAME.clone()))
            .ok()
            .map(PathBuf::from);
    pub static ref CONFIG_FOLDER: Option<PathBuf> =
        env::var(format!("{}_CONFIG", PROJECT_NAME.clone()))
            .ok()
            .map(PathBuf::from);
}

/// Name of the session file inside the data directory.
pub const SESSION_FILE: &str = "session.json";

impl Config {
    /// Defaults, then `config.json5`/`config.toml` from the config directory,
    /// then `HOSTEL_WIZARD__*` environment variables.
    pub fn new() -> Result<Self, config::ConfigError> {
        Self::load_from(get_config_dir(), get_data_dir())
    }

    pub fn load_from(config_dir: PathBuf, data_dir: PathBuf) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("data_dir", data_dir.to_string_lossy().to_string())?
            .set_default("config_dir", config_dir.to_string_lossy().to_string())?;

        let config_files = [
            ("config.json5", config::FileFormat::Json5),
            ("config.toml", config::FileFormat::Toml),
        ];
        let mut found_config = false;
        for (file, format) in &config_files {
            let source = config::File::from(config_dir.join(file))
                .format(*format)
                .required(false);
            builder = builder.add_source(source);
            if config_dir.join(file).exists() {
                found_config = true
            }
        }
        if !found_config {
            info!("No configuration file found, using built-in backend settings");
        }

        builder = builder.add_source(
            config::Environment::with_prefix(PROJECT_NAME.as_str())
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let cfg: Self = builder.build()?.try_deserialize()?;
        if cfg.backend.base_url.trim().is_empty() {
            warn!("backend.base_url is empty; requests will fail");
        }
        Ok(cfg)
    }

    pub fn session_path(&self) -> PathBuf {
        self.config.data_dir.join(SESSION_FILE)
    }
}

pub fn get_data_dir() -> PathBuf {
    if let Some(s) = DATA_FOLDER.clone() {
        s
    } else if let Some(proj_dirs) = project_directory() {
        proj_dirs.data_local_dir().to_path_buf()
    } else {
        PathBuf::from(".").join(".data")
    }
}

pub fn get_config_dir() -> PathBuf {
    if let Some(s) = CONFIG_FOLDER.clone() {
        s
    } else if let Some(proj_dirs) = project_directory() {
        proj_dirs.config_local_dir().to_path_buf()
    } else {
        PathBuf::from(".").join(".config")
    }
}

fn project_directory() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "hostel", "hostel-wizard")
}

pub fn ensure_data_dir_exists() -> std::io::Result<PathBuf> {
    let data_dir = get_data_dir();
    if !data_dir.exists() {
        fs::create_dir_all(&data_dir)?;
    }
    Ok(data_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn scratch_dir(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = env::temp_dir().join(format!("hostel-wizard-cfg-{tag}-{nanos}"));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn defaults_without_files() {
        let dir = scratch_dir("empty");
        let cfg = Config::load_from(dir.clone(), dir.join("data")).unwrap();
        assert_eq!(cfg.backend, BackendConfig::default());
        assert_eq!(cfg.session_path(), dir.join("data").join(SESSION_FILE));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn json5_file_overrides_backend() {
        let dir = scratch_dir("json5");
        fs::write(
            dir.join("config.json5"),
            r#"{
                // staging backend
                backend: { base_url: "https://staging.hostel.example", request_timeout_secs: 5 },
            }"#,
        )
        .unwrap();
        let cfg = Config::load_from(dir.clone(), dir.join("data")).unwrap();
        assert_eq!(cfg.backend.base_url, "https://staging.hostel.example");
        assert_eq!(cfg.backend.request_timeout_secs, 5);
        assert_eq!(cfg.backend.endpoints.send_code, "/sendcode");
        let _ = fs::remove_dir_all(dir);
    }
}
