use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::forum::DEFAULT_BASE_URL;

const DEFAULT_ENV_PREFIX: &str = "THREADVIEW";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub forum: ForumConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForumConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ForumConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            access_token: String::new(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    "threadview-dev/0.1 (+https://github.com/threadview/threadview)".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_requested_fields")]
    pub requested_fields: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            requested_fields: default_requested_fields(),
            timeout: default_timeout(),
        }
    }
}

fn default_page_size() -> u32 {
    10
}

fn default_requested_fields() -> String {
    "profile_image".into()
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    cfg = merge_config(cfg, load_env(prefix)?);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.forum.base_url.is_empty() && other.forum.base_url != default_base_url() {
        base.forum.base_url = other.forum.base_url;
    }
    if !other.forum.access_token.is_empty() {
        base.forum.access_token = other.forum.access_token;
    }
    if !other.forum.user_agent.is_empty() && other.forum.user_agent != default_user_agent() {
        base.forum.user_agent = other.forum.user_agent;
    }

    if other.fetch.page_size != 0 && other.fetch.page_size != default_page_size() {
        base.fetch.page_size = other.fetch.page_size;
    }
    if !other.fetch.requested_fields.is_empty()
        && other.fetch.requested_fields != default_requested_fields()
    {
        base.fetch.requested_fields = other.fetch.requested_fields;
    }
    if other.fetch.timeout != default_timeout() {
        base.fetch.timeout = other.fetch.timeout;
    }

    base
}

fn load_env(prefix: &str) -> Result<Config> {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    if map.is_empty() {
        return Ok(Config::default());
    }

    let mut cfg = Config::default();

    for (key, value) in map {
        apply_env_value(&mut cfg, &key, value);
    }

    Ok(cfg)
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "forum.base_url" => cfg.forum.base_url = value,
        "forum.access_token" => cfg.forum.access_token = value,
        "forum.user_agent" => cfg.forum.user_agent = value,
        "fetch.page_size" => {
            if let Ok(parsed) = value.parse::<u32>() {
                cfg.fetch.page_size = parsed;
            }
        }
        "fetch.requested_fields" => cfg.fetch.requested_fields = value,
        "fetch.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.fetch.timeout = duration;
            }
        }
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("threadview").join("config.yaml"))
}

pub fn save_forum_credentials(
    path: Option<PathBuf>,
    base_url: &str,
    access_token: &str,
    user_agent: &str,
) -> Result<PathBuf> {
    let base_url = base_url.trim();
    let access_token = access_token.trim();
    let user_agent = user_agent.trim();

    anyhow::ensure!(!base_url.is_empty(), "config: forum.base_url is required");
    anyhow::ensure!(
        !access_token.is_empty(),
        "config: forum.access_token is required"
    );

    let path = if let Some(path) = path {
        path
    } else {
        default_config_path().context("config: unable to determine default config path")?
    };

    let mut cfg = if path.exists() {
        read_config_file(&path)?
    } else {
        Config::default()
    };

    cfg.forum.base_url = base_url.to_string();
    cfg.forum.access_token = access_token.to_string();
    if !user_agent.is_empty() {
        cfg.forum.user_agent = user_agent.to_string();
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("config: failed to create directory {}", parent.display()))?;
    }

    let contents = serde_yaml::to_string(&cfg).context("config: failed to serialize config")?;
    fs::write(&path, contents)
        .with_context(|| format!("config: failed to write file {}", path.display()))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::tempdir;

    #[test]
    fn load_defaults_without_files() {
        let cfg = load(LoadOptions::default()).unwrap();
        assert_eq!(cfg.fetch.page_size, 10);
        assert_eq!(cfg.fetch.requested_fields, "profile_image");
        assert_eq!(cfg.forum.base_url, default_base_url());
    }

    #[test]
    fn save_credentials_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        save_forum_credentials(
            Some(path.clone()),
            "https://forum.example.com/",
            "token123",
            "agent/1.0",
        )
        .unwrap();
        let saved = read_config_file(&path).unwrap();
        assert_eq!(saved.forum.access_token, "token123");
        assert_eq!(saved.forum.user_agent, "agent/1.0");
    }

    #[test]
    fn file_values_survive_merge() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "forum:\n  access_token: abc\nfetch:\n  page_size: 25\n  timeout: 5s\n",
        )
        .unwrap();
        let cfg = load(LoadOptions {
            config_file: Some(path),
            env_prefix: Some("THREADVIEW_TEST_UNSET".into()),
        })
        .unwrap();
        assert_eq!(cfg.forum.access_token, "abc");
        assert_eq!(cfg.fetch.page_size, 25);
        assert_eq!(cfg.fetch.timeout, Duration::from_secs(5));
    }

    #[test]
    fn env_overrides() {
        env::set_var("THREADVIEW_FETCH__PAGE_SIZE", "50");
        let cfg = load(LoadOptions::default()).unwrap();
        assert_eq!(cfg.fetch.page_size, 50);
        env::remove_var("THREADVIEW_FETCH__PAGE_SIZE");
    }
}
