use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::storage::Bucket;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/vidshare-env";
pub const DEFAULT_VIDSHARE_PORT: u16 = 8080;
pub const DEFAULT_VIDSHARE_HOST: &str = "127.0.0.1";
pub const DEFAULT_CATALOG_DB: &str = "/var/lib/vidshare/catalog.db";
pub const DEFAULT_YOUTUBE_API_URL: &str = "https://www.googleapis.com/youtube/v3";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Every key the env file understands. Values left out stay `None` so the
/// process environment and the built-in defaults can fill them in later.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub storage_url: Option<String>,
    pub storage_key: Option<String>,
    pub youtube_api_key: Option<String>,
    pub youtube_api_url: Option<String>,
    pub catalog_db: Option<PathBuf>,
    pub vidshare_host: Option<String>,
    pub vidshare_port: Option<u16>,
    pub video_url_ttl: Option<u64>,
    pub thumbnail_url_ttl: Option<u64>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`.
    pub format: String,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub storage_url: Option<String>,
    pub storage_key: Option<String>,
    pub youtube_api_key: Option<String>,
    pub youtube_api_url: String,
    pub catalog_db: PathBuf,
    pub host: String,
    pub port: u16,
    pub video_url_ttl: u64,
    pub thumbnail_url_ttl: u64,
    pub logging: LoggingConfig,
}

impl EnvConfig {
    fn set(&mut self, key: &str, value: &str, origin: &str) -> Result<()> {
        let owned = || (!value.is_empty()).then(|| value.to_string());
        match key {
            "STORAGE_URL" => self.storage_url = owned(),
            "STORAGE_KEY" => self.storage_key = owned(),
            "YOUTUBE_API_KEY" => self.youtube_api_key = owned(),
            "YOUTUBE_API_URL" => self.youtube_api_url = owned(),
            "CATALOG_DB" => self.catalog_db = owned().map(PathBuf::from),
            "VIDSHARE_HOST" => self.vidshare_host = owned(),
            "VIDSHARE_PORT" => {
                let port: u16 = value
                    .parse()
                    .with_context(|| format!("Parsing VIDSHARE_PORT from {origin}"))?;
                self.vidshare_port = Some(port);
            }
            "VIDEO_URL_TTL" => {
                let ttl: u64 = value
                    .parse()
                    .with_context(|| format!("Parsing VIDEO_URL_TTL from {origin}"))?;
                self.video_url_ttl = Some(ttl);
            }
            "THUMBNAIL_URL_TTL" => {
                let ttl: u64 = value
                    .parse()
                    .with_context(|| format!("Parsing THUMBNAIL_URL_TTL from {origin}"))?;
                self.thumbnail_url_ttl = Some(ttl);
            }
            "LOG_LEVEL" => self.log_level = owned(),
            "LOG_FORMAT" => self.log_format = owned(),
            _ => {}
        }
        Ok(())
    }
}

const KNOWN_KEYS: &[&str] = &[
    "STORAGE_URL",
    "STORAGE_KEY",
    "YOUTUBE_API_KEY",
    "YOUTUBE_API_URL",
    "CATALOG_DB",
    "VIDSHARE_HOST",
    "VIDSHARE_PORT",
    "VIDEO_URL_TTL",
    "THUMBNAIL_URL_TTL",
    "LOG_LEVEL",
    "LOG_FORMAT",
];

pub fn read_env_config(path: &Path) -> Result<Option<EnvConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    let origin = path.display().to_string();
    let mut cfg = EnvConfig::default();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some((key, value_raw)) = trimmed.split_once('=') {
            let value = value_raw.trim().trim_matches('"');
            cfg.set(key.trim(), value, &origin)?;
        }
    }
    Ok(Some(cfg))
}

/// Layers variables from `lookup` (normally the process environment) over the
/// file values. Empty variables are ignored.
pub fn apply_env_overrides<F>(cfg: &mut EnvConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    for key in KNOWN_KEYS {
        if let Some(value) = lookup(key).filter(|value| !value.is_empty()) {
            cfg.set(key, &value, "environment")?;
        }
    }
    Ok(())
}

pub fn load_runtime_config_from(path: impl AsRef<Path>) -> Result<RuntimeConfig> {
    load_runtime_config_with(path, |key| std::env::var(key).ok())
}

pub fn load_runtime_config_with<F>(path: impl AsRef<Path>, lookup: F) -> Result<RuntimeConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let path = path.as_ref();
    let mut cfg = read_env_config(path)?.unwrap_or_default();
    apply_env_overrides(&mut cfg, lookup)?;

    Ok(RuntimeConfig {
        storage_url: cfg.storage_url,
        storage_key: cfg.storage_key,
        youtube_api_key: cfg.youtube_api_key,
        youtube_api_url: cfg
            .youtube_api_url
            .unwrap_or_else(|| DEFAULT_YOUTUBE_API_URL.to_string()),
        catalog_db: cfg
            .catalog_db
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG_DB)),
        host: cfg
            .vidshare_host
            .unwrap_or_else(|| DEFAULT_VIDSHARE_HOST.to_string()),
        port: cfg.vidshare_port.unwrap_or(DEFAULT_VIDSHARE_PORT),
        video_url_ttl: cfg
            .video_url_ttl
            .unwrap_or(Bucket::Videos.default_ttl_secs()),
        thumbnail_url_ttl: cfg
            .thumbnail_url_ttl
            .unwrap_or(Bucket::Thumbnails.default_ttl_secs()),
        logging: LoggingConfig {
            level: cfg
                .log_level
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            format: cfg.log_format.unwrap_or_else(|| "pretty".to_string()),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn read_env_config_extracts_port() {
        let cfg = make_config("STORAGE_URL=\"https://store\"\nVIDSHARE_PORT=\"4242\"\n");
        let parsed = read_env_config(cfg.path()).unwrap().unwrap();
        assert_eq!(parsed.vidshare_port, Some(4242));
        assert_eq!(parsed.storage_url.as_deref(), Some("https://store"));
    }

    #[test]
    fn read_env_config_rejects_bad_ttl() {
        let cfg = make_config("VIDEO_URL_TTL=soon\n");
        assert!(read_env_config(cfg.path()).is_err());
    }

    #[test]
    fn runtime_config_defaults_missing_values() {
        let cfg = make_config("# nothing but a comment\n");
        let runtime = load_runtime_config_with(cfg.path(), no_env).unwrap();
        assert_eq!(runtime.port, DEFAULT_VIDSHARE_PORT);
        assert_eq!(runtime.host, DEFAULT_VIDSHARE_HOST);
        assert_eq!(runtime.video_url_ttl, 7200);
        assert_eq!(runtime.thumbnail_url_ttl, 86400);
        assert_eq!(runtime.youtube_api_url, DEFAULT_YOUTUBE_API_URL);
        assert!(runtime.youtube_api_key.is_none());
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let runtime =
            load_runtime_config_with("/nonexistent/vidshare-env", no_env).unwrap();
        assert_eq!(runtime.catalog_db, PathBuf::from(DEFAULT_CATALOG_DB));
    }

    #[test]
    fn environment_overrides_file() {
        let cfg = make_config("YOUTUBE_API_KEY=from-file\nVIDSHARE_HOST=0.0.0.0\n");
        let runtime = load_runtime_config_with(cfg.path(), |key| match key {
            "YOUTUBE_API_KEY" => Some("from-env".to_string()),
            "VIDSHARE_HOST" => Some(String::new()),
            _ => None,
        })
        .unwrap();
        assert_eq!(runtime.youtube_api_key.as_deref(), Some("from-env"));
        assert_eq!(runtime.host, "0.0.0.0");
    }
}
