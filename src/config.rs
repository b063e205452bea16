use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use url::Url;

use crate::core::feed::FeedOptions;
use crate::core::keyring;
use crate::core::models::DEFAULT_PAGE_SIZE;

/// Where notifications come from, with secrets resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Remote { base_url: Url, session_key: String },
    Local { path: Option<PathBuf> },
}

/// Runtime config. The session key is always a plain String in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub source: Source,
    pub recipient_id: i64,
    pub page_size: u32,
    pub scroll_threshold: f32,
    pub embed_user_from: bool,
    pub embed_user_to: bool,
    pub desktop_alerts: bool,
    pub count_refresh_secs: u64,
}

/// On-disk representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub source: SourceConfig,
    pub recipient_id: i64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub scroll_threshold: f32,
    #[serde(default = "default_true")]
    pub embed_user_from: bool,
    #[serde(default)]
    pub embed_user_to: bool,
    #[serde(default = "default_true")]
    pub desktop_alerts: bool,
    #[serde(default = "default_refresh_secs")]
    pub count_refresh_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend")]
pub enum SourceConfig {
    #[serde(rename = "remote")]
    Remote {
        base_url: String,
        username: String,
        session: SessionKeyBackend,
    },
    #[serde(rename = "local")]
    Local {
        #[serde(default)]
        path: Option<PathBuf>,
    },
}

/// Session key is either a keyring reference or plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "store")]
pub enum SessionKeyBackend {
    #[serde(rename = "keyring")]
    Keyring,
    #[serde(rename = "plaintext")]
    Plaintext { value: String },
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_true() -> bool {
    true
}

fn default_refresh_secs() -> u64 {
    5 * 60
}

/// Page size from a raw setting; unparsable values fall back to the default
/// and zero is raised to 1.
fn page_size_from(raw: Option<&str>) -> u32 {
    raw.and_then(|p| p.trim().parse::<u32>().ok())
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .max(1)
}

fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("notifeed")
        .join("config.json")
}

/// Parse a site URL and make sure it ends with a slash so relative joins
/// stay under the site path.
pub fn parse_base_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw.trim()).map_err(|e| format!("invalid site url {raw:?}: {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported url scheme: {}", url.scheme()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

impl FileConfig {
    pub fn load() -> Result<Option<Self>, String> {
        let path = config_path();
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path).map_err(|e| format!("read config: {e}"))?;
        Self::parse(&data).map(Some)
    }

    pub fn parse(data: &str) -> Result<Self, String> {
        serde_json::from_str(data).map_err(|e| format!("parse config: {e}"))
    }

    pub fn save(&self) -> Result<(), String> {
        let path = config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("create config dir: {e}"))?;
        }
        let data = serde_json::to_string_pretty(self).map_err(|e| format!("serialize config: {e}"))?;
        fs::write(&path, data).map_err(|e| format!("write config: {e}"))
    }
}

impl Config {
    /// Try env vars. Returns None unless a site URL, session key and user id are set.
    pub fn from_env() -> Option<Result<Self, String>> {
        let base_url = std::env::var("NOTIFEED_URL").ok()?;
        let session_key = std::env::var("NOTIFEED_SESSION_KEY").ok()?;
        let recipient_id = std::env::var("NOTIFEED_USER_ID").ok()?.parse().ok()?;
        let page_size = page_size_from(std::env::var("NOTIFEED_PAGE_SIZE").ok().as_deref());

        Some(parse_base_url(&base_url).map(|base_url| Config {
            source: Source::Remote {
                base_url,
                session_key,
            },
            recipient_id,
            page_size,
            scroll_threshold: 0.0,
            embed_user_from: true,
            embed_user_to: false,
            desktop_alerts: true,
            count_refresh_secs: default_refresh_secs(),
        }))
    }

    /// Build runtime Config from a FileConfig + resolved source.
    pub fn from_file_config(fc: &FileConfig, source: Source) -> Self {
        Config {
            source,
            recipient_id: fc.recipient_id,
            page_size: fc.page_size.max(1),
            scroll_threshold: fc.scroll_threshold.max(0.0),
            embed_user_from: fc.embed_user_from,
            embed_user_to: fc.embed_user_to,
            desktop_alerts: fc.desktop_alerts,
            count_refresh_secs: fc.count_refresh_secs,
        }
    }

    /// Offline default: the local store, showing user 1.
    pub fn local_default() -> Self {
        let recipient_id = std::env::var("NOTIFEED_USER_ID")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);
        Config {
            source: Source::Local {
                path: std::env::var("NOTIFEED_DB").ok().map(PathBuf::from),
            },
            recipient_id,
            page_size: DEFAULT_PAGE_SIZE,
            scroll_threshold: 0.0,
            embed_user_from: true,
            embed_user_to: false,
            desktop_alerts: true,
            count_refresh_secs: default_refresh_secs(),
        }
    }

    /// Resolution order: env vars → config file + keyring → local store.
    pub fn resolve() -> Result<Self, String> {
        // 1. Env vars override everything
        if let Some(config) = Self::from_env() {
            log::info!("Config loaded from environment variables");
            return config;
        }

        // 2. Config file + keyring
        match FileConfig::load() {
            Ok(Some(fc)) => {
                let source = match &fc.source {
                    SourceConfig::Local { path } => Source::Local { path: path.clone() },
                    SourceConfig::Remote {
                        base_url,
                        username,
                        session,
                    } => {
                        let base_url = parse_base_url(base_url)?;
                        let session_key = match session {
                            SessionKeyBackend::Plaintext { value } => {
                                log::info!("Config loaded from file (plaintext session key)");
                                value.clone()
                            }
                            SessionKeyBackend::Keyring => {
                                let host = base_url.host_str().unwrap_or_default();
                                let key = keyring::get_session_key(username, host)
                                    .map_err(|e| format!("Keyring unavailable: {e}"))?;
                                log::info!("Config loaded from file + keyring");
                                key
                            }
                        };
                        Source::Remote {
                            base_url,
                            session_key,
                        }
                    }
                };
                Ok(Self::from_file_config(&fc, source))
            }
            Ok(None) => {
                log::info!("No config file found, using the local notification store");
                Ok(Self::local_default())
            }
            Err(e) => Err(e),
        }
    }

    pub fn feed_options(&self) -> FeedOptions {
        FeedOptions {
            recipient_id: self.recipient_id,
            page_size: self.page_size,
            embed_user_from: self.embed_user_from,
            embed_user_to: self.embed_user_to,
            scroll_threshold: self.scroll_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_file_config_with_defaults() {
        let fc = FileConfig::parse(
            r#"{
                "source": {
                    "backend": "remote",
                    "base_url": "https://lms.example.org/moodle",
                    "username": "student",
                    "session": {"store": "keyring"}
                },
                "recipient_id": 42
            }"#,
        )
        .unwrap();
        assert_eq!(fc.page_size, 20);
        assert!(fc.desktop_alerts);
        assert_eq!(fc.count_refresh_secs, 300);
        assert!(matches!(
            fc.source,
            SourceConfig::Remote {
                session: SessionKeyBackend::Keyring,
                ..
            }
        ));
    }

    #[test]
    fn local_file_config_builds_options() {
        let fc = FileConfig::parse(
            r#"{"source": {"backend": "local"}, "recipient_id": 3, "page_size": 0, "scroll_threshold": 24.0}"#,
        )
        .unwrap();
        let config = Config::from_file_config(&fc, Source::Local { path: None });
        let options = config.feed_options();
        assert_eq!(options.recipient_id, 3);
        assert_eq!(options.page_size, 1);
        assert_eq!(options.scroll_threshold, 24.0);
    }

    #[test]
    fn env_page_size_is_never_zero() {
        assert_eq!(page_size_from(None), DEFAULT_PAGE_SIZE);
        assert_eq!(page_size_from(Some("0")), 1);
        assert_eq!(page_size_from(Some(" 35 ")), 35);
        assert_eq!(page_size_from(Some("lots")), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let url = parse_base_url("https://lms.example.org/moodle").unwrap();
        assert_eq!(url.as_str(), "https://lms.example.org/moodle/");
        assert!(parse_base_url("ftp://lms.example.org").is_err());
        assert!(parse_base_url("not a url").is_err());
    }
}
