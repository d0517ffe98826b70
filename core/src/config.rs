use crate::error::EaselErr;
use crate::error::Result;
use easel_api::DEFAULT_BASE_URL;
use easel_api::DEFAULT_INSTRUCTIONS;
use easel_api::DEFAULT_MODEL;
use easel_api::DoneSentinel;
use easel_api::Provider;
use easel_utils_home_dir::find_easel_home;
use http::HeaderMap;
use http::HeaderName;
use http::HeaderValue;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

pub const CONFIG_TOML_FILE: &str = "config.toml";

/// Largest fraction of the canvas a committed image may cover by default.
pub const DEFAULT_COMMIT_SCALE: f64 = 0.6;

/// Base config deserialized from `$EASEL_HOME/config.toml`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigToml {
    /// Model id sent with every generation request.
    pub model: Option<String>,

    /// Provider API root; `chat/completions` is appended.
    pub base_url: Option<String>,

    /// Replaces the built-in system instructions.
    pub instructions: Option<String>,

    /// Abort a response that stays silent this long between lines.
    pub stream_idle_timeout_ms: Option<u64>,

    /// Per-request timeout.
    pub request_timeout_ms: Option<u64>,

    pub done_sentinel: Option<DoneSentinel>,

    /// Keep at most this many undo snapshots.
    pub max_history_entries: Option<usize>,

    pub commit_scale: Option<f64>,

    /// Extra headers sent with every provider request, such as
    /// `HTTP-Referer` and `X-Title` for OpenRouter's app attribution.
    pub http_headers: Option<BTreeMap<String, String>>,
}

/// Values that take precedence over `config.toml`, typically from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub model: Option<String>,
    pub base_url: Option<String>,
}

/// Application configuration loaded from disk and merged with overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub model: String,
    pub base_url: String,
    pub instructions: String,
    pub stream_idle_timeout: Option<Duration>,
    pub request_timeout: Option<Duration>,
    pub done_sentinel: DoneSentinel,
    pub max_history_entries: Option<NonZeroUsize>,
    pub commit_scale: f64,
    pub http_headers: HeaderMap,
    /// Directory holding `config.toml` and `storage.json`.
    pub easel_home: PathBuf,
}

impl Config {
    /// Loads `config.toml` from the resolved home directory.
    pub fn load_with_overrides(overrides: ConfigOverrides) -> Result<Self> {
        let easel_home = find_easel_home()?;
        let cfg = load_config_as_toml(&easel_home)?;
        Self::load_from_base_config_with_overrides(cfg, overrides, easel_home)
    }

    pub fn load_from_base_config_with_overrides(
        cfg: ConfigToml,
        overrides: ConfigOverrides,
        easel_home: PathBuf,
    ) -> Result<Self> {
        let ConfigOverrides { model, base_url } = overrides;

        let commit_scale = cfg.commit_scale.unwrap_or(DEFAULT_COMMIT_SCALE);
        if !(commit_scale > 0.0 && commit_scale <= 1.0) {
            return Err(EaselErr::Config(format!(
                "commit_scale must be in (0, 1], got {commit_scale}"
            )));
        }

        let http_headers = parse_http_headers(cfg.http_headers.unwrap_or_default())?;

        Ok(Self {
            model: model
                .or(cfg.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: base_url
                .or(cfg.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            instructions: cfg
                .instructions
                .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
            stream_idle_timeout: cfg.stream_idle_timeout_ms.map(Duration::from_millis),
            request_timeout: cfg.request_timeout_ms.map(Duration::from_millis),
            done_sentinel: cfg.done_sentinel.unwrap_or_default(),
            max_history_entries: cfg.max_history_entries.and_then(NonZeroUsize::new),
            commit_scale,
            http_headers,
            easel_home,
        })
    }

    /// Defaults rooted at `easel_home`, ignoring any file on disk.
    pub fn for_home(easel_home: PathBuf) -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            stream_idle_timeout: None,
            request_timeout: None,
            done_sentinel: DoneSentinel::default(),
            max_history_entries: None,
            commit_scale: DEFAULT_COMMIT_SCALE,
            http_headers: HeaderMap::new(),
            easel_home,
        }
    }

    pub fn provider(&self) -> Provider {
        Provider {
            base_url: self.base_url.clone(),
            headers: self.http_headers.clone(),
            request_timeout: self.request_timeout,
            stream_idle_timeout: self.stream_idle_timeout,
        }
    }
}

fn parse_http_headers(headers: BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header_name = HeaderName::try_from(name.as_str())
            .map_err(|e| EaselErr::Config(format!("invalid header name {name:?}: {e}")))?;
        let header_value = HeaderValue::try_from(value.as_str())
            .map_err(|e| EaselErr::Config(format!("invalid value for header {name}: {e}")))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

/// Reads `config.toml` under `easel_home`. A missing file is an empty
/// config; a malformed one is an error.
pub fn load_config_as_toml(easel_home: &Path) -> Result<ConfigToml> {
    let path = easel_home.join(CONFIG_TOML_FILE);
    match std::fs::read_to_string(&path) {
        Ok(contents) => toml::from_str::<ConfigToml>(&contents)
            .map_err(|e| EaselErr::Config(format!("failed to parse {}: {e}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("{} not found, using defaults", path.display());
            Ok(ConfigToml::default())
        }
        Err(e) => Err(e.into()),
    }
}
