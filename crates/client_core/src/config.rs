use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::Deserialize;
use shared::domain::ConfigId;
use url::Url;

pub const SETTINGS_FILE: &str = "partner_admin.toml";

const MB: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub request_timeout: Duration,
    pub search_debounce: Duration,
    pub default_page_size: u32,
    pub picker_page_size: u32,
    pub picker_scroll_threshold: f64,
    pub max_upload_files: usize,
    pub max_loader_data_bytes: u64,
    pub max_config_template_bytes: u64,
    pub loader_config_id: ConfigId,
    pub config_sheet_name: String,
    pub notification_ttl: Duration,
    pub state_file: PathBuf,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8085".into(),
            request_timeout: Duration::from_secs(15),
            search_debounce: Duration::from_millis(500),
            default_page_size: 10,
            picker_page_size: 100,
            picker_scroll_threshold: 20.0,
            max_upload_files: 5,
            max_loader_data_bytes: 100 * MB,
            max_config_template_bytes: 5 * MB,
            loader_config_id: ConfigId::new("68dd882d46667987f3297302"),
            config_sheet_name: "Transformation Config".into(),
            notification_ttl: Duration::from_secs(4),
            state_file: PathBuf::from("./data/partner_admin_state.json"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    search_debounce_ms: Option<u64>,
    default_page_size: Option<u32>,
    picker_page_size: Option<u32>,
    loader_config_id: Option<String>,
    config_sheet_name: Option<String>,
    state_file: Option<PathBuf>,
}

impl ClientSettings {
    /// Joins a backend path (starting with `/`) onto the configured base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    fn apply_file(&mut self, file: FileSettings) {
        if let Some(v) = file.base_url {
            self.base_url = v;
        }
        if let Some(v) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.search_debounce_ms {
            self.search_debounce = Duration::from_millis(v);
        }
        if let Some(v) = file.default_page_size {
            self.default_page_size = v;
        }
        if let Some(v) = file.picker_page_size {
            self.picker_page_size = v;
        }
        if let Some(v) = file.loader_config_id {
            self.loader_config_id = ConfigId::new(v);
        }
        if let Some(v) = file.config_sheet_name {
            self.config_sheet_name = v;
        }
        if let Some(v) = file.state_file {
            self.state_file = v;
        }
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("PARTNER_API_URL") {
            self.base_url = v;
        }
        if let Some(v) = lookup("APP__BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.request_timeout = Duration::from_secs(v);
        }
        if let Some(v) = lookup("APP__SEARCH_DEBOUNCE_MS").and_then(|v| v.parse().ok()) {
            self.search_debounce = Duration::from_millis(v);
        }
        if let Some(v) = lookup("APP__DEFAULT_PAGE_SIZE").and_then(|v| v.parse().ok()) {
            self.default_page_size = v;
        }
        if let Some(v) = lookup("APP__LOADER_CONFIG_ID") {
            self.loader_config_id = ConfigId::new(v);
        }
        if let Some(v) = lookup("APP__STATE_FILE") {
            self.state_file = PathBuf::from(v);
        }
    }

    fn validate(self) -> Result<Self> {
        let parsed = Url::parse(&self.base_url)
            .with_context(|| format!("invalid backend base url '{}'", self.base_url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("backend base url must be http(s), got '{}'", self.base_url);
        }
        if self.default_page_size == 0 || self.picker_page_size == 0 {
            anyhow::bail!("page sizes must be greater than zero");
        }
        Ok(self)
    }
}

pub fn load_settings() -> Result<ClientSettings> {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ClientSettings> {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        let file: FileSettings = toml::from_str(&raw)
            .with_context(|| format!("failed to parse settings file '{}'", path.display()))?;
        settings.apply_file(file);
    }

    settings.apply_env(lookup);
    settings.validate()
}
