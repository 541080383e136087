use std::{cmp::Ordering, sync::Arc};

use icu_collator::{Collator, CollatorOptions, Strength};
use shared::domain::{LoaderConfig, PartnerId};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    api::PartnerApi,
    config::ClientSettings,
    error::{ClientError, ClientResult},
    events::{DashboardEvent, EventHub, NotificationKind},
    upload::{check_config_template, CandidateFile},
};

pub const DEFAULT_DOWNLOAD_NAME: &str = "loader-config.xlsx";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoaderSortKey {
    #[default]
    CreatedAt,
    LoaderId,
    TemplateName,
    LoaderType,
    UploadedBy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// Case-insensitive substring match on loader id, template name and uploader.
/// A blank term keeps every row.
pub fn filter_configs<'a>(configs: &'a [LoaderConfig], term: &str) -> Vec<&'a LoaderConfig> {
    let needle = term.trim().to_lowercase();
    configs
        .iter()
        .filter(|config| {
            needle.is_empty()
                || [&config.loader_id, &config.template_name, &config.uploaded_by]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
        })
        .collect()
}

/// Root-locale collation at secondary strength: accents order, case does not.
fn text_collator() -> Option<Collator> {
    let mut options = CollatorOptions::new();
    options.strength = Some(Strength::Secondary);
    match Collator::try_new(&Default::default(), options) {
        Ok(collator) => Some(collator),
        Err(err) => {
            warn!(error = %err, "loaders: collator unavailable, sorting by lowercase text");
            None
        }
    }
}

fn compare_by(
    collator: Option<&Collator>,
    key: LoaderSortKey,
    a: &LoaderConfig,
    b: &LoaderConfig,
) -> Ordering {
    let text = |a: &str, b: &str| match collator {
        Some(collator) => collator.compare(a, b),
        None => a.to_lowercase().cmp(&b.to_lowercase()),
    };
    match key {
        LoaderSortKey::CreatedAt => a.created_at_millis().cmp(&b.created_at_millis()),
        LoaderSortKey::LoaderId => text(&a.loader_id, &b.loader_id),
        LoaderSortKey::TemplateName => text(&a.template_name, &b.template_name),
        LoaderSortKey::LoaderType => text(&a.loader_type, &b.loader_type),
        LoaderSortKey::UploadedBy => text(&a.uploaded_by, &b.uploaded_by),
    }
}

/// Stable sort; rows that compare equal keep their relative order in both
/// directions.
pub fn sort_configs(configs: &mut [&LoaderConfig], key: LoaderSortKey, direction: SortDirection) {
    let collator = match key {
        LoaderSortKey::CreatedAt => None,
        _ => text_collator(),
    };
    configs.sort_by(|a, b| {
        let ord = compare_by(collator.as_ref(), key, a, b);
        match direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
}

/// Filter first, then sort.
pub fn visible_configs(
    configs: &[LoaderConfig],
    term: &str,
    key: LoaderSortKey,
    direction: SortDirection,
) -> Vec<LoaderConfig> {
    let mut rows = filter_configs(configs, term);
    sort_configs(&mut rows, key, direction);
    rows.into_iter().cloned().collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoaderConfigSnapshot {
    pub partner_id: Option<PartnerId>,
    pub configs: Vec<LoaderConfig>,
    pub search_term: String,
    pub sort_key: LoaderSortKey,
    pub sort_direction: SortDirection,
    pub active_loader: Option<String>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Default)]
struct LoaderInner {
    view: LoaderConfigSnapshot,
    issued_seq: u64,
    uploading: bool,
}

/// Loader configurations of one selected partner, fetched in full and then
/// filtered and sorted locally.
pub struct LoaderConfigController {
    api: Arc<dyn PartnerApi>,
    hub: Arc<EventHub>,
    max_template_bytes: u64,
    sheet_name: String,
    inner: Mutex<LoaderInner>,
}

impl LoaderConfigController {
    pub fn new(api: Arc<dyn PartnerApi>, hub: Arc<EventHub>, settings: &ClientSettings) -> Self {
        Self {
            api,
            hub,
            max_template_bytes: settings.max_config_template_bytes,
            sheet_name: settings.config_sheet_name.clone(),
            inner: Mutex::new(LoaderInner::default()),
        }
    }

    pub async fn snapshot(&self) -> LoaderConfigSnapshot {
        self.inner.lock().await.view.clone()
    }

    pub async fn visible(&self) -> Vec<LoaderConfig> {
        let guard = self.inner.lock().await;
        let view = &guard.view;
        visible_configs(&view.configs, &view.search_term, view.sort_key, view.sort_direction)
    }

    /// Switches the view to `partner_id` and loads its configurations. The
    /// previous partner's rows and active loader are dropped before the
    /// request goes out.
    pub async fn select_partner(&self, partner_id: PartnerId) -> ClientResult<usize> {
        {
            let mut guard = self.inner.lock().await;
            guard.view.partner_id = Some(partner_id.clone());
            guard.view.configs.clear();
            guard.view.active_loader = None;
        }
        self.load(partner_id).await
    }

    /// Re-fetches the configurations of the selected partner.
    pub async fn reload(&self) -> ClientResult<usize> {
        let partner_id = self.selected_partner().await?;
        self.load(partner_id).await
    }

    pub async fn reset(&self) {
        let mut guard = self.inner.lock().await;
        guard.issued_seq += 1;
        guard.view = LoaderConfigSnapshot::default();
    }

    pub async fn set_search_term(&self, term: impl Into<String>) {
        self.inner.lock().await.view.search_term = term.into();
    }

    pub async fn set_sort(&self, key: LoaderSortKey, direction: SortDirection) {
        let mut guard = self.inner.lock().await;
        guard.view.sort_key = key;
        guard.view.sort_direction = direction;
    }

    /// Clicking the current sort column flips its direction; a new column
    /// starts ascending.
    pub async fn toggle_sort(&self, key: LoaderSortKey) {
        let mut guard = self.inner.lock().await;
        if guard.view.sort_key == key {
            guard.view.sort_direction = guard.view.sort_direction.toggled();
        } else {
            guard.view.sort_key = key;
            guard.view.sort_direction = SortDirection::Asc;
        }
    }

    /// Marks one loader as active. Local only; nothing is sent.
    pub async fn set_active(&self, loader_id: Option<String>) -> ClientResult<()> {
        let mut guard = self.inner.lock().await;
        if let Some(id) = &loader_id {
            if !guard.view.configs.iter().any(|c| &c.loader_id == id) {
                return Err(ClientError::InvalidState(format!("unknown loader {id}")));
            }
        }
        guard.view.active_loader = loader_id;
        Ok(())
    }

    pub async fn upload_template(&self, file: CandidateFile) -> ClientResult<()> {
        check_config_template(&file, self.max_template_bytes)?;
        let partner_id = self.selected_partner().await?;
        {
            let mut guard = self.inner.lock().await;
            if guard.uploading {
                return Err(ClientError::InvalidState("template upload already in progress".into()));
            }
            guard.uploading = true;
        }

        let result = match file.load().await {
            Ok(payload) => {
                self.api
                    .upload_config_template(&partner_id, &self.sheet_name, payload)
                    .await
            }
            Err(err) => Err(err.into()),
        };
        self.inner.lock().await.uploading = false;

        match result {
            Ok(()) => {
                info!(partner_id = %partner_id, file = %file.name, "loaders: config template uploaded");
                self.hub
                    .notify(NotificationKind::Success, "File uploaded successfully")
                    .await;
                if let Err(err) = self.reload().await {
                    warn!(partner_id = %partner_id, error = %err, "loaders: refresh after upload failed");
                }
                Ok(())
            }
            Err(err) => {
                warn!(partner_id = %partner_id, file = %file.name, error = %err, "loaders: config template upload failed");
                self.hub.notify(NotificationKind::Error, "Upload failed").await;
                Err(err)
            }
        }
    }

    /// Fetches one loader's file. The saved name is the row's template name,
    /// or `loader-config.xlsx` when the row is unknown or has none.
    pub async fn download(&self, loader_id: &str) -> ClientResult<DownloadedFile> {
        if loader_id.trim().is_empty() {
            return Err(ClientError::InvalidState("loader has no id to download".into()));
        }
        let (partner_id, file_name) = {
            let guard = self.inner.lock().await;
            let partner_id = guard
                .view
                .partner_id
                .clone()
                .ok_or_else(|| ClientError::InvalidState("no partner selected".into()))?;
            let file_name = guard
                .view
                .configs
                .iter()
                .find(|config| config.loader_id == loader_id)
                .map(|config| config.template_name.trim())
                .filter(|name| !name.is_empty())
                .unwrap_or(DEFAULT_DOWNLOAD_NAME)
                .to_string();
            (partner_id, file_name)
        };
        match self.api.download_loader_config(&partner_id, loader_id).await {
            Ok(bytes) => {
                debug!(partner_id = %partner_id, loader_id, bytes = bytes.len(), "loaders: downloaded config");
                Ok(DownloadedFile { file_name, bytes })
            }
            Err(err) => {
                warn!(partner_id = %partner_id, loader_id, error = %err, "loaders: download failed");
                self.hub
                    .notify(NotificationKind::Error, "Failed to download file")
                    .await;
                Err(err)
            }
        }
    }

    async fn selected_partner(&self) -> ClientResult<PartnerId> {
        self.inner
            .lock()
            .await
            .view
            .partner_id
            .clone()
            .ok_or_else(|| ClientError::InvalidState("no partner selected".into()))
    }

    async fn load(&self, partner_id: PartnerId) -> ClientResult<usize> {
        let seq = {
            let mut guard = self.inner.lock().await;
            guard.issued_seq += 1;
            guard.view.loading = true;
            guard.view.error = None;
            guard.issued_seq
        };

        let result = self.api.list_loader_configs(&partner_id).await;

        let mut guard = self.inner.lock().await;
        if seq != guard.issued_seq {
            debug!(seq, partner_id = %partner_id, "loaders: discarding stale configs response");
            return Ok(0);
        }
        guard.view.loading = false;
        match result {
            Ok(configs) => {
                let count = configs.len();
                guard.view.configs = configs;
                drop(guard);
                self.hub
                    .emit(DashboardEvent::LoaderConfigsLoaded { partner_id, count });
                Ok(count)
            }
            Err(err) => {
                let message = err.notification_text();
                guard.view.configs.clear();
                guard.view.active_loader = None;
                guard.view.error = Some(message.clone());
                drop(guard);
                warn!(partner_id = %partner_id, error = %err, "loaders: failed to load configs");
                self.hub
                    .emit(DashboardEvent::LoaderConfigsFailed { partner_id, message });
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/loader_configs_tests.rs"]
mod tests;
