use std::{path::PathBuf, sync::Arc};

use shared::domain::{ConfigId, LoaderType, PartnerId, PartnerOption};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    api::{PartnerApi, PartnerListQuery, UploadFile},
    config::ClientSettings,
    error::{ClientError, ClientResult, UploadConstraintError},
    events::{DashboardEvent, EventHub, NotificationKind},
};

pub const XLS_MIME: &str = "application/vnd.ms-excel";
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    Path(PathBuf),
    Memory(Vec<u8>),
}

/// A file picked or dropped by the user, with the MIME type and size it
/// declared at selection time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub source: FileSource,
}

impl CandidateFile {
    pub fn in_memory(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size: bytes.len() as u64,
            source: FileSource::Memory(bytes),
        }
    }

    pub fn is_spreadsheet_mime(&self) -> bool {
        self.mime_type == XLS_MIME || self.mime_type == XLSX_MIME
    }

    /// Lower-cased extension including the dot, e.g. `.xlsx`.
    pub fn extension(&self) -> Option<String> {
        self.name
            .rfind('.')
            .map(|idx| self.name[idx..].to_ascii_lowercase())
    }

    pub async fn load(&self) -> std::io::Result<UploadFile> {
        let bytes = match &self.source {
            FileSource::Memory(bytes) => bytes.clone(),
            FileSource::Path(path) => tokio::fs::read(path).await?,
        };
        Ok(UploadFile {
            file_name: self.name.clone(),
            mime_type: self.mime_type.clone(),
            bytes,
        })
    }
}

/// Checks a loader-data batch against the current selection. The whole batch
/// is rejected if any file fails.
pub fn check_loader_data_batch(
    already_selected: usize,
    batch: &[CandidateFile],
    max_files: usize,
    max_bytes: u64,
) -> Result<(), UploadConstraintError> {
    let attempted = already_selected + batch.len();
    if attempted > max_files {
        return Err(UploadConstraintError::TooManyFiles {
            max: max_files,
            attempted,
        });
    }
    let rejected: Vec<String> = batch
        .iter()
        .filter(|file| !file.is_spreadsheet_mime() || file.size > max_bytes)
        .map(|file| file.name.clone())
        .collect();
    if !rejected.is_empty() {
        return Err(UploadConstraintError::InvalidFiles {
            rejected,
            max_mb: max_bytes / MB,
        });
    }
    Ok(())
}

/// Config templates are checked by extension rather than declared MIME type.
pub fn check_config_template(file: &CandidateFile, max_bytes: u64) -> Result<(), UploadConstraintError> {
    match file.extension().as_deref() {
        Some(".xlsx") | Some(".xls") => {}
        _ => {
            return Err(UploadConstraintError::UnsupportedExtension {
                file_name: file.name.clone(),
            })
        }
    }
    if file.size > max_bytes {
        return Err(UploadConstraintError::FileTooLarge {
            file_name: file.name.clone(),
            max_mb: max_bytes / MB,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileUploadStatus {
    Uploaded,
    Failed(String),
    /// Not sent because an earlier file in the batch failed.
    NotAttempted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUploadResult {
    pub file_name: String,
    pub status: FileUploadStatus,
}

/// Per-file outcomes of one submit, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchUploadReport {
    pub partner_id: PartnerId,
    pub results: Vec<FileUploadResult>,
}

impl BatchUploadReport {
    pub fn is_success(&self) -> bool {
        self.results
            .iter()
            .all(|r| r.status == FileUploadStatus::Uploaded)
    }

    pub fn uploaded_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == FileUploadStatus::Uploaded)
            .count()
    }

    pub fn summary(&self) -> String {
        if self.is_success() {
            "Upload successful!".to_string()
        } else {
            "Upload failed.".to_string()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_height: f64,
    pub scroll_top: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    pub fn near_bottom(&self, threshold: f64) -> bool {
        self.scroll_height - self.scroll_top <= self.client_height + threshold
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerSnapshot {
    pub options: Vec<PartnerOption>,
    pub loading: bool,
    pub has_more: bool,
    pub error: Option<String>,
}

struct PickerInner {
    options: Vec<PartnerOption>,
    next_page: u32,
    loading: bool,
    has_more: bool,
    started: bool,
    error: Option<String>,
}

/// Partner dropdown that loads further pages as the user scrolls. An empty
/// page means there is nothing more to load.
pub struct PartnerPicker {
    api: Arc<dyn PartnerApi>,
    page_size: u32,
    scroll_threshold: f64,
    inner: Mutex<PickerInner>,
}

impl PartnerPicker {
    pub fn new(api: Arc<dyn PartnerApi>, settings: &ClientSettings) -> Self {
        Self {
            api,
            page_size: settings.picker_page_size,
            scroll_threshold: settings.picker_scroll_threshold,
            inner: Mutex::new(PickerInner {
                options: Vec::new(),
                next_page: 0,
                loading: false,
                has_more: true,
                started: false,
                error: None,
            }),
        }
    }

    pub async fn snapshot(&self) -> PickerSnapshot {
        let guard = self.inner.lock().await;
        PickerSnapshot {
            options: guard.options.clone(),
            loading: guard.loading,
            has_more: guard.has_more,
            error: guard.error.clone(),
        }
    }

    /// Loads the first page once; later calls are no-ops.
    pub async fn load_initial(&self) -> ClientResult<bool> {
        {
            let mut guard = self.inner.lock().await;
            if guard.started {
                return Ok(false);
            }
            guard.started = true;
        }
        self.load_next_page().await
    }

    pub async fn on_scroll(&self, metrics: ScrollMetrics) -> ClientResult<bool> {
        if !metrics.near_bottom(self.scroll_threshold) {
            return Ok(false);
        }
        self.load_next_page().await
    }

    /// Returns false without a request when a page is already loading or the
    /// previous page came back empty.
    pub async fn load_next_page(&self) -> ClientResult<bool> {
        let page = {
            let mut guard = self.inner.lock().await;
            if guard.loading || !guard.has_more {
                return Ok(false);
            }
            guard.loading = true;
            guard.started = true;
            guard.error = None;
            guard.next_page
        };

        debug!(page, "upload: loading partner picker page");
        let result = self
            .api
            .list_partners(&PartnerListQuery {
                page,
                size: self.page_size,
                query: String::new(),
            })
            .await;

        let mut guard = self.inner.lock().await;
        guard.loading = false;
        match result {
            Ok(loaded) => {
                guard.has_more = !loaded.content.is_empty();
                guard.next_page = page + 1;
                guard
                    .options
                    .extend(loaded.content.iter().map(PartnerOption::from));
                Ok(true)
            }
            Err(err) => {
                guard.error = Some(err.notification_text());
                Err(err)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadMessage {
    Error(String),
    Success(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSelection {
    pub partner_id: Option<PartnerId>,
    pub loader_type: LoaderType,
    pub files: Vec<CandidateFile>,
    pub message: Option<UploadMessage>,
}

struct UploadInner {
    selection: UploadSelection,
    submitting: bool,
}

/// Loader-data upload panel: a partner, a loader type and up to
/// `max_upload_files` spreadsheets sent one after another.
pub struct UploadController {
    api: Arc<dyn PartnerApi>,
    hub: Arc<EventHub>,
    picker: PartnerPicker,
    max_files: usize,
    max_bytes: u64,
    config_id: ConfigId,
    inner: Mutex<UploadInner>,
}

impl UploadController {
    pub fn new(api: Arc<dyn PartnerApi>, hub: Arc<EventHub>, settings: &ClientSettings) -> Self {
        Self {
            picker: PartnerPicker::new(Arc::clone(&api), settings),
            api,
            hub,
            max_files: settings.max_upload_files,
            max_bytes: settings.max_loader_data_bytes,
            config_id: settings.loader_config_id.clone(),
            inner: Mutex::new(UploadInner {
                selection: UploadSelection {
                    partner_id: None,
                    loader_type: LoaderType::default(),
                    files: Vec::new(),
                    message: None,
                },
                submitting: false,
            }),
        }
    }

    pub fn picker(&self) -> &PartnerPicker {
        &self.picker
    }

    pub async fn selection(&self) -> UploadSelection {
        self.inner.lock().await.selection.clone()
    }

    pub async fn select_partner(&self, partner_id: Option<PartnerId>) {
        self.inner.lock().await.selection.partner_id = partner_id;
    }

    pub async fn set_loader_type(&self, loader_type: LoaderType) {
        self.inner.lock().await.selection.loader_type = loader_type;
    }

    /// Adds a picked or dropped batch. On rejection the current selection is
    /// kept and the error is recorded as the panel message.
    pub async fn add_files(&self, batch: Vec<CandidateFile>) -> Result<usize, UploadConstraintError> {
        let mut guard = self.inner.lock().await;
        let selection = &mut guard.selection;
        if let Err(err) =
            check_loader_data_batch(selection.files.len(), &batch, self.max_files, self.max_bytes)
        {
            selection.message = Some(UploadMessage::Error(err.to_string()));
            return Err(err);
        }
        selection.files.extend(batch);
        selection.message = None;
        Ok(selection.files.len())
    }

    pub async fn remove_file(&self, index: usize) -> Option<CandidateFile> {
        let mut guard = self.inner.lock().await;
        (index < guard.selection.files.len()).then(|| guard.selection.files.remove(index))
    }

    pub async fn clear_files(&self) {
        let mut guard = self.inner.lock().await;
        guard.selection.files.clear();
        guard.selection.message = None;
    }

    /// Uploads the selected files in order, stopping at the first failure.
    /// Files already sent are not rolled back; the report says which ones
    /// made it.
    pub async fn submit(&self) -> ClientResult<BatchUploadReport> {
        let (partner_id, files) = {
            let mut guard = self.inner.lock().await;
            if guard.submitting {
                return Err(ClientError::InvalidState("upload already in progress".into()));
            }
            let selection = &mut guard.selection;
            let Some(partner_id) = selection.partner_id.clone().filter(|_| !selection.files.is_empty()) else {
                let err = UploadConstraintError::MissingSelection;
                selection.message = Some(UploadMessage::Error(err.to_string()));
                return Err(err.into());
            };
            let files = selection.files.clone();
            guard.submitting = true;
            (partner_id, files)
        };

        info!(partner_id = %partner_id, files = files.len(), config_id = %self.config_id, "upload: starting loader data batch");
        let mut results = Vec::with_capacity(files.len());
        let mut failed = false;
        for file in &files {
            if failed {
                results.push(FileUploadResult {
                    file_name: file.name.clone(),
                    status: FileUploadStatus::NotAttempted,
                });
                continue;
            }
            let status = match self.upload_one(&partner_id, file).await {
                Ok(()) => FileUploadStatus::Uploaded,
                Err(err) => {
                    warn!(partner_id = %partner_id, file = %file.name, error = %err, "upload: file failed");
                    failed = true;
                    FileUploadStatus::Failed(err.to_string())
                }
            };
            results.push(FileUploadResult {
                file_name: file.name.clone(),
                status,
            });
        }

        let report = BatchUploadReport {
            partner_id,
            results,
        };
        {
            let mut guard = self.inner.lock().await;
            guard.submitting = false;
            if report.is_success() {
                guard.selection.files.clear();
                guard.selection.message = Some(UploadMessage::Success(report.summary()));
            } else {
                guard.selection.message = Some(UploadMessage::Error(report.summary()));
            }
        }

        self.hub.emit(DashboardEvent::UploadFinished(report.clone()));
        let kind = if report.is_success() {
            NotificationKind::Success
        } else {
            NotificationKind::Error
        };
        self.hub.notify(kind, report.summary()).await;
        Ok(report)
    }

    async fn upload_one(&self, partner_id: &PartnerId, file: &CandidateFile) -> ClientResult<()> {
        let payload = file.load().await?;
        self.api
            .upload_loader_data(partner_id, &self.config_id, payload)
            .await
    }
}

#[cfg(test)]
#[path = "tests/upload_tests.rs"]
mod tests;
