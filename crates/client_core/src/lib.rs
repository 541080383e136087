use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

pub mod api;
pub mod app_state;
pub mod config;
pub mod edit_session;
pub mod error;
pub mod events;
pub mod list_query;
pub mod loader_configs;
pub mod onboarding;
pub mod transport;
pub mod upload;
pub mod validation;

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

pub use api::{HttpPartnerApi, PartnerApi, PartnerListQuery, UploadFile};
pub use app_state::{
    AppStateStore, DashboardView, JsonFileStatePersistence, MemoryStatePersistence,
    PersistedState, StatePersistence,
};
pub use config::{load_settings, ClientSettings};
pub use edit_session::{EditSessionController, EditState, SubmitOutcome};
pub use error::{ClientError, ClientResult, UploadConstraintError};
pub use events::{DashboardEvent, EventHub, Notification, NotificationKind};
pub use list_query::{FetchOutcome, ListQueryState, ListSnapshot, PartnerListController};
pub use loader_configs::{
    DownloadedFile, LoaderConfigController, LoaderConfigSnapshot, LoaderSortKey, SortDirection,
};
pub use onboarding::{OnboardingController, OnboardingOutcome};
pub use upload::{
    BatchUploadReport, CandidateFile, FileSource, FileUploadStatus, PartnerPicker, ScrollMetrics,
    UploadController,
};
pub use validation::{OnboardingDraft, PartnerDraft, PartnerField};

/// Every controller of one admin session wired to a shared backend client
/// and event hub.
pub struct Dashboard {
    settings: ClientSettings,
    hub: Arc<EventHub>,
    app_state: AppStateStore,
    partners: Arc<PartnerListController>,
    editor: EditSessionController,
    onboarding: OnboardingController,
    loader_configs: LoaderConfigController,
    uploads: UploadController,
}

impl Dashboard {
    /// Talks HTTP to `settings.base_url` and keeps UI state in
    /// `settings.state_file`.
    pub async fn connect(settings: ClientSettings) -> ClientResult<Arc<Self>> {
        let api: Arc<dyn PartnerApi> = Arc::new(HttpPartnerApi::new(&settings)?);
        let persistence = Box::new(JsonFileStatePersistence::new(settings.state_file.clone()));
        info!(base_url = %settings.base_url, "dashboard: connecting");
        Ok(Self::new_with_dependencies(settings, api, persistence).await)
    }

    pub async fn new_with_dependencies(
        settings: ClientSettings,
        api: Arc<dyn PartnerApi>,
        persistence: Box<dyn StatePersistence>,
    ) -> Arc<Self> {
        let hub = Arc::new(EventHub::new(settings.notification_ttl));
        let partners = PartnerListController::new(Arc::clone(&api), Arc::clone(&hub), &settings);
        Arc::new(Self {
            app_state: AppStateStore::load(persistence).await,
            editor: EditSessionController::new(
                Arc::clone(&api),
                Arc::clone(&partners),
                Arc::clone(&hub),
            ),
            onboarding: OnboardingController::new(Arc::clone(&api), Arc::clone(&hub)),
            loader_configs: LoaderConfigController::new(Arc::clone(&api), Arc::clone(&hub), &settings),
            uploads: UploadController::new(api, Arc::clone(&hub), &settings),
            partners,
            hub,
            settings,
        })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn events(&self) -> &Arc<EventHub> {
        &self.hub
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<DashboardEvent> {
        self.hub.subscribe()
    }

    pub fn app_state(&self) -> &AppStateStore {
        &self.app_state
    }

    pub fn partners(&self) -> &Arc<PartnerListController> {
        &self.partners
    }

    pub fn editor(&self) -> &EditSessionController {
        &self.editor
    }

    pub fn onboarding(&self) -> &OnboardingController {
        &self.onboarding
    }

    pub fn loader_configs(&self) -> &LoaderConfigController {
        &self.loader_configs
    }

    pub fn uploads(&self) -> &UploadController {
        &self.uploads
    }

    /// Switches the visible view, loading its data the first time it is
    /// shown. Load failures are already reported as notifications.
    pub async fn open_view(&self, view: DashboardView) -> ClientResult<()> {
        self.app_state.set_active_view(view).await;
        match view {
            DashboardView::PartnerList => {
                if self.partners.snapshot().await.items.is_empty() {
                    self.partners.refresh().await?;
                }
            }
            DashboardView::LoaderUpload => {
                self.uploads.picker().load_initial().await?;
            }
            DashboardView::Onboarding | DashboardView::LoaderConfigs => {}
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
