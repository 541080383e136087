use std::{
    path::{Path, PathBuf},
    sync::Mutex as StdMutex,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardView {
    Onboarding,
    #[default]
    PartnerList,
    LoaderConfigs,
    LoaderUpload,
}

impl DashboardView {
    pub const ALL: [DashboardView; 4] = [
        DashboardView::Onboarding,
        DashboardView::PartnerList,
        DashboardView::LoaderConfigs,
        DashboardView::LoaderUpload,
    ];

    pub fn title(self) -> &'static str {
        match self {
            DashboardView::Onboarding => "Partner Onboarding",
            DashboardView::PartnerList => "Partner Listing",
            DashboardView::LoaderConfigs => "Loader Configurations",
            DashboardView::LoaderUpload => "Loader Data Upload",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PersistedState {
    pub active_view: DashboardView,
    #[serde(default)]
    pub sidebar_collapsed: bool,
}

/// Where the dashboard keeps UI state between runs. `load` returns `None`
/// when nothing has been saved yet.
#[async_trait]
pub trait StatePersistence: Send + Sync {
    async fn load(&self) -> Result<Option<PersistedState>>;
    async fn save(&self, state: &PersistedState) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryStatePersistence {
    saved: StdMutex<Option<PersistedState>>,
}

impl MemoryStatePersistence {
    pub fn with_state(state: PersistedState) -> Self {
        Self {
            saved: StdMutex::new(Some(state)),
        }
    }

    pub fn saved(&self) -> Option<PersistedState> {
        self.saved.lock().map(|guard| *guard).unwrap_or(None)
    }
}

#[async_trait]
impl StatePersistence for MemoryStatePersistence {
    async fn load(&self) -> Result<Option<PersistedState>> {
        Ok(self.saved())
    }

    async fn save(&self, state: &PersistedState) -> Result<()> {
        let mut guard = self
            .saved
            .lock()
            .map_err(|_| anyhow::anyhow!("state lock poisoned"))?;
        *guard = Some(*state);
        Ok(())
    }
}

/// Stores the state as pretty JSON at a fixed path, creating parent
/// directories on first save.
pub struct JsonFileStatePersistence {
    path: PathBuf,
}

impl JsonFileStatePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StatePersistence for JsonFileStatePersistence {
    async fn load(&self) -> Result<Option<PersistedState>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", self.path.display()))
            }
        };
        let state = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        Ok(Some(state))
    }

    async fn save(&self, state: &PersistedState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let body = serde_json::to_vec_pretty(state)?;
        tokio::fs::write(&self.path, body)
            .await
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}

/// Application-level UI state. Loaded once on init; every change is written
/// back through the persistence port. Persistence failures are logged and
/// never block the in-memory change.
pub struct AppStateStore {
    persistence: Box<dyn StatePersistence>,
    state: Mutex<PersistedState>,
}

impl AppStateStore {
    pub async fn load(persistence: Box<dyn StatePersistence>) -> Self {
        let state = match persistence.load().await {
            Ok(Some(state)) => state,
            Ok(None) => PersistedState::default(),
            Err(err) => {
                warn!(error = %err, "app_state: failed to load saved state, using defaults");
                PersistedState::default()
            }
        };
        debug!(view = ?state.active_view, "app_state: loaded");
        Self {
            persistence,
            state: Mutex::new(state),
        }
    }

    pub async fn current(&self) -> PersistedState {
        *self.state.lock().await
    }

    pub async fn active_view(&self) -> DashboardView {
        self.state.lock().await.active_view
    }

    /// Returns false when `view` was already active; nothing is saved then.
    pub async fn set_active_view(&self, view: DashboardView) -> bool {
        self.update(|state| state.active_view = view).await
    }

    pub async fn set_sidebar_collapsed(&self, collapsed: bool) -> bool {
        self.update(|state| state.sidebar_collapsed = collapsed).await
    }

    async fn update(&self, change: impl FnOnce(&mut PersistedState)) -> bool {
        let mut guard = self.state.lock().await;
        let before = *guard;
        change(&mut guard);
        if *guard == before {
            return false;
        }
        if let Err(err) = self.persistence.save(&guard).await {
            warn!(error = %err, "app_state: failed to save state");
        }
        true
    }
}

#[cfg(test)]
#[path = "tests/app_state_tests.rs"]
mod tests;
