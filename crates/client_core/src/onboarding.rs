use std::sync::Arc;

use shared::{domain::Partner, error::FieldErrors};
use tokio::sync::Mutex;
use tracing::warn;

use crate::{
    api::PartnerApi,
    error::{ClientError, ClientResult},
    events::{DashboardEvent, EventHub, NotificationKind},
    validation::{validate_onboarding, OnboardingDraft, PartnerField},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnboardingOutcome {
    Invalid(FieldErrors),
    Rejected(FieldErrors),
    Created(Partner),
}

#[derive(Default)]
struct OnboardingInner {
    draft: OnboardingDraft,
    errors: FieldErrors,
    submitting: bool,
}

pub struct OnboardingController {
    api: Arc<dyn PartnerApi>,
    hub: Arc<EventHub>,
    inner: Mutex<OnboardingInner>,
}

impl OnboardingController {
    pub fn new(api: Arc<dyn PartnerApi>, hub: Arc<EventHub>) -> Self {
        Self {
            api,
            hub,
            inner: Mutex::new(OnboardingInner::default()),
        }
    }

    pub async fn draft(&self) -> OnboardingDraft {
        self.inner.lock().await.draft.clone()
    }

    pub async fn errors(&self) -> FieldErrors {
        self.inner.lock().await.errors.clone()
    }

    pub async fn set_field(&self, field: PartnerField, value: impl Into<String>) {
        let mut guard = self.inner.lock().await;
        guard.draft.set(field, value);
        guard.errors.remove(field.key());
    }

    pub async fn reset(&self) {
        let mut guard = self.inner.lock().await;
        guard.draft = OnboardingDraft::default();
        guard.errors.clear();
    }

    pub async fn submit(&self) -> ClientResult<OnboardingOutcome> {
        let draft = {
            let mut guard = self.inner.lock().await;
            if guard.submitting {
                return Err(ClientError::InvalidState("onboarding already in progress".into()));
            }
            let normalized = guard.draft.normalized();
            let errors = validate_onboarding(&normalized);
            guard.draft = normalized.clone();
            if !errors.is_empty() {
                guard.errors = errors.clone();
                return Ok(OnboardingOutcome::Invalid(errors));
            }
            guard.submitting = true;
            normalized
        };

        let result = self.api.create_partner(&draft.to_request()).await;

        let mut guard = self.inner.lock().await;
        guard.submitting = false;
        match result {
            Ok(created) => {
                guard.draft = OnboardingDraft::default();
                guard.errors.clear();
                drop(guard);
                self.hub.emit(DashboardEvent::PartnerOnboarded(created.clone()));
                self.hub
                    .notify(NotificationKind::Success, "Partner registered successfully!")
                    .await;
                Ok(OnboardingOutcome::Created(created))
            }
            Err(ClientError::ServerValidation(server_errors)) => {
                guard.errors.merge(server_errors.clone());
                Ok(OnboardingOutcome::Rejected(server_errors))
            }
            Err(err) => {
                drop(guard);
                warn!(error = %err, "onboarding: registration failed");
                self.hub
                    .notify(NotificationKind::Error, "Failed to register partner.")
                    .await;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/onboarding_tests.rs"]
mod tests;
