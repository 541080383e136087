use std::sync::Arc;

use shared::{
    domain::{Partner, PartnerId},
    error::FieldErrors,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    api::PartnerApi,
    error::{ClientError, ClientResult},
    events::{DashboardEvent, EventHub, NotificationKind},
    list_query::PartnerListController,
    validation::{validate_partner, PartnerDraft, PartnerField},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditState {
    Closed,
    Editing {
        draft: PartnerDraft,
        errors: FieldErrors,
    },
    Saving {
        draft: PartnerDraft,
    },
}

impl EditState {
    pub fn draft(&self) -> Option<&PartnerDraft> {
        match self {
            EditState::Closed => None,
            EditState::Editing { draft, .. } | EditState::Saving { draft } => Some(draft),
        }
    }

    pub fn errors(&self) -> Option<&FieldErrors> {
        match self {
            EditState::Editing { errors, .. } => Some(errors),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Local validation failed; nothing was sent.
    Invalid(FieldErrors),
    /// The backend rejected some fields; the draft stays open with them merged in.
    Rejected(FieldErrors),
    Saved(Partner),
}

/// Single in-flight edit of a listed partner:
/// `Closed -> Editing -> Saving -> (Closed | Editing)`.
pub struct EditSessionController {
    api: Arc<dyn PartnerApi>,
    list: Arc<PartnerListController>,
    hub: Arc<EventHub>,
    state: Mutex<EditState>,
}

impl EditSessionController {
    pub fn new(
        api: Arc<dyn PartnerApi>,
        list: Arc<PartnerListController>,
        hub: Arc<EventHub>,
    ) -> Self {
        Self {
            api,
            list,
            hub,
            state: Mutex::new(EditState::Closed),
        }
    }

    pub async fn state(&self) -> EditState {
        self.state.lock().await.clone()
    }

    pub async fn open(&self, partner: &Partner) -> ClientResult<()> {
        let mut guard = self.state.lock().await;
        if matches!(*guard, EditState::Saving { .. }) {
            return Err(ClientError::InvalidState(
                "cannot open a new draft while saving".into(),
            ));
        }
        *guard = EditState::Editing {
            draft: PartnerDraft::from_partner(partner),
            errors: FieldErrors::new(),
        };
        Ok(())
    }

    /// Opens the partner with `id` from the currently loaded page.
    pub async fn open_by_id(&self, id: &PartnerId) -> ClientResult<()> {
        let partner = self
            .list
            .items()
            .await
            .into_iter()
            .find(|p| &p.id == id)
            .ok_or_else(|| {
                ClientError::InvalidState(format!("partner {id} is not on the loaded page"))
            })?;
        self.open(&partner).await
    }

    /// Updates one field and clears that field's error straight away.
    pub async fn set_field(&self, field: PartnerField, value: impl Into<String>) -> ClientResult<()> {
        let mut guard = self.state.lock().await;
        let EditState::Editing { draft, errors } = &mut *guard else {
            return Err(ClientError::InvalidState("no draft is being edited".into()));
        };
        if !draft.set(field, value) {
            return Err(ClientError::InvalidState(format!(
                "field `{}` cannot be edited",
                field.key()
            )));
        }
        errors.remove(field.key());
        Ok(())
    }

    pub async fn cancel(&self) -> ClientResult<()> {
        let mut guard = self.state.lock().await;
        if matches!(*guard, EditState::Saving { .. }) {
            return Err(ClientError::InvalidState("save in progress".into()));
        }
        *guard = EditState::Closed;
        Ok(())
    }

    /// Network and unclassified failures are returned as errors after the
    /// draft has been put back into `Editing`.
    pub async fn submit(&self) -> ClientResult<SubmitOutcome> {
        let draft = {
            let mut guard = self.state.lock().await;
            let EditState::Editing { draft, errors } = &mut *guard else {
                return Err(ClientError::InvalidState("no draft is being edited".into()));
            };
            let found = validate_partner(draft);
            if !found.is_empty() {
                *errors = found.clone();
                return Ok(SubmitOutcome::Invalid(found));
            }
            let draft = draft.clone();
            *guard = EditState::Saving {
                draft: draft.clone(),
            };
            draft
        };

        let result = self.api.update_partner(&draft.id, &draft.to_patch()).await;

        match result {
            Ok(updated) => {
                *self.state.lock().await = EditState::Closed;
                if !self.list.replace_partner(updated.clone()).await {
                    warn!(partner_id = %updated.id, "partners: saved partner is no longer on the loaded page");
                }
                info!(partner_id = %updated.id, "partners: partner saved");
                self.hub.emit(DashboardEvent::PartnerSaved(updated.clone()));
                Ok(SubmitOutcome::Saved(updated))
            }
            Err(ClientError::ServerValidation(server_errors)) => {
                let mut errors = FieldErrors::new();
                errors.merge(server_errors.clone());
                *self.state.lock().await = EditState::Editing { draft, errors };
                Ok(SubmitOutcome::Rejected(server_errors))
            }
            Err(err) => {
                *self.state.lock().await = EditState::Editing {
                    draft,
                    errors: FieldErrors::new(),
                };
                warn!(error = %err, "partners: save failed");
                self.hub
                    .notify(NotificationKind::Error, err.notification_text())
                    .await;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/edit_session_tests.rs"]
mod tests;
