use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex},
};

use async_trait::async_trait;
use chrono::NaiveDate;
use shared::{
    domain::{ConfigId, LoaderConfig, Partner, PartnerId, PartnerPage, PartnerType},
    error::{ErrorEnvelope, FieldErrors},
    protocol::{OnboardingRequest, PartnerPatchRequest},
};
use tokio::sync::oneshot;

use crate::{
    api::{PartnerApi, PartnerListQuery, UploadFile},
    config::ClientSettings,
    error::{ClientError, ClientResult},
    events::EventHub,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ApiCall {
    ListPartners(PartnerListQuery),
    UpdatePartner(PartnerId, PartnerPatchRequest),
    CreatePartner(OnboardingRequest),
    ListLoaderConfigs(PartnerId),
    UploadConfigTemplate {
        partner_id: PartnerId,
        sheet_name: String,
        file_name: String,
    },
    Download {
        partner_id: PartnerId,
        loader_id: String,
    },
    UploadLoaderData {
        partner_id: PartnerId,
        config_id: ConfigId,
        file_name: String,
    },
}

#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Ok,
    FieldErrors(FieldErrors),
    Network,
    Status(u16, &'static str),
}

impl Reply {
    fn into_error(self, method: &str, url: &str) -> Option<ClientError> {
        match self {
            Reply::Ok => None,
            Reply::FieldErrors(errors) => Some(ClientError::ServerValidation(errors)),
            Reply::Network => Some(ClientError::Network {
                message: "connection refused".into(),
                timed_out: false,
            }),
            Reply::Status(404, message) => Some(ClientError::NotFound(
                ErrorEnvelope::new(method, url, message).with_status(404),
            )),
            Reply::Status(status, message) => Some(ClientError::Http(
                ErrorEnvelope::new(method, url, message).with_status(status),
            )),
        }
    }
}

/// In-memory backend. Listing filters `partners` by name and pages through
/// it; everything else echoes or replies as scripted.
#[derive(Default)]
pub(crate) struct FakePartnerApi {
    partners: StdMutex<Vec<Partner>>,
    configs: StdMutex<HashMap<PartnerId, Vec<LoaderConfig>>>,
    calls: StdMutex<Vec<ApiCall>>,
    list_reply: StdMutex<Option<Reply>>,
    list_gates: StdMutex<HashMap<String, oneshot::Receiver<()>>>,
    config_gates: StdMutex<HashMap<PartnerId, oneshot::Receiver<()>>>,
    update_reply: StdMutex<Option<Reply>>,
    create_reply: StdMutex<Option<Reply>>,
    configs_reply: StdMutex<Option<Reply>>,
    template_reply: StdMutex<Option<Reply>>,
    failing_uploads: StdMutex<Vec<String>>,
}

impl FakePartnerApi {
    pub(crate) fn with_partners(partners: Vec<Partner>) -> Arc<Self> {
        let api = Self::default();
        *api.partners.lock().unwrap() = partners;
        Arc::new(api)
    }

    pub(crate) fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn list_calls(&self) -> Vec<PartnerListQuery> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::ListPartners(query) => Some(query),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn set_configs(&self, partner_id: &str, configs: Vec<LoaderConfig>) {
        self.configs
            .lock()
            .unwrap()
            .insert(PartnerId::new(partner_id), configs);
    }

    /// Holds every listing request for `query` until the returned sender fires.
    pub(crate) fn gate_list(&self, query: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.list_gates.lock().unwrap().insert(query.to_string(), rx);
        tx
    }

    pub(crate) fn gate_configs(&self, partner_id: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.config_gates
            .lock()
            .unwrap()
            .insert(PartnerId::new(partner_id), rx);
        tx
    }

    pub(crate) fn reply_to_list(&self, reply: Reply) {
        *self.list_reply.lock().unwrap() = Some(reply);
    }

    pub(crate) fn reply_to_update(&self, reply: Reply) {
        *self.update_reply.lock().unwrap() = Some(reply);
    }

    pub(crate) fn reply_to_create(&self, reply: Reply) {
        *self.create_reply.lock().unwrap() = Some(reply);
    }

    pub(crate) fn reply_to_configs(&self, reply: Reply) {
        *self.configs_reply.lock().unwrap() = Some(reply);
    }

    pub(crate) fn reply_to_template(&self, reply: Reply) {
        *self.template_reply.lock().unwrap() = Some(reply);
    }

    pub(crate) fn fail_upload_of(&self, file_name: &str) {
        self.failing_uploads
            .lock()
            .unwrap()
            .push(file_name.to_string());
    }

    fn record(&self, call: ApiCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn scripted(slot: &StdMutex<Option<Reply>>, method: &str, url: &str) -> Option<ClientError> {
        slot.lock()
            .unwrap()
            .clone()
            .and_then(|reply| reply.into_error(method, url))
    }
}

#[async_trait]
impl PartnerApi for FakePartnerApi {
    async fn list_partners(&self, query: &PartnerListQuery) -> ClientResult<PartnerPage> {
        self.record(ApiCall::ListPartners(query.clone()));
        let gate = self.list_gates.lock().unwrap().remove(&query.query);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if let Some(err) = Self::scripted(&self.list_reply, "GET", "/api/partner") {
            return Err(err);
        }

        let needle = query.query.to_lowercase();
        let matching: Vec<Partner> = self
            .partners
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.partner_name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        let start = (query.page * query.size) as usize;
        let content = matching
            .iter()
            .skip(start)
            .take(query.size as usize)
            .cloned()
            .collect();
        Ok(PartnerPage {
            content,
            total_elements: matching.len() as u64,
        })
    }

    async fn update_partner(
        &self,
        id: &PartnerId,
        patch: &PartnerPatchRequest,
    ) -> ClientResult<Partner> {
        self.record(ApiCall::UpdatePartner(id.clone(), patch.clone()));
        if let Some(err) = Self::scripted(&self.update_reply, "PATCH", &format!("/api/partner/{id}")) {
            return Err(err);
        }
        let mut partners = self.partners.lock().unwrap();
        let stored = partners
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or_else(|| ClientError::MalformedResponse(format!("unknown partner {id}")))?;
        stored.partner_name = patch.partner_name.clone();
        stored.partner_type = PartnerType::parse(&patch.partner_type).unwrap_or(stored.partner_type);
        stored.email = patch.email.clone();
        stored.contact_number = patch.contact_number.clone();
        stored.pan = patch.pan.clone();
        if let Ok(date) = NaiveDate::parse_from_str(&patch.date_of_agreement, "%Y-%m-%d") {
            stored.date_of_agreement = date;
        }
        Ok(stored.clone())
    }

    async fn create_partner(&self, request: &OnboardingRequest) -> ClientResult<Partner> {
        self.record(ApiCall::CreatePartner(request.clone()));
        if let Some(err) = Self::scripted(&self.create_reply, "POST", "/api/partner") {
            return Err(err);
        }
        let mut partners = self.partners.lock().unwrap();
        let created = Partner {
            id: PartnerId::new(format!("{}", 500 + partners.len())),
            partner_name: request.partner_name.clone(),
            partner_type: PartnerType::parse(&request.partner_type).unwrap_or(PartnerType::Corporate),
            email: request.email.clone(),
            contact_number: request.contact_number.clone(),
            date_of_agreement: NaiveDate::parse_from_str(&request.date_of_agreement, "%Y-%m-%d")
                .unwrap_or_default(),
            pan: request.pan.clone(),
            gst: Some(request.gst.clone()),
            contact_address: Some(request.contact_address.clone()),
        };
        partners.push(created.clone());
        Ok(created)
    }

    async fn list_loader_configs(&self, partner_id: &PartnerId) -> ClientResult<Vec<LoaderConfig>> {
        self.record(ApiCall::ListLoaderConfigs(partner_id.clone()));
        let gate = self.config_gates.lock().unwrap().remove(partner_id);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        let url = format!("/api/partners/{partner_id}/configs");
        if let Some(err) = Self::scripted(&self.configs_reply, "GET", &url) {
            return Err(err);
        }
        Ok(self
            .configs
            .lock()
            .unwrap()
            .get(partner_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn upload_config_template(
        &self,
        partner_id: &PartnerId,
        sheet_name: &str,
        file: UploadFile,
    ) -> ClientResult<()> {
        self.record(ApiCall::UploadConfigTemplate {
            partner_id: partner_id.clone(),
            sheet_name: sheet_name.to_string(),
            file_name: file.file_name,
        });
        let url = format!("/api/partners/{partner_id}/configs/upload");
        match Self::scripted(&self.template_reply, "POST", &url) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn download_loader_config(
        &self,
        partner_id: &PartnerId,
        loader_id: &str,
    ) -> ClientResult<Vec<u8>> {
        self.record(ApiCall::Download {
            partner_id: partner_id.clone(),
            loader_id: loader_id.to_string(),
        });
        Ok(format!("{partner_id}:{loader_id}").into_bytes())
    }

    async fn upload_loader_data(
        &self,
        partner_id: &PartnerId,
        config_id: &ConfigId,
        file: UploadFile,
    ) -> ClientResult<()> {
        let file_name = file.file_name.clone();
        self.record(ApiCall::UploadLoaderData {
            partner_id: partner_id.clone(),
            config_id: config_id.clone(),
            file_name: file_name.clone(),
        });
        if self.failing_uploads.lock().unwrap().contains(&file_name) {
            return Err(ClientError::Http(
                ErrorEnvelope::new("POST", "/loader-data/upload", "Request failed with status code 500")
                    .with_status(500),
            ));
        }
        Ok(())
    }
}

pub(crate) fn partner(id: &str, name: &str) -> Partner {
    Partner {
        id: PartnerId::new(id),
        partner_name: name.to_string(),
        partner_type: PartnerType::Corporate,
        email: "ops@acme.example".into(),
        contact_number: "9876543210".into(),
        date_of_agreement: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
        pan: "ABCDE1234F".into(),
        gst: Some("22AAAAA0000A1Z5".into()),
        contact_address: Some("12 Market Road".into()),
    }
}

pub(crate) fn loader_config(loader_id: &str, template: &str, uploaded_by: &str, created_at: Option<&str>) -> LoaderConfig {
    LoaderConfig {
        id: format!("cfg-{loader_id}"),
        loader_id: loader_id.to_string(),
        template_name: template.to_string(),
        loader_type: "MFI".into(),
        uploaded_by: uploaded_by.to_string(),
        created_at: created_at.map(str::to_string),
        download_url: String::new(),
    }
}

pub(crate) fn test_settings() -> ClientSettings {
    ClientSettings::default()
}

pub(crate) fn test_hub() -> Arc<EventHub> {
    Arc::new(EventHub::default())
}
