use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Method,
};
use shared::{
    domain::{ConfigId, LoaderConfig, Partner, PartnerId, PartnerPage},
    protocol::{LoaderConfigsDto, OnboardingRequest, PartnerDto, PartnerPageDto, PartnerPatchRequest},
};
use tracing::{debug, info};

use crate::{
    config::ClientSettings,
    error::{ClientError, ClientResult},
    transport::HttpTransport,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartnerListQuery {
    pub page: u32,
    pub size: u32,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    fn into_part(self) -> ClientResult<Part> {
        Part::bytes(self.bytes)
            .file_name(self.file_name)
            .mime_str(&self.mime_type)
            .map_err(|err| ClientError::InvalidState(format!("invalid mime type: {err}")))
    }
}

/// Backend operations the controllers depend on.
#[async_trait]
pub trait PartnerApi: Send + Sync {
    async fn list_partners(&self, query: &PartnerListQuery) -> ClientResult<PartnerPage>;
    async fn update_partner(
        &self,
        id: &PartnerId,
        patch: &PartnerPatchRequest,
    ) -> ClientResult<Partner>;
    async fn create_partner(&self, request: &OnboardingRequest) -> ClientResult<Partner>;
    async fn list_loader_configs(&self, partner_id: &PartnerId) -> ClientResult<Vec<LoaderConfig>>;
    async fn upload_config_template(
        &self,
        partner_id: &PartnerId,
        sheet_name: &str,
        file: UploadFile,
    ) -> ClientResult<()>;
    async fn download_loader_config(
        &self,
        partner_id: &PartnerId,
        loader_id: &str,
    ) -> ClientResult<Vec<u8>>;
    async fn upload_loader_data(
        &self,
        partner_id: &PartnerId,
        config_id: &ConfigId,
        file: UploadFile,
    ) -> ClientResult<()>;
}

pub struct HttpPartnerApi {
    transport: HttpTransport,
}

impl HttpPartnerApi {
    pub fn new(settings: &ClientSettings) -> ClientResult<Self> {
        Ok(Self {
            transport: HttpTransport::new(settings)?,
        })
    }

    pub fn transport(&self) -> &HttpTransport {
        &self.transport
    }
}

#[async_trait]
impl PartnerApi for HttpPartnerApi {
    async fn list_partners(&self, query: &PartnerListQuery) -> ClientResult<PartnerPage> {
        let dto: PartnerPageDto = self
            .transport
            .get_json(
                "/api/partner",
                &[
                    ("page", query.page.to_string()),
                    ("size", query.size.to_string()),
                    ("query", query.query.clone()),
                ],
            )
            .await?;
        Ok(PartnerPage::try_from(dto)?)
    }

    async fn update_partner(
        &self,
        id: &PartnerId,
        patch: &PartnerPatchRequest,
    ) -> ClientResult<Partner> {
        debug!(partner_id = %id, "partners: sending partial update");
        let dto: PartnerDto = self
            .transport
            .send_json(Method::PATCH, &format!("/api/partner/{id}"), patch)
            .await?;
        let updated = Partner::try_from(dto)?;
        if &updated.id != id {
            return Err(ClientError::MalformedResponse(format!(
                "update for partner {id} returned partner {}",
                updated.id
            )));
        }
        Ok(updated)
    }

    async fn create_partner(&self, request: &OnboardingRequest) -> ClientResult<Partner> {
        let dto: PartnerDto = self
            .transport
            .send_json(Method::POST, "/api/partner", request)
            .await?;
        let created = Partner::try_from(dto)?;
        info!(partner_id = %created.id, "partners: onboarded");
        Ok(created)
    }

    async fn list_loader_configs(&self, partner_id: &PartnerId) -> ClientResult<Vec<LoaderConfig>> {
        let dto: LoaderConfigsDto = self
            .transport
            .get_json(&format!("/api/partners/{partner_id}/configs"), &[])
            .await?;
        Ok(dto.into_configs())
    }

    async fn upload_config_template(
        &self,
        partner_id: &PartnerId,
        sheet_name: &str,
        file: UploadFile,
    ) -> ClientResult<()> {
        let form = Form::new()
            .part("file", file.into_part()?)
            .text("sheetName", sheet_name.to_string());
        self.transport
            .post_multipart(&format!("/api/partners/{partner_id}/configs/upload"), form)
            .await?;
        Ok(())
    }

    async fn download_loader_config(
        &self,
        partner_id: &PartnerId,
        loader_id: &str,
    ) -> ClientResult<Vec<u8>> {
        self.transport
            .download(&format!(
                "/api/partners/{partner_id}/loader-transformation-configs/{loader_id}/download"
            ))
            .await
    }

    async fn upload_loader_data(
        &self,
        partner_id: &PartnerId,
        config_id: &ConfigId,
        file: UploadFile,
    ) -> ClientResult<()> {
        let form = Form::new().part("file", file.into_part()?);
        self.transport
            .post_multipart(
                &format!("/api/partners/{partner_id}/configs/{config_id}/loader-data/upload"),
                form,
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
