use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    domain::{parse_timestamp, LoaderConfig, LoaderId, Partner, PartnerId, PartnerPage, PartnerType},
    error::ConversionError,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerDto {
    pub id: PartnerId,
    pub partner_name: String,
    #[serde(rename = "type")]
    pub partner_type: String,
    pub email: String,
    pub contact_number: String,
    pub date_of_agreement: String,
    pub pan: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gst: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_address: Option<String>,
}

impl TryFrom<PartnerDto> for Partner {
    type Error = ConversionError;

    fn try_from(dto: PartnerDto) -> Result<Self, Self::Error> {
        let partner_type = PartnerType::parse(&dto.partner_type)
            .ok_or_else(|| ConversionError::UnknownPartnerType(dto.partner_type.clone()))?;
        let date_of_agreement = parse_agreement_date(&dto.date_of_agreement)
            .ok_or_else(|| ConversionError::InvalidDate(dto.date_of_agreement.clone()))?;
        if dto.partner_name.is_empty() {
            return Err(ConversionError::MissingField("partnerName"));
        }
        Ok(Partner {
            id: dto.id,
            partner_name: dto.partner_name,
            partner_type,
            email: dto.email,
            contact_number: dto.contact_number,
            date_of_agreement,
            pan: dto.pan,
            gst: dto.gst.filter(|v| !v.is_empty()),
            contact_address: dto.contact_address.filter(|v| !v.is_empty()),
        })
    }
}

impl From<&Partner> for PartnerDto {
    fn from(partner: &Partner) -> Self {
        Self {
            id: partner.id.clone(),
            partner_name: partner.partner_name.clone(),
            partner_type: partner.partner_type.as_str().to_string(),
            email: partner.email.clone(),
            contact_number: partner.contact_number.clone(),
            date_of_agreement: partner.date_of_agreement.format("%Y-%m-%d").to_string(),
            pan: partner.pan.clone(),
            gst: partner.gst.clone(),
            contact_address: partner.contact_address.clone(),
        }
    }
}

fn parse_agreement_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(raw).map(|ts| ts.date_naive()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerPageDto {
    pub content: Vec<PartnerDto>,
    #[serde(default)]
    pub total_elements: u64,
}

impl TryFrom<PartnerPageDto> for PartnerPage {
    type Error = ConversionError;

    fn try_from(dto: PartnerPageDto) -> Result<Self, Self::Error> {
        let content = dto
            .content
            .into_iter()
            .map(Partner::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PartnerPage {
            content,
            total_elements: dto.total_elements,
        })
    }
}

/// Body of `PATCH /api/partner/{id}`: the six editable fields only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerPatchRequest {
    pub partner_name: String,
    #[serde(rename = "type")]
    pub partner_type: String,
    pub email: String,
    pub contact_number: String,
    pub date_of_agreement: String,
    pub pan: String,
}

/// Body of `POST /api/partner`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingRequest {
    pub partner_name: String,
    #[serde(rename = "type")]
    pub partner_type: String,
    pub email: String,
    pub contact_number: String,
    pub pan: String,
    pub gst: String,
    pub contact_address: String,
    pub date_of_agreement: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoaderConfigsDto {
    #[serde(default)]
    pub loaders: Vec<LoaderConfigRaw>,
}

impl LoaderConfigsDto {
    pub fn into_configs(self) -> Vec<LoaderConfig> {
        self.loaders
            .into_iter()
            .enumerate()
            .map(|(index, raw)| raw.into_config(index))
            .collect()
    }
}

/// Loader entries as the backend emits them; several fields have legacy
/// aliases which are resolved in [`LoaderConfigRaw::into_config`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderConfigRaw {
    #[serde(default)]
    pub loader_id: Option<LoaderId>,
    #[serde(default)]
    pub id: Option<LoaderId>,
    #[serde(default)]
    pub template_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub loader_type: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub uploaded_by: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

fn first_non_empty(candidates: [Option<String>; 2]) -> Option<String> {
    candidates.into_iter().flatten().find(|value| !value.is_empty())
}

impl LoaderConfigRaw {
    pub fn into_config(self, index: usize) -> LoaderConfig {
        let loader_id = first_non_empty([
            self.loader_id.map(|id| id.0),
            self.id.map(|id| id.0),
        ]);
        LoaderConfig {
            id: loader_id.clone().unwrap_or_else(|| format!("row-{index}")),
            loader_id: loader_id.unwrap_or_default(),
            template_name: first_non_empty([self.template_name, self.name]).unwrap_or_default(),
            loader_type: first_non_empty([self.loader_type, self.kind]).unwrap_or_default(),
            uploaded_by: first_non_empty([self.uploaded_by, self.created_by]).unwrap_or_default(),
            download_url: first_non_empty([self.download_url, self.file_url]).unwrap_or_default(),
            created_at: first_non_empty([self.date, self.created_at]),
        }
    }
}
