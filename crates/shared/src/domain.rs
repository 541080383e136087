use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Int(i64),
}

/// Server-assigned identifiers arrive as either JSON numbers or strings; both
/// are kept as opaque text.
macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                Ok(match RawId::deserialize(deserializer)? {
                    RawId::Text(value) => Self(value),
                    RawId::Int(value) => Self(value.to_string()),
                })
            }
        }
    };
}

id_newtype!(PartnerId);
id_newtype!(LoaderId);
id_newtype!(ConfigId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartnerType {
    Individual,
    Corporate,
}

impl PartnerType {
    pub const ALL: [PartnerType; 2] = [PartnerType::Individual, PartnerType::Corporate];

    pub fn as_str(self) -> &'static str {
        match self {
            PartnerType::Individual => "Individual",
            PartnerType::Corporate => "Corporate",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

impl fmt::Display for PartnerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LoaderType {
    #[default]
    #[serde(rename = "MFI")]
    Mfi,
}

impl LoaderType {
    pub fn as_str(self) -> &'static str {
        match self {
            LoaderType::Mfi => "MFI",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partner {
    pub id: PartnerId,
    pub partner_name: String,
    pub partner_type: PartnerType,
    pub email: String,
    pub contact_number: String,
    pub date_of_agreement: NaiveDate,
    pub pan: String,
    pub gst: Option<String>,
    pub contact_address: Option<String>,
}

/// Minimal projection used by partner pickers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartnerOption {
    pub id: PartnerId,
    pub partner_name: String,
}

impl From<&Partner> for PartnerOption {
    fn from(partner: &Partner) -> Self {
        Self {
            id: partner.id.clone(),
            partner_name: partner.partner_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartnerPage {
    pub content: Vec<Partner>,
    pub total_elements: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    pub id: String,
    pub loader_id: String,
    pub template_name: String,
    pub loader_type: String,
    pub uploaded_by: String,
    pub created_at: Option<String>,
    pub download_url: String,
}

impl LoaderConfig {
    /// Milliseconds since the epoch; absent or unparseable dates sort as 0.
    pub fn created_at_millis(&self) -> i64 {
        self.created_at
            .as_deref()
            .and_then(parse_timestamp)
            .map(|ts| ts.timestamp_millis())
            .unwrap_or(0)
    }
}

/// Accepts RFC 3339 timestamps and bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
