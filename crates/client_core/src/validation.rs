//! Field-level rules for partner forms.
//!
//! Both entry points are pure: they read a draft and return a [`FieldErrors`]
//! map holding only the failing fields. PAN and GST patterns are
//! case-sensitive; the onboarding form upper-cases them before validating,
//! the listing editor does not.

use once_cell::sync::Lazy;
use regex::Regex;
use shared::{
    domain::{Partner, PartnerId, PartnerType},
    error::FieldErrors,
    protocol::{OnboardingRequest, PartnerPatchRequest},
};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"));
static CONTACT_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{10}$").expect("contact number pattern"));
static PAN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{5}[0-9]{4}[A-Z]{1}$").expect("pan pattern"));
static GST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]{2}[A-Z]{5}[0-9]{4}[A-Z]{1}[1-9A-Z]{1}Z[0-9A-Z]{1}$").expect("gst pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartnerField {
    PartnerName,
    Type,
    Email,
    ContactNumber,
    DateOfAgreement,
    Pan,
    Gst,
    ContactAddress,
}

impl PartnerField {
    pub const EDITABLE: [PartnerField; 6] = [
        PartnerField::PartnerName,
        PartnerField::Type,
        PartnerField::Email,
        PartnerField::ContactNumber,
        PartnerField::DateOfAgreement,
        PartnerField::Pan,
    ];

    /// Wire name, also used as the key in [`FieldErrors`].
    pub fn key(self) -> &'static str {
        match self {
            PartnerField::PartnerName => "partnerName",
            PartnerField::Type => "type",
            PartnerField::Email => "email",
            PartnerField::ContactNumber => "contactNumber",
            PartnerField::DateOfAgreement => "dateOfAgreement",
            PartnerField::Pan => "pan",
            PartnerField::Gst => "gst",
            PartnerField::ContactAddress => "contactAddress",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        [
            PartnerField::PartnerName,
            PartnerField::Type,
            PartnerField::Email,
            PartnerField::ContactNumber,
            PartnerField::DateOfAgreement,
            PartnerField::Pan,
            PartnerField::Gst,
            PartnerField::ContactAddress,
        ]
        .into_iter()
        .find(|field| field.key() == key)
    }
}

/// Editable copy of a listed partner; every field is kept as entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartnerDraft {
    pub id: PartnerId,
    pub partner_name: String,
    pub partner_type: String,
    pub email: String,
    pub contact_number: String,
    pub date_of_agreement: String,
    pub pan: String,
}

impl PartnerDraft {
    pub fn from_partner(partner: &Partner) -> Self {
        Self {
            id: partner.id.clone(),
            partner_name: partner.partner_name.clone(),
            partner_type: partner.partner_type.as_str().to_string(),
            email: partner.email.clone(),
            contact_number: partner.contact_number.clone(),
            date_of_agreement: partner.date_of_agreement.format("%Y-%m-%d").to_string(),
            pan: partner.pan.clone(),
        }
    }

    /// Returns false for fields that are not editable after creation.
    pub fn set(&mut self, field: PartnerField, value: impl Into<String>) -> bool {
        let value = value.into();
        match field {
            PartnerField::PartnerName => self.partner_name = value,
            PartnerField::Type => self.partner_type = value,
            PartnerField::Email => self.email = value,
            PartnerField::ContactNumber => self.contact_number = value,
            PartnerField::DateOfAgreement => self.date_of_agreement = value,
            PartnerField::Pan => self.pan = value,
            PartnerField::Gst | PartnerField::ContactAddress => return false,
        }
        true
    }

    pub fn to_patch(&self) -> PartnerPatchRequest {
        PartnerPatchRequest {
            partner_name: self.partner_name.clone(),
            partner_type: self.partner_type.clone(),
            email: self.email.clone(),
            contact_number: self.contact_number.clone(),
            date_of_agreement: self.date_of_agreement.clone(),
            pan: self.pan.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingDraft {
    pub partner_name: String,
    pub partner_type: String,
    pub email: String,
    pub contact_number: String,
    pub pan: String,
    pub gst: String,
    pub contact_address: String,
    pub date_of_agreement: String,
}

impl Default for OnboardingDraft {
    fn default() -> Self {
        Self {
            partner_name: String::new(),
            partner_type: PartnerType::Corporate.as_str().to_string(),
            email: String::new(),
            contact_number: String::new(),
            pan: String::new(),
            gst: String::new(),
            contact_address: String::new(),
            date_of_agreement: String::new(),
        }
    }
}

impl OnboardingDraft {
    pub fn set(&mut self, field: PartnerField, value: impl Into<String>) {
        let value = value.into();
        match field {
            PartnerField::PartnerName => self.partner_name = value,
            PartnerField::Type => self.partner_type = value,
            PartnerField::Email => self.email = value,
            PartnerField::ContactNumber => self.contact_number = value,
            PartnerField::DateOfAgreement => self.date_of_agreement = value,
            PartnerField::Pan => self.pan = value,
            PartnerField::Gst => self.gst = value,
            PartnerField::ContactAddress => self.contact_address = value,
        }
    }

    /// Trims and upper-cases PAN and GST so lower-case input is accepted.
    pub fn normalized(&self) -> Self {
        Self {
            pan: self.pan.trim().to_uppercase(),
            gst: self.gst.trim().to_uppercase(),
            ..self.clone()
        }
    }

    pub fn to_request(&self) -> OnboardingRequest {
        OnboardingRequest {
            partner_name: self.partner_name.trim().to_string(),
            partner_type: self.partner_type.clone(),
            email: self.email.trim().to_string(),
            contact_number: self.contact_number.trim().to_string(),
            pan: self.pan.clone(),
            gst: self.gst.clone(),
            contact_address: self.contact_address.trim().to_string(),
            date_of_agreement: self.date_of_agreement.clone(),
        }
    }
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

pub fn is_valid_contact_number(value: &str) -> bool {
    CONTACT_NUMBER_RE.is_match(value)
}

pub fn is_valid_pan(value: &str) -> bool {
    PAN_RE.is_match(value)
}

pub fn is_valid_gst(value: &str) -> bool {
    GST_RE.is_match(value)
}

fn is_known_type(value: &str) -> bool {
    PartnerType::parse(value).is_some()
}

/// Rules applied when editing a listed partner.
pub fn validate_partner(draft: &PartnerDraft) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if draft.partner_name.trim().chars().count() < 2 {
        errors.insert(
            PartnerField::PartnerName.key(),
            "Partner name must be at least 2 characters.",
        );
    }
    if !is_known_type(&draft.partner_type) {
        errors.insert(
            PartnerField::Type.key(),
            "Type must be either Individual or Corporate.",
        );
    }
    if draft.email.is_empty() || !is_valid_email(&draft.email) {
        errors.insert(PartnerField::Email.key(), "Enter a valid email address.");
    }
    if draft.contact_number.is_empty() || !is_valid_contact_number(&draft.contact_number) {
        errors.insert(
            PartnerField::ContactNumber.key(),
            "Contact number must be a 10-digit number.",
        );
    }
    if draft.date_of_agreement.trim().is_empty() {
        errors.insert(
            PartnerField::DateOfAgreement.key(),
            "Date of agreement is required.",
        );
    }
    if draft.pan.is_empty() || !is_valid_pan(&draft.pan) {
        errors.insert(
            PartnerField::Pan.key(),
            "Enter a valid PAN (e.g., ABCDE1234F).",
        );
    }

    errors
}

/// Rules applied to the onboarding form. Callers normalize PAN/GST first.
pub fn validate_onboarding(draft: &OnboardingDraft) -> FieldErrors {
    let mut errors = FieldErrors::new();

    let name = draft.partner_name.trim();
    if name.is_empty() {
        errors.insert(PartnerField::PartnerName.key(), "Partner Name is required");
    } else if name.chars().count() < 2 {
        errors.insert(
            PartnerField::PartnerName.key(),
            "Partner Name must be at least 2 characters",
        );
    }

    if !is_known_type(&draft.partner_type) {
        errors.insert(
            PartnerField::Type.key(),
            "Partner Type must be Individual or Corporate",
        );
    }

    if draft.email.trim().is_empty() {
        errors.insert(PartnerField::Email.key(), "Email is required");
    } else if !is_valid_email(&draft.email) {
        errors.insert(PartnerField::Email.key(), "Invalid email format");
    }

    if draft.contact_number.trim().is_empty() {
        errors.insert(
            PartnerField::ContactNumber.key(),
            "Contact Number is required",
        );
    } else if !is_valid_contact_number(&draft.contact_number) {
        errors.insert(
            PartnerField::ContactNumber.key(),
            "Contact Number must be 10 digits",
        );
    }

    if draft.pan.trim().is_empty() {
        errors.insert(PartnerField::Pan.key(), "PAN is required");
    } else if !is_valid_pan(&draft.pan) {
        errors.insert(PartnerField::Pan.key(), "Invalid PAN format");
    }

    if draft.gst.trim().is_empty() {
        errors.insert(PartnerField::Gst.key(), "GST is required");
    } else if !is_valid_gst(&draft.gst) {
        errors.insert(PartnerField::Gst.key(), "Invalid GST format");
    }

    if draft.contact_address.trim().is_empty() {
        errors.insert(PartnerField::ContactAddress.key(), "Address is required");
    }

    if draft.date_of_agreement.trim().is_empty() {
        errors.insert(
            PartnerField::DateOfAgreement.key(),
            "Date of Agreement is required",
        );
    }

    errors
}

#[cfg(test)]
#[path = "tests/validation_tests.rs"]
mod tests;
