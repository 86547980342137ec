use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

pub const DEFAULT_LIST_LIMIT: u32 = 50;
/// Upper bound on cameras at a single location.
pub const MAX_CAMERAS_PER_LOCATION: u32 = 100;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuoteRequestId(pub String);

impl QuoteRequestId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for QuoteRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteRequestStatus {
    #[default]
    Pending,
    Contacted,
    Completed,
    Cancelled,
}

impl QuoteRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Contacted => "CONTACTED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Parses a list filter; `None`, empty and `ALL` mean no filter.
    pub fn parse_filter(value: Option<&str>) -> Result<Option<Self>, DomainError> {
        match value.map(str::trim) {
            None | Some("") | Some("ALL") => Ok(None),
            Some(other) => other.parse().map(Some),
        }
    }
}

impl fmt::Display for QuoteRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuoteRequestStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "CONTACTED" => Ok(Self::Contacted),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(DomainError::InvariantViolation(format!("unknown quote status `{value}`"))),
        }
    }
}

/// Flat answer set submitted by the quote wizard. Every field is optional on
/// the wire; [`CctvQuoteRequest::validate`] enforces the required ones.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CctvQuoteRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installation_place: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_type_other: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installation_locations: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installation_location_other: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installation_quantities: Option<BTreeMap<String, u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculated_price: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_quote_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agree_terms: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_cameras: Option<u32>,
}

fn required_text(value: &Option<String>, field: &'static str) -> Result<String, DomainError> {
    match value.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_owned()),
        _ => Err(DomainError::MissingField(field)),
    }
}

fn optional_text(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|text| !text.is_empty()).map(str::to_owned)
}

impl CctvQuoteRequest {
    /// Checks required fields in submission order and reports the first missing
    /// one. Empty strings, lists and maps and a zero price count as missing.
    pub fn validate(&self) -> Result<ValidatedCctvQuote, DomainError> {
        let installation_place = required_text(&self.installation_place, "installationPlace")?;
        let business_size = required_text(&self.business_size, "businessSize")?;

        let installation_locations = match &self.installation_locations {
            Some(locations) if !locations.is_empty() => locations.clone(),
            _ => return Err(DomainError::MissingField("installationLocations")),
        };
        let installation_quantities = match &self.installation_quantities {
            Some(quantities) if !quantities.is_empty() => quantities.clone(),
            _ => return Err(DomainError::MissingField("installationQuantities")),
        };
        if let Some((location, count)) = installation_quantities
            .iter()
            .find(|(_, count)| !(1..=MAX_CAMERAS_PER_LOCATION).contains(*count))
        {
            return Err(DomainError::InvariantViolation(format!(
                "installationQuantities.{location} must be between 1 and \
                 {MAX_CAMERAS_PER_LOCATION}, got {count}"
            )));
        }
        let calculated_price = match self.calculated_price {
            Some(0) | None => return Err(DomainError::MissingField("calculatedPrice")),
            Some(price) if price < 0 => {
                return Err(DomainError::InvariantViolation(
                    "calculatedPrice must be positive".to_owned(),
                ))
            }
            Some(price) => price,
        };

        let final_quote_method = required_text(&self.final_quote_method, "finalQuoteMethod")?;
        let contact_method = required_text(&self.contact_method, "contactMethod")?;
        let business_name = required_text(&self.business_name, "businessName")?;
        let contact_name = required_text(&self.contact_name, "contactName")?;
        let phone = required_text(&self.phone, "phone")?;
        let business_location = required_text(&self.business_location, "businessLocation")?;
        let agree_terms = match &self.agree_terms {
            Some(terms) if !terms.is_empty() => terms.clone(),
            _ => return Err(DomainError::MissingField("agreeTerms")),
        };

        Ok(ValidatedCctvQuote {
            installation_place,
            business_type: optional_text(&self.business_type),
            business_type_other: optional_text(&self.business_type_other),
            business_size,
            installation_locations,
            installation_location_other: optional_text(&self.installation_location_other),
            installation_quantities,
            calculated_price,
            final_quote_method,
            contact_method,
            business_name,
            contact_name,
            phone,
            business_location,
            agree_terms,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedCctvQuote {
    pub installation_place: String,
    pub business_type: Option<String>,
    pub business_type_other: Option<String>,
    pub business_size: String,
    pub installation_locations: Vec<String>,
    pub installation_location_other: Option<String>,
    pub installation_quantities: BTreeMap<String, u32>,
    pub calculated_price: i64,
    pub final_quote_method: String,
    pub contact_method: String,
    pub business_name: String,
    pub contact_name: String,
    pub phone: String,
    pub business_location: String,
    pub agree_terms: Vec<String>,
}

impl ValidatedCctvQuote {
    pub fn total_cameras(&self) -> u32 {
        self.installation_quantities.values().fold(0, |total, count| total.saturating_add(*count))
    }

    /// A new pending record. The monthly rental equals the calculated price.
    pub fn into_record(self, id: QuoteRequestId, submitted_at: DateTime<Utc>) -> CctvQuoteRecord {
        let total_cameras = self.total_cameras();
        CctvQuoteRecord {
            id,
            monthly_rental: self.calculated_price,
            total_cameras,
            status: QuoteRequestStatus::Pending,
            submitted_at,
            installation_place: self.installation_place,
            business_type: self.business_type,
            business_type_other: self.business_type_other,
            business_size: self.business_size,
            installation_locations: self.installation_locations,
            installation_location_other: self.installation_location_other,
            installation_quantities: self.installation_quantities,
            calculated_price: self.calculated_price,
            final_quote_method: self.final_quote_method,
            contact_method: self.contact_method,
            business_name: self.business_name,
            contact_name: self.contact_name,
            phone: self.phone,
            business_location: self.business_location,
            agree_terms: self.agree_terms,
        }
    }
}

/// Stored quote request, serialized with the column names of `cctv_quote_requests`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CctvQuoteRecord {
    pub id: QuoteRequestId,
    pub installation_place: String,
    pub business_type: Option<String>,
    pub business_type_other: Option<String>,
    pub business_size: String,
    pub installation_locations: Vec<String>,
    pub installation_location_other: Option<String>,
    pub installation_quantities: BTreeMap<String, u32>,
    pub calculated_price: i64,
    pub total_cameras: u32,
    pub monthly_rental: i64,
    pub final_quote_method: String,
    pub contact_method: String,
    pub business_name: String,
    pub contact_name: String,
    pub phone: String,
    pub business_location: String,
    pub agree_terms: Vec<String>,
    pub status: QuoteRequestStatus,
    pub submitted_at: DateTime<Utc>,
}

impl CctvQuoteRecord {
    pub fn receipt(&self) -> QuoteReceipt {
        QuoteReceipt {
            id: self.id.clone(),
            submitted_at: self.submitted_at,
            total_cameras: self.total_cameras,
            monthly_price: self.monthly_rental,
        }
    }
}

/// What the intake endpoint returns for an accepted request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteReceipt {
    pub id: QuoteRequestId,
    pub submitted_at: DateTime<Utc>,
    pub total_cameras: u32,
    pub monthly_price: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuoteListFilter {
    pub status: Option<QuoteRequestStatus>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for QuoteListFilter {
    fn default() -> Self {
        Self { status: None, limit: DEFAULT_LIST_LIMIT, offset: 0 }
    }
}
