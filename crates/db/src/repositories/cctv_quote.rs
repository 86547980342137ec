use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use sqlx::Row;

use careon_core::domain::cctv_quote::{
    CctvQuoteRecord, QuoteListFilter, QuoteRequestId, QuoteRequestStatus,
};

use super::{decode_timestamp, encode_timestamp, CctvQuoteRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCctvQuoteRepository {
    pool: DbPool,
}

impl SqlCctvQuoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const QUOTE_COLUMNS: &str = "id, installation_place, business_type, business_type_other,
    business_size, installation_locations, installation_location_other,
    installation_quantities, calculated_price, total_cameras, monthly_rental,
    final_quote_method, contact_method, business_name, contact_name, phone,
    business_location, agree_terms, status, submitted_at";

fn column<T>(row: &sqlx::sqlite::SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn json_column<T: DeserializeOwned>(
    row: &sqlx::sqlite::SqliteRow,
    name: &str,
) -> Result<T, RepositoryError> {
    let raw: String = column(row, name)?;
    serde_json::from_str(&raw).map_err(|e| RepositoryError::Decode(format!("{name}: {e}")))
}

fn to_json<T: serde::Serialize>(name: &str, value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|e| RepositoryError::Decode(format!("{name}: {e}")))
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<CctvQuoteRecord, RepositoryError> {
    let status_str: String = column(row, "status")?;
    let submitted_at_str: String = column(row, "submitted_at")?;
    let total_cameras: i64 = column(row, "total_cameras")?;
    let installation_quantities: BTreeMap<String, u32> =
        json_column(row, "installation_quantities")?;

    Ok(CctvQuoteRecord {
        id: QuoteRequestId(column(row, "id")?),
        installation_place: column(row, "installation_place")?,
        business_type: column(row, "business_type")?,
        business_type_other: column(row, "business_type_other")?,
        business_size: column(row, "business_size")?,
        installation_locations: json_column(row, "installation_locations")?,
        installation_location_other: column(row, "installation_location_other")?,
        installation_quantities,
        calculated_price: column(row, "calculated_price")?,
        total_cameras: u32::try_from(total_cameras)
            .map_err(|e| RepositoryError::Decode(format!("total_cameras: {e}")))?,
        monthly_rental: column(row, "monthly_rental")?,
        final_quote_method: column(row, "final_quote_method")?,
        contact_method: column(row, "contact_method")?,
        business_name: column(row, "business_name")?,
        contact_name: column(row, "contact_name")?,
        phone: column(row, "phone")?,
        business_location: column(row, "business_location")?,
        agree_terms: json_column(row, "agree_terms")?,
        status: status_str
            .parse::<QuoteRequestStatus>()
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        submitted_at: decode_timestamp("submitted_at", &submitted_at_str)?,
    })
}

#[async_trait::async_trait]
impl CctvQuoteRepository for SqlCctvQuoteRepository {
    async fn insert(&self, record: CctvQuoteRecord) -> Result<(), RepositoryError> {
        let locations = to_json("installation_locations", &record.installation_locations)?;
        let quantities = to_json("installation_quantities", &record.installation_quantities)?;
        let agree_terms = to_json("agree_terms", &record.agree_terms)?;

        sqlx::query(
            "INSERT INTO cctv_quote_requests (id, installation_place, business_type,
                 business_type_other, business_size, installation_locations,
                 installation_location_other, installation_quantities, calculated_price,
                 total_cameras, monthly_rental, final_quote_method, contact_method,
                 business_name, contact_name, phone, business_location, agree_terms,
                 status, submitted_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id.0)
        .bind(&record.installation_place)
        .bind(&record.business_type)
        .bind(&record.business_type_other)
        .bind(&record.business_size)
        .bind(&locations)
        .bind(&record.installation_location_other)
        .bind(&quantities)
        .bind(record.calculated_price)
        .bind(i64::from(record.total_cameras))
        .bind(record.monthly_rental)
        .bind(&record.final_quote_method)
        .bind(&record.contact_method)
        .bind(&record.business_name)
        .bind(&record.contact_name)
        .bind(&record.phone)
        .bind(&record.business_location)
        .bind(&agree_terms)
        .bind(record.status.as_str())
        .bind(encode_timestamp(record.submitted_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &QuoteRequestId,
    ) -> Result<Option<CctvQuoteRecord>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {QUOTE_COLUMNS} FROM cctv_quote_requests WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn list(
        &self,
        filter: &QuoteListFilter,
    ) -> Result<(Vec<CctvQuoteRecord>, u64), RepositoryError> {
        let status = filter.status.map(|status| status.as_str());

        let rows = sqlx::query(&format!(
            "SELECT {QUOTE_COLUMNS} FROM cctv_quote_requests
             WHERE (?1 IS NULL OR status = ?1)
             ORDER BY submitted_at DESC, id DESC
             LIMIT ?2 OFFSET ?3"
        ))
        .bind(status)
        .bind(i64::from(filter.limit))
        .bind(i64::from(filter.offset))
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query(
            "SELECT COUNT(*) AS count FROM cctv_quote_requests WHERE (?1 IS NULL OR status = ?1)",
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await?
        .try_get("count")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;

        let records = rows.iter().map(row_to_record).collect::<Result<Vec<_>, _>>()?;
        Ok((records, total.max(0) as u64))
    }
}
