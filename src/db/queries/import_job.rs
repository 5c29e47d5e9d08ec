//! Import job queries

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::services::job_store::StoreError;
use crate::types::{FieldMapping, ImportJob, ImportJobStatus, NewImportJob};

/// `matched_fields` is stored as `[[column, field], ...]`: JSONB keeps array
/// order but not object key order.
fn mapping_to_column(mapping: &FieldMapping) -> serde_json::Value {
    serde_json::Value::Array(
        mapping
            .iter()
            .map(|(column, field)| serde_json::json!([column, field]))
            .collect(),
    )
}

fn mapping_from_column(value: serde_json::Value) -> Result<FieldMapping, StoreError> {
    let pairs: Vec<(String, String)> = serde_json::from_value(value)?;
    Ok(pairs.into_iter().collect())
}

/// Raw `import_jobs` row; JSON columns are decoded in `into_job`.
#[derive(Debug, FromRow)]
struct ImportJobRow {
    id: Uuid,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    matched_fields: serde_json::Value,
    directory: String,
    file: String,
    original_file: String,
    headers: Vec<String>,
    line_count: i64,
    parser_config: serde_json::Value,
    default_overrides: serde_json::Value,
    status: String,
}

impl ImportJobRow {
    fn into_job(self) -> Result<ImportJob, StoreError> {
        let status = ImportJobStatus::from_db(&self.status)
            .ok_or_else(|| StoreError::UnknownStatus(self.id, self.status.clone()))?;
        let line_count = u64::try_from(self.line_count).map_err(|_| {
            StoreError::Backend(format!(
                "stored job {} has negative line count {}",
                self.id, self.line_count
            ))
        })?;

        Ok(ImportJob {
            id: self.id,
            created_by: self.created_by,
            created_at: self.created_at,
            matched_fields: mapping_from_column(self.matched_fields)?,
            directory: self.directory,
            file: self.file,
            original_file: self.original_file,
            headers: self.headers,
            line_count,
            parser_config: serde_json::from_value(self.parser_config)?,
            default_overrides: serde_json::from_value(self.default_overrides)?,
            status,
        })
    }
}

/// Insert a new import job in a single statement.
pub async fn insert_import_job(pool: &PgPool, job: NewImportJob) -> Result<ImportJob, StoreError> {
    let line_count = i64::try_from(job.line_count)
        .map_err(|_| StoreError::Backend(format!("line count {} out of range", job.line_count)))?;

    let (id, created_at): (Uuid, DateTime<Utc>) = sqlx::query_as(
        r#"
        INSERT INTO import_jobs (
            id, created_by, matched_fields, directory, file, original_file,
            headers, line_count, parser_config, default_overrides, status
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING id, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(job.created_by)
    .bind(mapping_to_column(&job.matched_fields))
    .bind(&job.directory)
    .bind(&job.file)
    .bind(&job.original_file)
    .bind(&job.headers)
    .bind(line_count)
    .bind(serde_json::to_value(&job.parser_config)?)
    .bind(serde_json::Value::Object(job.default_overrides.clone()))
    .bind(job.status.as_str())
    .fetch_one(pool)
    .await?;

    Ok(job.into_persisted(id, created_at))
}

/// Get an import job visible to `created_by`
pub async fn get_import_job(
    pool: &PgPool,
    id: Uuid,
    created_by: Uuid,
) -> Result<Option<ImportJob>, StoreError> {
    let row = sqlx::query_as::<_, ImportJobRow>(
        r#"
        SELECT
            id, created_by, created_at, matched_fields, directory, file,
            original_file, headers, line_count, parser_config,
            default_overrides, status
        FROM import_jobs
        WHERE id = $1 AND created_by = $2
        "#,
    )
    .bind(id)
    .bind(created_by)
    .fetch_optional(pool)
    .await?;

    row.map(ImportJobRow::into_job).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{default_overrides, ParserConfig};

    fn row(matched_fields: serde_json::Value) -> ImportJobRow {
        ImportJobRow {
            id: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            matched_fields,
            directory: "/var/imports/u1".to_string(),
            file: "a.csv".to_string(),
            original_file: "contacts.csv".to_string(),
            headers: vec!["firstname".to_string(), "email".to_string()],
            line_count: 2,
            parser_config: serde_json::to_value(ParserConfig::default()).unwrap(),
            default_overrides: serde_json::Value::Object(default_overrides()),
            status: "queued".to_string(),
        }
    }

    #[test]
    fn test_mapping_column_keeps_unsorted_order() {
        let mapping: FieldMapping = [("firstname", "first_name"), ("email", "email")]
            .into_iter()
            .collect();

        let column = mapping_to_column(&mapping);
        assert_eq!(
            column,
            serde_json::json!([["firstname", "first_name"], ["email", "email"]])
        );

        let job = row(column).into_job().unwrap();
        assert_eq!(job.matched_fields, mapping);
        let columns: Vec<&str> = job.matched_fields.iter().map(|(c, _)| c).collect();
        assert_eq!(columns, vec!["firstname", "email"]);
    }

    #[test]
    fn test_object_mapping_column_is_rejected() {
        let err = row(serde_json::json!({"email": "email"})).into_job().unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[test]
    fn test_unknown_status_is_reported() {
        let mut raw = row(serde_json::json!([]));
        raw.status = "stopped".to_string();
        let id = raw.id;
        let err = raw.into_job().unwrap_err();
        assert!(matches!(err, StoreError::UnknownStatus(job_id, ref s) if job_id == id && s == "stopped"));
    }

    #[test]
    fn test_negative_line_count_is_rejected() {
        let mut raw = row(serde_json::json!([]));
        raw.line_count = -1;
        assert!(matches!(raw.into_job(), Err(StoreError::Backend(_))));
    }
}
