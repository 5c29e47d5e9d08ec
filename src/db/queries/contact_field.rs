//! Contact field registry queries

use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, FromRow)]
pub struct ContactFieldRow {
    pub alias: String,
    pub label: String,
    pub field_type: String,
    pub field_group: String,
    pub is_published: bool,
    pub is_editable: bool,
}

/// List contact fields.
///
/// Non-editable fields are skipped unless `include_non_editable` is set;
/// unpublished fields are skipped when `published_only` is set.
pub async fn list_fields(
    pool: &PgPool,
    include_non_editable: bool,
    published_only: bool,
) -> Result<Vec<ContactFieldRow>, sqlx::Error> {
    sqlx::query_as::<_, ContactFieldRow>(
        r#"
        SELECT alias, label, field_type, field_group, is_published, is_editable
        FROM contact_fields
        WHERE ($1 OR is_editable)
          AND (NOT $2 OR is_published)
        ORDER BY field_order, alias
        "#,
    )
    .bind(include_non_editable)
    .bind(published_only)
    .fetch_all(pool)
    .await
}
