use anyhow::{Context, Result};
use tracing::info;

use crate::{error::AppError, storage::db::SurrealDbClient};

const FTS_ANALYZER_NAME: &str = "file_search_analyzer";

#[derive(Clone, Copy)]
struct FtsIndexSpec {
    index_name: &'static str,
    table: &'static str,
    field: &'static str,
    analyzer: &'static str,
    method: &'static str,
    highlights: bool,
}

impl FtsIndexSpec {
    fn definition(&self) -> String {
        let highlights = if self.highlights { " HIGHLIGHTS" } else { "" };

        format!(
            "DEFINE INDEX IF NOT EXISTS {index} ON TABLE {table} FIELDS {field} \
             SEARCH ANALYZER {analyzer} {method}{highlights};",
            index = self.index_name,
            table = self.table,
            field = self.field,
            analyzer = self.analyzer,
            method = self.method,
        )
    }
}

#[derive(Clone, Copy)]
struct FieldIndexSpec {
    index_name: &'static str,
    table: &'static str,
    fields: &'static str,
}

impl FieldIndexSpec {
    fn definition(&self) -> String {
        format!(
            "DEFINE INDEX IF NOT EXISTS {index} ON TABLE {table} FIELDS {fields};",
            index = self.index_name,
            table = self.table,
            fields = self.fields,
        )
    }
}

/// Defines the analyzer and indexes backing `file_search`.
/// Idempotent: every definition uses `IF NOT EXISTS`.
pub async fn ensure_search_indexes(db: &SurrealDbClient) -> Result<(), AppError> {
    ensure_search_indexes_inner(db)
        .await
        .map_err(|err| AppError::InternalError(err.to_string()))
}

async fn ensure_search_indexes_inner(db: &SurrealDbClient) -> Result<()> {
    create_fts_analyzer(db).await?;

    for spec in fts_index_specs() {
        define_index(db, spec.definition(), spec.index_name, spec.table).await?;
    }

    for spec in field_index_specs() {
        define_index(db, spec.definition(), spec.index_name, spec.table).await?;
    }

    Ok(())
}

async fn create_fts_analyzer(db: &SurrealDbClient) -> Result<()> {
    let analyzer_query = format!(
        "DEFINE ANALYZER IF NOT EXISTS {analyzer}
            TOKENIZERS class
            FILTERS lowercase, ascii, snowball(english);",
        analyzer = FTS_ANALYZER_NAME
    );

    let res = db
        .client
        .query(analyzer_query)
        .await
        .context("creating FTS analyzer")?;

    res.check().context("failed to create FTS analyzer")?;
    Ok(())
}

async fn define_index(
    db: &SurrealDbClient,
    definition: String,
    index_name: &str,
    table: &str,
) -> Result<()> {
    let res = db
        .client
        .query(definition)
        .await
        .with_context(|| format!("creating index {index_name} on table {table}"))?;
    res.check()
        .with_context(|| format!("index definition failed for {index_name} on {table}"))?;

    info!(index = %index_name, table = %table, "Index defined");
    Ok(())
}

const fn fts_index_specs() -> [FtsIndexSpec; 1] {
    [FtsIndexSpec {
        index_name: "file_search_content_idx",
        table: "file_search",
        field: "content",
        analyzer: FTS_ANALYZER_NAME,
        method: "BM25",
        highlights: true,
    }]
}

const fn field_index_specs() -> [FieldIndexSpec; 2] {
    [
        FieldIndexSpec {
            index_name: "file_search_location_idx",
            table: "file_search",
            fields: "path, name",
        },
        FieldIndexSpec {
            index_name: "file_search_original_idx",
            table: "file_search",
            fields: "original_path, original_name",
        },
    ]
}
