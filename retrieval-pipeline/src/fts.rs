use serde::{Deserialize, Serialize};
use tracing::debug;

use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{file_search::FileSearchRecord, StoredObject},
    },
};

pub const HIGHLIGHT_OPEN: &str = r#"<b style="background-color:yellow">"#;
pub const HIGHLIGHT_CLOSE: &str = "</b>";

/// One matching chunk, attributed to the root artifact it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub original_path: String,
    pub original_name: String,
    pub part: u32,
    /// Chunk text with matched terms wrapped in the highlight markers.
    pub highlighted: String,
    pub score: f32,
}

#[derive(Debug, Deserialize)]
struct HitRow {
    original_path: String,
    original_name: String,
    part: u32,
    highlighted: Option<String>,
    score: Option<f32>,
}

impl From<HitRow> for SearchHit {
    fn from(row: HitRow) -> Self {
        Self {
            original_path: row.original_path,
            original_name: row.original_name,
            part: row.part,
            highlighted: row.highlighted.unwrap_or_default(),
            score: row.score.unwrap_or_default(),
        }
    }
}

/// Runs a full-text match over every indexed chunk, best BM25 score first.
///
/// A blank expression matches nothing and does not reach the database.
pub async fn search(db: &SurrealDbClient, match_expr: &str) -> Result<Vec<SearchHit>, AppError> {
    let terms = match_expr.trim();
    if terms.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT original_path, original_name, part, \
                search::highlight($open, $close, 0) AS highlighted, \
                search::score(0) AS score \
         FROM {table} \
         WHERE content @0@ $terms \
         ORDER BY score DESC",
        table = FileSearchRecord::table_name()
    );

    let mut response = db
        .query(sql)
        .bind(("open", HIGHLIGHT_OPEN))
        .bind(("close", HIGHLIGHT_CLOSE))
        .bind(("terms", terms.to_owned()))
        .await?;

    let rows: Vec<HitRow> = response.take(0)?;
    debug!(terms, hits = rows.len(), "full-text search finished");

    Ok(rows.into_iter().map(SearchHit::from).collect())
}

/// Hits belonging to one root artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct HitGroup {
    pub original_path: String,
    pub original_name: String,
    pub hits: Vec<SearchHit>,
}

/// Groups hits by original artifact, keeping groups and hits in first-appearance order.
pub fn group_by_original(hits: Vec<SearchHit>) -> Vec<HitGroup> {
    let mut groups: Vec<HitGroup> = Vec::new();

    for hit in hits {
        match groups.iter_mut().find(|group| {
            group.original_path == hit.original_path && group.original_name == hit.original_name
        }) {
            Some(group) => group.hits.push(hit),
            None => groups.push(HitGroup {
                original_path: hit.original_path.clone(),
                original_name: hit.original_name.clone(),
                hits: vec![hit],
            }),
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn indexed_db(records: Vec<FileSearchRecord>) -> SurrealDbClient {
        let namespace = "fts_test_ns";
        let database = &Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory(namespace, database)
            .await
            .expect("failed to create in-memory surreal");
        db.ensure_initialized()
            .await
            .expect("failed to define indexes");

        for record in records {
            record.insert(&db).await.expect("failed to insert chunk");
        }

        db
    }

    fn chunk(
        path: &str,
        name: &str,
        part: u32,
        original_name: &str,
        content: &str,
    ) -> FileSearchRecord {
        FileSearchRecord::new(
            "files",
            path,
            name,
            part,
            path,
            original_name,
            content.as_bytes(),
        )
    }

    fn hit(name: &str, part: u32) -> SearchHit {
        SearchHit {
            original_path: "/files/".into(),
            original_name: name.into(),
            part,
            highlighted: String::new(),
            score: 1.0,
        }
    }

    #[tokio::test]
    async fn unique_term_yields_one_highlighted_hit_for_the_root_file() {
        let db = indexed_db(vec![
            chunk(
                "/files/docs/",
                "report.pdf--extract.txt",
                0,
                "report.pdf",
                "quarterly numbers mention the zeppelin project",
            ),
            chunk(
                "/files/docs/",
                "report.pdf--extract.txt",
                1,
                "report.pdf",
                "closing remarks without anything notable",
            ),
            chunk("/files/", "notes.txt", 0, "notes.txt", "groceries and errands"),
        ])
        .await;

        let hits = search(&db, "zeppelin").await.expect("search");

        assert_eq!(hits.len(), 1);
        let only = &hits[0];
        assert_eq!(only.original_path, "/files/docs/");
        assert_eq!(only.original_name, "report.pdf");
        assert_eq!(only.part, 0);
        assert!(only
            .highlighted
            .contains(&format!("{HIGHLIGHT_OPEN}zeppelin{HIGHLIGHT_CLOSE}")));
    }

    #[tokio::test]
    async fn matching_is_case_insensitive_and_stemmed() {
        let db = indexed_db(vec![chunk(
            "/files/",
            "log.txt",
            0,
            "log.txt",
            "The Servers were Restarting all night",
        )])
        .await;

        let hits = search(&db, "server restart").await.expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].original_name, "log.txt");
    }

    #[tokio::test]
    async fn blank_match_returns_nothing() {
        let db = indexed_db(vec![chunk("/files/", "a.txt", 0, "a.txt", "anything")]).await;

        assert!(search(&db, "   ").await.expect("search").is_empty());
        assert!(search(&db, "").await.expect("search").is_empty());
    }

    #[test]
    fn grouping_keeps_first_appearance_order() {
        let groups = group_by_original(vec![
            hit("b.txt", 3),
            hit("a.txt", 0),
            hit("b.txt", 1),
        ]);

        let names: Vec<&str> = groups
            .iter()
            .map(|group| group.original_name.as_str())
            .collect();
        assert_eq!(names, vec!["b.txt", "a.txt"]);

        let b_parts: Vec<u32> = groups[0].hits.iter().map(|hit| hit.part).collect();
        assert_eq!(b_parts, vec![3, 1]);
    }
}
