use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};
use uuid::Uuid;

stored_object!(FileSearchRecord, "file_search", {
    cmd: String,
    path: String,
    name: String,
    part: u32,
    original_path: String,
    original_name: String,
    content: String
});

#[derive(Debug, Deserialize)]
struct PartRow {
    part: u32,
}

impl FileSearchRecord {
    /// One indexed chunk. `path` and `original_path` are directories with a trailing slash.
    pub fn new(
        cmd: &str,
        path: &str,
        name: &str,
        part: u32,
        original_path: &str,
        original_name: &str,
        content: &[u8],
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            cmd: cmd.to_owned(),
            path: path.to_owned(),
            name: name.to_owned(),
            part,
            original_path: original_path.to_owned(),
            original_name: original_name.to_owned(),
            content: String::from_utf8_lossy(content).into_owned(),
        }
    }

    pub async fn insert(self, db: &SurrealDbClient) -> Result<(), AppError> {
        let label = format!("{} {}{} part {}", self.cmd, self.path, self.name, self.part);
        db.store_item(self)
            .await
            .map_err(|err| AppError::IndexWrite(format!("{label}: {err}")))?;
        Ok(())
    }

    /// Part number the next appended chunk of `path`/`name` should take.
    pub async fn next_part(db: &SurrealDbClient, path: &str, name: &str) -> Result<u32, AppError> {
        let query = format!(
            "SELECT part FROM {} WHERE path = $path AND name = $name ORDER BY part DESC LIMIT 1",
            Self::table_name()
        );
        let mut response = db
            .query(query)
            .bind(("path", path.to_owned()))
            .bind(("name", name.to_owned()))
            .await?;
        let rows: Vec<PartRow> = response.take(0)?;

        Ok(rows
            .first()
            .map_or(0, |row| row.part.saturating_add(1)))
    }

    /// Drop every indexed chunk of `path`/`name`, regardless of the command that wrote it.
    pub async fn delete_for_file(
        db: &SurrealDbClient,
        path: &str,
        name: &str,
    ) -> Result<(), AppError> {
        let query = format!(
            "DELETE {} WHERE path = $path AND name = $name",
            Self::table_name()
        );
        db.query(query)
            .bind(("path", path.to_owned()))
            .bind(("name", name.to_owned()))
            .await?
            .check()?;
        Ok(())
    }

    /// All indexed chunks of `path`/`name`, in part order.
    pub async fn parts_for_file(
        db: &SurrealDbClient,
        path: &str,
        name: &str,
    ) -> Result<Vec<Self>, AppError> {
        let query = format!(
            "SELECT * FROM {} WHERE path = $path AND name = $name ORDER BY part ASC",
            Self::table_name()
        );
        let mut response = db
            .query(query)
            .bind(("path", path.to_owned()))
            .bind(("name", name.to_owned()))
            .await?;
        Ok(response.take(0)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_db() -> SurrealDbClient {
        let database = Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory("file_search_ns", &database)
            .await
            .expect("in-memory db");
        db.ensure_initialized().await.expect("schema");
        db
    }

    #[test]
    fn new_decodes_content_lossily() {
        let record = FileSearchRecord::new(
            "files",
            "/files/",
            "a.txt",
            0,
            "/files/",
            "a.txt",
            &[b'o', b'k', 0xff],
        );
        assert_eq!(record.content, "ok\u{fffd}");
        assert_eq!(record.part, 0);
    }

    #[tokio::test]
    async fn next_part_continues_after_highest_part() {
        let db = memory_db().await;

        assert_eq!(
            FileSearchRecord::next_part(&db, "/files/", "a.txt")
                .await
                .expect("empty lookup"),
            0
        );

        for part in 0..3 {
            FileSearchRecord::new("files", "/files/", "a.txt", part, "/files/", "a.txt", b"x")
                .insert(&db)
                .await
                .expect("insert");
        }
        FileSearchRecord::new("files", "/files/", "b.txt", 7, "/files/", "b.txt", b"y")
            .insert(&db)
            .await
            .expect("insert other file");

        assert_eq!(
            FileSearchRecord::next_part(&db, "/files/", "a.txt")
                .await
                .expect("lookup"),
            3
        );
    }

    #[tokio::test]
    async fn delete_for_file_only_touches_that_file() {
        let db = memory_db().await;

        FileSearchRecord::new("files", "/files/", "a.txt", 0, "/files/", "a.txt", b"a")
            .insert(&db)
            .await
            .expect("insert a");
        FileSearchRecord::new("append", "/files/", "a.txt", 1, "/files/", "a.txt", b"a2")
            .insert(&db)
            .await
            .expect("insert a append");
        FileSearchRecord::new("files", "/files/", "b.txt", 0, "/files/", "b.txt", b"b")
            .insert(&db)
            .await
            .expect("insert b");

        FileSearchRecord::delete_for_file(&db, "/files/", "a.txt")
            .await
            .expect("delete");

        let remaining_a = FileSearchRecord::parts_for_file(&db, "/files/", "a.txt")
            .await
            .expect("parts a");
        let remaining_b = FileSearchRecord::parts_for_file(&db, "/files/", "b.txt")
            .await
            .expect("parts b");
        assert!(remaining_a.is_empty());
        assert_eq!(remaining_b.len(), 1);
    }
}
