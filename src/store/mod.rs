use crate::error::{ProspectorError, Result};
use crate::profile::{AcceptedProfile, ProfileSummary};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tokio::task;

pub mod migrate;

/// Database connection wrapper
#[derive(Clone)]
pub struct Db {
    path: std::path::PathBuf,
}

impl Db {
    /// Create a new database connection manager
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
        }
    }

    fn configure(conn: &Connection) -> Result<()> {
        // WAL mode for concurrency, NORMAL sync for speed, foreign keys for
        // integrity, memory temp store for faster temp operations
        conn.execute_batch(
            "PRAGMA journal_mode = WAL; \
             PRAGMA synchronous = NORMAL; \
             PRAGMA foreign_keys = ON; \
             PRAGMA temp_store = MEMORY;",
        )?;
        Ok(())
    }

    /// Open a new database connection with optimized pragmas
    pub fn open_connection(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path).map_err(ProspectorError::Database)?;
        Self::configure(&conn)?;
        Ok(conn)
    }

    /// Execute a closure with a database connection in a blocking task
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        task::spawn_blocking(move || {
            let mut conn = Connection::open(&path).map_err(ProspectorError::Database)?;
            Self::configure(&conn)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            ProspectorError::Database(rusqlite::Error::ModuleError(format!(
                "storage task failed: {}",
                e
            )))
        })?
    }

    /// Run pending schema migrations
    pub async fn migrate(&self) -> Result<()> {
        self.with_connection(migrate::run_migrations).await
    }
}

/// Persistence contract consumed by the frontier engine: the accepted-profile
/// list and the monotonic rejection counter. Everything here is durable
/// across session stop and process restart.
#[async_trait]
pub trait TriageStore: Send + Sync {
    /// All accepted profiles, most recently saved first
    async fn list_accepted(&self) -> Result<Vec<AcceptedProfile>>;

    /// Insert a profile if its identifier is not already present.
    /// Returns true when a row was inserted, false on a no-op re-accept.
    async fn upsert_accepted(&self, profile: &ProfileSummary) -> Result<bool>;

    /// Remove an accepted profile. Returns true when a row was deleted.
    async fn remove_accepted(&self, identifier: &str) -> Result<bool>;

    async fn accepted_count(&self) -> Result<u64>;

    async fn rejected_count(&self) -> Result<u64>;

    /// Increment the rejection counter, returning the new value
    async fn increment_rejected(&self) -> Result<u64>;
}

/// SQLite-backed triage store
#[derive(Clone)]
pub struct SqliteStore {
    db: Db,
}

impl SqliteStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Open (and migrate) a store at the given path
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Db::new(path);
        db.migrate().await?;
        Ok(Self::new(db))
    }
}

fn row_to_accepted(row: &rusqlite::Row<'_>) -> rusqlite::Result<AcceptedProfile> {
    let saved_at: String = row.get("saved_at")?;
    let saved_at = saved_at
        .parse::<DateTime<Utc>>()
        .map_err(|e| rusqlite::Error::ModuleError(format!("bad saved_at: {}", e)))?;
    Ok(AcceptedProfile {
        profile: ProfileSummary {
            public_identifier: row.get("public_identifier")?,
            first_name: row.get("first_name")?,
            last_name: row.get("last_name")?,
            headline: row.get("headline")?,
            profile_picture_url: row.get("profile_picture_url")?,
        },
        saved_at,
    })
}

#[async_trait]
impl TriageStore for SqliteStore {
    async fn list_accepted(&self) -> Result<Vec<AcceptedProfile>> {
        self.db
            .with_connection(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT public_identifier, first_name, last_name, headline, \
                            profile_picture_url, saved_at \
                     FROM accepted_profiles ORDER BY id DESC",
                )?;
                let rows = stmt
                    .query_map([], row_to_accepted)?
                    .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
                Ok(rows)
            })
            .await
    }

    async fn upsert_accepted(&self, profile: &ProfileSummary) -> Result<bool> {
        let profile = profile.clone();
        let saved_at = Utc::now().to_rfc3339();
        self.db
            .with_connection(move |conn| {
                // INSERT OR IGNORE keeps the original saved_at on re-accept
                let changed = conn.execute(
                    "INSERT OR IGNORE INTO accepted_profiles \
                     (public_identifier, first_name, last_name, headline, \
                      profile_picture_url, saved_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        profile.public_identifier,
                        profile.first_name,
                        profile.last_name,
                        profile.headline,
                        profile.profile_picture_url,
                        saved_at,
                    ],
                )?;
                Ok(changed > 0)
            })
            .await
    }

    async fn remove_accepted(&self, identifier: &str) -> Result<bool> {
        let identifier = identifier.to_string();
        self.db
            .with_connection(move |conn| {
                let changed = conn.execute(
                    "DELETE FROM accepted_profiles WHERE public_identifier = ?1",
                    params![identifier],
                )?;
                Ok(changed > 0)
            })
            .await
    }

    async fn accepted_count(&self) -> Result<u64> {
        self.db
            .with_connection(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM accepted_profiles", [], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
    }

    async fn rejected_count(&self) -> Result<u64> {
        self.db
            .with_connection(|conn| {
                let value: Option<i64> = conn
                    .query_row(
                        "SELECT value FROM counters WHERE name = 'rejected'",
                        [],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(value.unwrap_or(0) as u64)
            })
            .await
    }

    async fn increment_rejected(&self) -> Result<u64> {
        self.db
            .with_connection(|conn| {
                let value: i64 = conn.query_row(
                    "INSERT INTO counters (name, value) VALUES ('rejected', 1) \
                     ON CONFLICT(name) DO UPDATE SET value = value + 1 \
                     RETURNING value",
                    [],
                    |row| row.get(0),
                )?;
                Ok(value as u64)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_test_store() -> (TempDir, SqliteStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::open(temp_dir.path().join("test.db"))
            .await
            .unwrap();
        (temp_dir, store)
    }

    fn profile(id: &str) -> ProfileSummary {
        let mut p = ProfileSummary::bare(id);
        p.headline = Some(format!("{} headline", id));
        p
    }

    #[tokio::test]
    async fn test_pragmas_set() {
        let temp_dir = TempDir::new().unwrap();
        let db = Db::new(temp_dir.path().join("test.db"));
        let conn = db.open_connection().unwrap();

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(journal_mode.to_uppercase(), "WAL");

        let foreign_keys: i32 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(foreign_keys, 1);
    }

    #[tokio::test]
    async fn test_upsert_and_list_most_recent_first() {
        let (_dir, store) = open_test_store().await;

        assert!(store.upsert_accepted(&profile("alice")).await.unwrap());
        assert!(store.upsert_accepted(&profile("bob")).await.unwrap());

        let accepted = store.list_accepted().await.unwrap();
        assert_eq!(accepted.len(), 2);
        assert_eq!(accepted[0].profile.public_identifier, "bob");
        assert_eq!(accepted[1].profile.public_identifier, "alice");
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let (_dir, store) = open_test_store().await;

        assert!(store.upsert_accepted(&profile("alice")).await.unwrap());
        // Second accept of the same identifier is a no-op re-affirmation
        assert!(!store.upsert_accepted(&profile("alice")).await.unwrap());

        assert_eq!(store.accepted_count().await.unwrap(), 1);
        let accepted = store.list_accepted().await.unwrap();
        assert_eq!(accepted.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_preserves_original_saved_at() {
        let (_dir, store) = open_test_store().await;

        store.upsert_accepted(&profile("alice")).await.unwrap();
        let first = store.list_accepted().await.unwrap()[0].saved_at;

        store.upsert_accepted(&profile("alice")).await.unwrap();
        let second = store.list_accepted().await.unwrap()[0].saved_at;

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_remove_accepted() {
        let (_dir, store) = open_test_store().await;

        store.upsert_accepted(&profile("alice")).await.unwrap();
        assert!(store.remove_accepted("alice").await.unwrap());
        assert!(!store.remove_accepted("alice").await.unwrap());
        assert_eq!(store.accepted_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejected_counter_monotonic() {
        let (_dir, store) = open_test_store().await;

        assert_eq!(store.rejected_count().await.unwrap(), 0);
        assert_eq!(store.increment_rejected().await.unwrap(), 1);
        assert_eq!(store.increment_rejected().await.unwrap(), 2);
        assert_eq!(store.increment_rejected().await.unwrap(), 3);
        assert_eq!(store.rejected_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_counters_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.db");

        {
            let store = SqliteStore::open(&path).await.unwrap();
            store.increment_rejected().await.unwrap();
            store.upsert_accepted(&profile("alice")).await.unwrap();
        }

        let store = SqliteStore::open(&path).await.unwrap();
        assert_eq!(store.rejected_count().await.unwrap(), 1);
        assert_eq!(store.accepted_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_round_trip_display_fields() {
        let (_dir, store) = open_test_store().await;

        let mut p = ProfileSummary::bare("jane-doe");
        p.first_name = Some("Jane".to_string());
        p.last_name = Some("Doe".to_string());
        p.headline = Some("Staff Engineer".to_string());
        p.profile_picture_url = Some("https://example.com/jane.jpg".to_string());

        store.upsert_accepted(&p).await.unwrap();
        let accepted = store.list_accepted().await.unwrap();
        assert_eq!(accepted[0].profile, p);
    }
}
