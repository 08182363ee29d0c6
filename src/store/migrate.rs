use crate::error::Result;
use rusqlite::{params, Connection};

/// Versioned migrations, compiled into the binary so the tool can run from
/// any working directory. Append-only: never edit an entry after release.
const MIGRATIONS: &[(u32, &str, &str)] = &[
    (
        1,
        "001_accepted_profiles",
        include_str!("../../migrations/001_accepted_profiles.sql"),
    ),
    (
        2,
        "002_counters",
        include_str!("../../migrations/002_counters.sql"),
    ),
];

/// Create schema_migrations table if it doesn't exist
fn ensure_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get list of applied migrations
pub fn get_applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM schema_migrations ORDER BY version")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(names)
}

/// Run all pending migrations
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    ensure_migrations_table(conn)?;

    let applied = get_applied_migrations(conn)?;

    for (version, name, sql) in MIGRATIONS {
        if applied.iter().any(|a| a == name) {
            log::debug!("Migration {} already applied, skipping", name);
            continue;
        }

        log::info!("Applying migration: {} (version {})", name, version);

        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![version, name],
        )?;
        tx.commit()?;
    }

    log::debug!("All migrations applied");
    Ok(())
}
