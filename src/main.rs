use anyhow::Result;
use prospector::auth::{subject_email, CredentialProvider, FileCredentials, StaticCredentials};
use prospector::cache::NeighborCache;
use prospector::engine::{FrontierEngine, TriagePhase};
use prospector::error::ProspectorError;
use prospector::profile::ProfileSummary;
use prospector::source::HttpNeighborSource;
use prospector::store::{Db, SqliteStore, TriageStore};
use prospector::Config;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Pick the credential provider: a directly-supplied token wins over the
/// session file written by the login tooling.
fn build_credentials(config: &Config) -> Arc<dyn CredentialProvider> {
    if let Ok(token) = std::env::var("PROSPECTOR_TOKEN") {
        if !token.is_empty() {
            return Arc::new(StaticCredentials::new(Some(token)));
        }
    }
    Arc::new(FileCredentials::new(config.session_path()))
}

/// Build a fully wired engine: SQLite store (migrated), proxy client with
/// an optional neighbor LRU cache, and the configured credentials.
async fn build_engine(config: &Config) -> Result<FrontierEngine> {
    let store = SqliteStore::open(config.db_path()).await?;

    let credentials = build_credentials(config);

    // Wrap in an LRU cache if cache_capacity > 0 (avoids refetching the
    // neighbors of a recently expanded identifier)
    let cache = if config.api.cache_capacity > 0 {
        Some(Arc::new(NeighborCache::new(config.api.cache_capacity)))
    } else {
        None
    };

    let source = HttpNeighborSource::new(
        config.api.base_url.clone(),
        config.api.timeout_secs,
        credentials.clone(),
        cache,
    );

    Ok(FrontierEngine::new(
        Arc::new(source),
        Arc::new(store),
        credentials,
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger from environment variable or default to info level
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", "info"),
    )
    .init();

    // Parse command-line arguments
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("verify");

    match command {
        "triage" => {
            let seed = args
                .get(2)
                .ok_or_else(|| anyhow::anyhow!("Usage: prospector triage <seed-identifier>"))?;
            run_triage(seed).await?;
        }
        "stats" => {
            run_stats().await?;
        }
        "verify" | _ => {
            run_verify().await?;
        }
    }

    Ok(())
}

fn print_candidate(candidate: &ProfileSummary, pending: usize) {
    println!();
    println!("Candidate: {}", candidate.display_name());
    println!("  identifier: {}", candidate.public_identifier);
    if let Some(headline) = &candidate.headline {
        println!("  headline:   {}", headline);
    }
    println!("  pending:    {}", pending);
    println!("[a]ccept  [s]kip  s[t]ats  [q]uit");
}

async fn show_position(engine: &FrontierEngine) -> Result<bool> {
    match engine.current().await {
        Some(candidate) => {
            let stats = engine.stats().await?;
            print_candidate(&candidate, stats.pending);
            Ok(true)
        }
        None => {
            let in_flight = engine.expansions_in_flight().await;
            if in_flight > 0 {
                println!(
                    "Queue exhausted; {} expansion(s) still in flight. Press enter to refresh.",
                    in_flight
                );
                Ok(true)
            } else {
                println!("All candidates reviewed.");
                Ok(false)
            }
        }
    }
}

/// Interactive triage loop (reads operator commands from stdin)
async fn run_triage(seed: &str) -> Result<()> {
    let config = Config::load()?;
    let engine = build_engine(&config).await?;

    match engine.start(seed).await {
        Ok(0) => {
            println!("No similar profiles found for {}.", seed);
            return Ok(());
        }
        Ok(n) => {
            println!("Found {} similar profile(s) for {}.", n, seed);
        }
        Err(ProspectorError::NoCredential) => {
            println!(
                "Not authenticated. Save a session file at {} or set PROSPECTOR_TOKEN.",
                config.session_path().display()
            );
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    if !show_position(&engine).await? {
        return Ok(());
    }

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "a" | "accept" => match engine.accept().await {
                Ok(accepted) => {
                    println!("Accepted {}.", accepted.display_name());
                }
                Err(ProspectorError::NoCandidate) => {}
                Err(e) => println!("Accept failed, candidate not advanced: {}", e),
            },
            "s" | "skip" => match engine.skip().await {
                Ok(rejected) => {
                    println!("Skipped ({} rejected so far).", rejected);
                }
                Err(ProspectorError::NoCandidate) => {}
                Err(e) => println!("Skip failed, candidate not advanced: {}", e),
            },
            "t" | "stats" => {
                let stats = engine.stats().await?;
                println!(
                    "accepted={} rejected={} pending={}",
                    stats.accepted, stats.rejected, stats.pending
                );
            }
            "q" | "quit" | "stop" => {
                engine.stop().await;
                println!("Stopped.");
                break;
            }
            "" => {} // fall through to re-display the current position
            other => {
                println!("Unknown command: {}", other);
            }
        }

        if engine.phase().await == TriagePhase::Idle {
            break;
        }
        if !show_position(&engine).await? {
            break;
        }
    }

    Ok(())
}

/// Print durable counters and the most recent acceptances
async fn run_stats() -> Result<()> {
    let config = Config::load()?;
    let store = SqliteStore::open(config.db_path()).await?;

    let accepted = store.accepted_count().await?;
    let rejected = store.rejected_count().await?;

    println!("\n=== Prospector Triage Statistics ===\n");
    println!("{:<12} {:>8}", "Accepted", accepted);
    println!("{:<12} {:>8}", "Rejected", rejected);

    let recent = store.list_accepted().await?;
    if !recent.is_empty() {
        println!("\nMost recent acceptances:");
        for entry in recent.iter().take(5) {
            println!(
                "  {:<30} {}",
                entry.profile.display_name(),
                entry.saved_at.format("%Y-%m-%d %H:%M")
            );
        }
    }
    println!();

    Ok(())
}

/// Verify configuration, database schema and credential status
async fn run_verify() -> Result<()> {
    log::info!("Starting Prospector v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    log::info!("Configuration loaded successfully");
    log::info!("Database path: {}", config.db_path().display());
    log::info!("Proxy base URL: {}", config.api.base_url);

    let db = Db::new(config.db_path());
    db.migrate().await?;
    log::info!("Database initialized successfully");

    db.with_connection(|conn| {
        let mut stmt =
            conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

        for table in ["accepted_profiles", "counters", "schema_migrations"] {
            if tables.iter().any(|t| t == table) {
                log::debug!("Table exists: {}", table);
            } else {
                return Err(ProspectorError::Config(format!("Missing table: {}", table)));
            }
        }

        let journal_mode: String =
            conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
        if journal_mode.to_uppercase() != "WAL" {
            return Err(ProspectorError::Config(format!(
                "Journal mode is not WAL: {}",
                journal_mode
            )));
        }
        log::debug!("Journal mode: WAL");

        Ok(())
    })
    .await?;
    log::info!("Database schema verification complete");

    let credentials = build_credentials(&config);
    if credentials.has_valid_credential() {
        match credentials.access_token().as_deref().and_then(subject_email) {
            Some(email) => log::info!("Authenticated as {}", email),
            None => log::info!("Valid credential present"),
        }
    } else {
        log::warn!(
            "No valid credential; triage will refuse to start. Session file: {}",
            config.session_path().display()
        );
    }

    log::info!("Ready to triage");
    Ok(())
}
