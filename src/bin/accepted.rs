use anyhow::Result;
use clap::{Parser, Subcommand};
use prospector::store::{SqliteStore, TriageStore};
use prospector::Config;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "accepted")]
#[command(about = "Manage the accepted-profile list")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List accepted profiles, most recent first (default)
    List {
        /// Show at most this many entries
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Remove an accepted profile by identifier
    Remove { identifier: String },
    /// Export accepted profiles as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", "info"),
    )
    .init();

    let args = Args::parse();

    let config = Config::load()?;
    let store = SqliteStore::open(config.db_path()).await?;

    match args.command.unwrap_or(Command::List { limit: None }) {
        Command::List { limit } => {
            let accepted = store.list_accepted().await?;
            if accepted.is_empty() {
                println!("No accepted profiles yet.");
                return Ok(());
            }

            let shown = limit.unwrap_or(accepted.len());
            println!("{:-<72}", "");
            println!("{:<28} {:<26} {:>16}", "Name", "Identifier", "Saved");
            println!("{:-<72}", "");
            for entry in accepted.iter().take(shown) {
                println!(
                    "{:<28} {:<26} {:>16}",
                    entry.profile.display_name(),
                    entry.profile.public_identifier,
                    entry.saved_at.format("%Y-%m-%d %H:%M"),
                );
            }
            println!("{:-<72}", "");
            println!("{} of {} shown", shown.min(accepted.len()), accepted.len());
        }
        Command::Remove { identifier } => {
            if store.remove_accepted(&identifier).await? {
                println!("Removed {}.", identifier);
            } else {
                println!("{} was not in the accepted list.", identifier);
            }
        }
        Command::Export { output } => {
            let accepted = store.list_accepted().await?;
            let json = serde_json::to_string_pretty(&accepted)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    println!("Exported {} profile(s) to {}", accepted.len(), path.display());
                }
                None => println!("{}", json),
            }
        }
    }

    Ok(())
}
