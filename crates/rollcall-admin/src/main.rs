//! rollcall-admin — operator tooling for the reconciliation engine.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite store, and runs one engine operation: inspect a voter, merge two
//! accounts, or run caching repair for a provider identity.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use rollcall_core::{identity::Provider, store::ReconciliationStore};
use rollcall_engine::Reconciler;
use rollcall_store_sqlite::SqliteStore;
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about = "Rollcall reconciliation admin tool")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Print a voter record and its dependent-record counts.
  ShowVoter { voter_id: Uuid },

  /// Merge one voter account into another (from is retired to a husk).
  Merge { from: Uuid, to: Uuid },

  /// Run caching repair for one provider identity.
  Repair {
    /// Identity provider: twitter | facebook.
    provider:         String,
    external_user_id: i64,
  },
}

#[derive(Debug, Clone, Deserialize)]
struct AdminConfig {
  /// Path to the SQLite store file.
  store_path: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("ROLLCALL"))
    .build()
    .context("failed to read config file")?;

  let admin_cfg: AdminConfig = settings
    .try_deserialize()
    .context("failed to deserialise AdminConfig")?;

  let store = SqliteStore::open(&admin_cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", admin_cfg.store_path))?;
  let engine = Reconciler::new(Arc::new(store));

  match cli.command {
    Command::ShowVoter { voter_id } => show_voter(&engine, voter_id).await,
    Command::Merge { from, to } => {
      let report = engine.merge_voters(from, to).await?;
      println!("{}", report.render());
      if !report.completed {
        anyhow::bail!("merge halted: manual intervention required");
      }
      Ok(())
    }
    Command::Repair {
      provider,
      external_user_id,
    } => {
      let provider = Provider::from_str(&provider)?;
      let outcome = engine
        .repair_provider_caching(provider, external_user_id, None)
        .await?;
      if !outcome.executed {
        println!("no identity link for {provider} {external_user_id}; nothing repaired");
        return Ok(());
      }
      println!(
        "cleared {} voter(s), {} organization(s); owner refreshed: {}",
        outcome.voters_cleared, outcome.organizations_cleared, outcome.owner_refreshed,
      );
      Ok(())
    }
  }
}

async fn show_voter(engine: &Reconciler<SqliteStore>, voter_id: Uuid) -> anyhow::Result<()> {
  let store = engine.store();
  let voter = store
    .get_voter(voter_id)
    .await?
    .with_context(|| format!("no voter {voter_id}"))?;

  println!("{}", serde_json::to_string_pretty(&voter)?);
  println!(
    "positions: {}  follows: {}  friendships: {}  email entries: {}  donations: {}  guides: {}",
    store.positions_for_voter(voter_id).await?.len(),
    store.follows_for_voter(voter_id).await?.len(),
    store.friendships_for_voter(voter_id).await?.len(),
    store.email_entries_for_voter(voter_id).await?.len(),
    store.donations_for_voter(voter_id).await?.len(),
    store.guides_for_voter(voter_id).await?.len(),
  );
  Ok(())
}
