//! # Portfolio Perfecto CLI
//!
//! Command-line host for stored portfolios. Every command that touches page
//! content opens a [`PortfolioSession`] against an in-process
//! [`HeadlessHost`], so content flows through the same editor bridge a UI
//! would use.
//!
//! ## Usage
//!
//! ```bash
//! portfolio-perfecto --data-dir ./portfolios new --title "Spring Show"
//! portfolio-perfecto import generated.json
//! portfolio-perfecto text <id>
//! ```
//!
//! ## Architecture
//!
//! - `CliArgs` - Command-line arguments parsed with clap
//! - `CliConfig` - Storage location and workspace configuration
//! - `run` - Executes one command and returns what to print

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use folio_core::bridge::BridgeConfig;
use folio_core::{
    EditMode, HeadlessHost, Navigator, PortfolioDocument, PortfolioRepository, PortfolioSession,
    PortfolioStore, WorkspaceConfig,
};
use tokio::task::JoinHandle;

/// Default directory for stored portfolios.
pub const DEFAULT_DATA_DIR: &str = ".portfolio-perfecto";

/// Command-line arguments for portfolio-perfecto.
#[derive(Debug, Clone, Parser)]
#[command(name = "portfolio-perfecto")]
#[command(about = "Create, import and inspect Portfolio Perfecto portfolios")]
#[command(version)]
pub struct CliArgs {
    /// Directory holding stored portfolios and uploaded images
    #[arg(long, env = "FOLIO_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// How long to wait for an editor reply, in milliseconds
    #[arg(long, env = "FOLIO_BRIDGE_TIMEOUT_MS", default_value = "5000")]
    pub bridge_timeout_ms: u64,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Commands understood by the CLI.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create and save an empty portfolio, printing its id
    New {
        /// Portfolio title
        #[arg(long)]
        title: Option<String>,
    },
    /// Import a portfolio JSON file, printing its stored id
    ///
    /// Generated `fetchImage(query)` image sources are stored unresolved.
    Import {
        /// Path to the portfolio JSON
        file: PathBuf,
    },
    /// Show each page's title and element counts
    Inspect {
        /// Portfolio id
        id: String,
    },
    /// Print the plain text of every textbox
    Text {
        /// Portfolio id
        id: String,
    },
    /// List stored portfolio ids
    List,
}

/// Resolved configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Storage directory.
    pub data_dir: PathBuf,
    /// Configuration for every page workspace.
    pub workspace: WorkspaceConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            workspace: WorkspaceConfig::default(),
        }
    }
}

impl From<&CliArgs> for CliConfig {
    fn from(args: &CliArgs) -> Self {
        Self {
            data_dir: args.data_dir.clone(),
            workspace: WorkspaceConfig {
                bridge: BridgeConfig {
                    response_timeout: Duration::from_millis(args.bridge_timeout_ms),
                    ..BridgeConfig::default()
                },
                ..WorkspaceConfig::default()
            },
        }
    }
}

/// Navigation has no screens here; it is logged.
#[derive(Debug, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, screen: &str, params: serde_json::Value) {
        tracing::info!(%screen, %params, "Navigate");
    }
}

/// Run one command and return what to print.
///
/// # Errors
///
/// Returns an error if the store cannot be opened, the portfolio cannot be
/// found or parsed, or saving fails.
pub async fn run(config: &CliConfig, command: Command) -> anyhow::Result<String> {
    let store = PortfolioStore::with_data_dir(&config.data_dir).with_context(|| {
        format!("failed to open data directory {}", config.data_dir.display())
    })?;

    match command {
        Command::New { title } => {
            let host = Arc::new(HeadlessHost::new());
            let mut session = PortfolioSession::create(host.clone(), config.workspace.clone());
            if let Some(title) = title {
                session.set_title(title);
            }
            save(&store, &host, session).await
        }
        Command::Import { file } => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let doc = PortfolioDocument::from_json(&json)
                .with_context(|| format!("{} is not a portfolio", file.display()))?;
            let host = Arc::new(HeadlessHost::new());
            let session =
                PortfolioSession::open(&doc, EditMode::Edit, host.clone(), config.workspace.clone());
            save(&store, &host, session).await
        }
        Command::Inspect { id } => {
            let doc = store.load_portfolio(&id).await?;
            Ok(describe(&doc))
        }
        Command::Text { id } => {
            let host = Arc::new(HeadlessHost::new());
            let session = PortfolioSession::load(
                &store,
                &id,
                None,
                EditMode::View,
                host.clone(),
                config.workspace.clone(),
            )
            .await?;
            let pump = serve(&host, &session)?;
            let text = session.gather_text().await;
            pump.abort();
            Ok(text)
        }
        Command::List => Ok(store.ids()?.join("\n")),
    }
}

async fn save(
    store: &PortfolioStore,
    host: &HeadlessHost,
    mut session: PortfolioSession,
) -> anyhow::Result<String> {
    let pump = serve(host, &session)?;
    let id = session.save(store, store, &LogNavigator).await;
    pump.abort();
    Ok(id?)
}

fn serve(host: &HeadlessHost, session: &PortfolioSession) -> anyhow::Result<JoinHandle<()>> {
    Ok(host.serve(session.registry())?)
}

/// Human-readable summary of a portfolio.
#[must_use]
pub fn describe(doc: &PortfolioDocument) -> String {
    let mut out = format!("{} ({})", doc.title, doc.id);
    for page in &doc.pages {
        let _ = write!(
            out,
            "\n  {}: {} textboxes, {} images",
            page.title,
            page.workspace.textboxes.len(),
            page.workspace.images.len()
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &std::path::Path) -> CliConfig {
        CliConfig {
            data_dir: dir.to_path_buf(),
            ..CliConfig::default()
        }
    }

    #[test]
    fn test_args_parse() {
        let args = CliArgs::parse_from([
            "portfolio-perfecto",
            "--data-dir",
            "/tmp/p",
            "--bridge-timeout-ms",
            "250",
            "new",
            "--title",
            "Show",
        ]);
        let config = CliConfig::from(&args);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/p"));
        assert_eq!(
            config.workspace.bridge.response_timeout,
            Duration::from_millis(250)
        );
        assert!(matches!(args.command, Command::New { title: Some(ref t) } if t == "Show"));
    }

    #[tokio::test]
    async fn test_new_then_inspect_and_list() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = config(dir.path());

        let id = run(&config, Command::New { title: Some("Show".into()) })
            .await
            .expect("new");
        let summary = run(&config, Command::Inspect { id: id.clone() })
            .await
            .expect("inspect");
        assert!(summary.starts_with("Show ("));
        assert!(summary.contains("Page 1: 0 textboxes, 0 images"));

        let listed = run(&config, Command::List).await.expect("list");
        assert_eq!(listed, id);
    }

    #[tokio::test]
    async fn test_import_then_text() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let file = dir.path().join("in.json");
        std::fs::write(
            &file,
            r#"{ "title": "Imported", "pages": [
                { "id": "a", "title": "Page 1", "workspace": { "textboxes": [
                    { "id": "t1", "content": { "content": "<p>First&amp;best</p>" } }
                ] } },
                { "id": "b", "title": "Page 2", "workspace": { "textboxes": [
                    { "id": "t2", "content": "<p>Second</p>" }
                ] } }
            ] }"#,
        )
        .expect("write");
        let config = config(&dir.path().join("store"));

        let id = run(&config, Command::Import { file }).await.expect("import");
        let text = run(&config, Command::Text { id }).await.expect("text");
        assert_eq!(text, "First&best Second");
    }

    #[tokio::test]
    async fn test_inspect_missing_fails() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let result = run(&config(dir.path()), Command::Inspect { id: "nope".into() }).await;
        assert!(result.is_err());
    }
}
