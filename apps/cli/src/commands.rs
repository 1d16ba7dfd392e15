//! CLI command definitions, routing, and tracing setup.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use markfold_core::{
    ClassifierClient, ContentSnapshotCache, Orchestrator, PageSource, PathResolver, Request,
    Response, StaticPageSource, build_taxonomy, flatten_folders,
};
use markfold_extractor::{HttpExtractionAgent, MessageBus};
use markfold_shared::{
    AppConfig, ClassifierSettings, FolderStore, MarkfoldError, PageRef, init_config, load_config,
};
use markfold_storage::BookmarkStore;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Markfold: file web pages into your bookmark folders with an AI classifier.
#[derive(Parser)]
#[command(
    name = "markfold",
    version,
    about = "Classify web pages into your bookmark folder hierarchy with an AI model.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Suggest a category for a page and optionally save it.
    Classify {
        /// Page URL to classify.
        url: String,

        /// Bookmark title (defaults to the URL).
        #[arg(short, long)]
        title: Option<String>,

        /// Save under the suggested category without asking.
        #[arg(short, long)]
        yes: bool,
    },

    /// Save a bookmark under a category path, creating missing folders.
    Save {
        #[arg(long)]
        title: String,

        #[arg(long)]
        url: String,

        /// Slash-delimited category path, e.g. "Tech/Backend".
        #[arg(long)]
        category: String,
    },

    /// Print the category taxonomy as JSON.
    Tree,

    /// List category folders with their paths.
    Folders,

    /// Serve JSON-lines requests on stdin, one response line per request.
    Dispatch {
        /// URL of the page `getAiClassification` should classify.
        #[arg(long)]
        url: Option<String>,

        /// Title of that page.
        #[arg(long)]
        title: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "markfold=info",
        1 => "markfold=debug",
        _ => "markfold=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so `dispatch` keeps stdout for responses.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Classify { url, title, yes } => cmd_classify(&url, title.as_deref(), yes).await,
        Command::Save {
            title,
            url,
            category,
        } => cmd_save(&title, &url, &category).await,
        Command::Tree => cmd_tree().await,
        Command::Folders => cmd_folders().await,
        Command::Dispatch { url, title } => cmd_dispatch(url, title).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Page source for `dispatch` when no page was given on the command line.
struct NoActivePage;

#[async_trait]
impl PageSource for NoActivePage {
    async fn active_page(&self) -> markfold_shared::Result<PageRef> {
        Err(MarkfoldError::validation(
            "No active page. Pass --url to dispatch.",
        ))
    }
}

async fn open_store(config: &AppConfig, readonly: bool) -> Result<Arc<BookmarkStore>> {
    let path = config.library.database_file()?;
    let store = if readonly && path.exists() {
        BookmarkStore::open_readonly(&path).await?
    } else {
        BookmarkStore::open(&path).await?
    };
    Ok(Arc::new(store))
}

fn page_ref(url: &str, title: Option<&str>) -> Result<PageRef> {
    let parsed = Url::parse(url).map_err(|e| eyre!("invalid URL '{url}': {e}"))?;
    Ok(PageRef {
        id: "cli".to_string(),
        title: title.map(String::from).unwrap_or_else(|| url.to_string()),
        url: parsed.to_string(),
    })
}

fn build_orchestrator(
    config: &AppConfig,
    store: Arc<BookmarkStore>,
    pages: Arc<dyn PageSource>,
) -> Result<Orchestrator> {
    let agent = HttpExtractionAgent::new(Duration::from_secs(config.snapshot.fetch_timeout_secs))?;
    let snapshots =
        ContentSnapshotCache::new(Arc::new(agent), MessageBus::new(), config.snapshot.timeout());
    let classifier =
        ClassifierClient::new(Duration::from_secs(config.classifier.request_timeout_secs))?;
    let resolver = PathResolver::new(
        store.clone(),
        config.library.root_folder(),
        config.library.root_aliases.clone(),
    );

    Ok(Orchestrator::new(
        store,
        pages,
        snapshots,
        classifier,
        ClassifierSettings::from_env(config),
        resolver,
    ))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_classify(url: &str, title: Option<&str>, yes: bool) -> Result<()> {
    let config = load_config()?;
    ClassifierSettings::from_env(&config).validate()?;

    let page = page_ref(url, title)?;
    let store = open_store(&config, false).await?;
    let orchestrator =
        build_orchestrator(&config, store, Arc::new(StaticPageSource(page.clone())))?;

    info!(url = %page.url, "classifying page");
    let progress = CliProgress::new();
    progress.phase("Reading page and asking the classifier...");
    let classification = orchestrator.classify_active_page().await;
    progress.finish();
    let classification = classification?;

    let marker = if classification.is_new_category {
        " (new)"
    } else {
        ""
    };
    println!();
    println!("  Suggested category: {}{marker}", classification.category_path);
    if !classification.used_snapshot {
        println!("  (page content unavailable, classified by title and URL)");
    }
    println!();

    if classification.category_path.is_empty() {
        return Err(eyre!("the classifier suggested the root folder; use `markfold save`"));
    }

    if !yes && !confirm("  Save bookmark here? [y/N] ").await? {
        println!("  Not saved.");
        return Ok(());
    }

    let saved = orchestrator
        .save_bookmark(&page.title, &page.url, &classification.category_path)
        .await?;
    println!("  Saved to {} (id {})", saved.category, saved.bookmark.id);
    if saved.folders_created > 0 {
        println!("  Created {} folder(s)", saved.folders_created);
    }
    Ok(())
}

async fn cmd_save(title: &str, url: &str, category: &str) -> Result<()> {
    let config = load_config()?;
    let page = page_ref(url, Some(title))?;
    let store = open_store(&config, false).await?;
    let orchestrator =
        build_orchestrator(&config, store, Arc::new(StaticPageSource(page.clone())))?;

    let saved = orchestrator
        .save_bookmark(&page.title, &page.url, category)
        .await?;
    println!("Saved to {} (id {})", saved.category, saved.bookmark.id);
    Ok(())
}

async fn cmd_tree() -> Result<()> {
    let config = load_config()?;
    let store = open_store(&config, true).await?;
    let taxonomy = build_taxonomy(&store.get_tree().await?);
    println!("{}", serde_json::to_string_pretty(&taxonomy)?);
    Ok(())
}

async fn cmd_folders() -> Result<()> {
    let config = load_config()?;
    let store = open_store(&config, true).await?;
    for entry in flatten_folders(&store.get_tree().await?) {
        println!("{:<12} {}", entry.id, entry.path);
    }
    Ok(())
}

async fn cmd_dispatch(url: Option<String>, title: Option<String>) -> Result<()> {
    let config = load_config()?;
    let pages: Arc<dyn PageSource> = match url {
        Some(url) => Arc::new(StaticPageSource(page_ref(&url, title.as_deref())?)),
        None => Arc::new(NoActivePage),
    };
    let store = open_store(&config, false).await?;
    let orchestrator = build_orchestrator(&config, store, pages)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut handled = 0usize;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => orchestrator.handle(request).await,
            Err(e) => {
                warn!(error = %e, "unparseable request");
                Response::Error {
                    message: format!("invalid request: {e}"),
                }
            }
        };
        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;
        handled += 1;
    }

    info!(handled, "dispatch finished");
    Ok(())
}

async fn confirm(question: &str) -> Result<bool> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(question.as_bytes()).await?;
    stdout.flush().await?;

    let mut answer = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut answer)
        .await?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Spinner shown while a request is in flight.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
