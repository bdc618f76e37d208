//! Atelier CLI
//!
//! The `atelier` command runs one time-boxed outfit selection round.
//!
//! ## Commands
//!
//! - `run`: plan, gather, render try-ons and pick a look; progress events
//!   stream to stdout as NDJSON, the final selection is printed last
//! - `plan`: show the palette and catalog queries a theme would produce

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn, Level};

use atelier_core::{
    infer_palette, plan_queries, LocalCloset, LocalEvaluator, RoundConfig, RoundController,
    RoundEvent, RoundOutcome, RoundRequest, SearchQuery, ToolBox,
};
use atelier_remote::{
    HttpRenderService, ProductSearchCatalog, ProductSearchConfig, RenderServiceConfig,
};

#[derive(Parser)]
#[command(name = "atelier")]
#[command(author = "Atelier Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Time-boxed outfit selection rounds", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one round and print the final selection
    Run(RunArgs),

    /// Show the palette and queries planned for a theme
    Plan {
        /// Event theme, e.g. "summer rooftop party"
        #[arg(short, long, env = "ATELIER_THEME")]
        theme: String,

        /// Result limit per catalog search
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Event theme, e.g. "summer rooftop party"
    #[arg(short, long, env = "ATELIER_THEME")]
    theme: String,

    /// Image of the player the outfits are rendered onto
    #[arg(long, env = "ATELIER_BASE_IMAGE", default_value = "/static/model.png")]
    base_image: String,

    /// Local closet with tops/, bottoms/ and dresses/ subdirectories
    #[arg(long, env = "ATELIER_CLOSET_DIR", default_value = "static")]
    closet: PathBuf,

    /// Round length in seconds
    #[arg(long, env = "ATELIER_ROUND_SECS", default_value = "120")]
    round_secs: u64,

    /// Render jobs allowed in flight at once
    #[arg(long, env = "ATELIER_RENDER_CONCURRENCY", default_value = "6")]
    render_concurrency: usize,

    /// Variation discriminators rendered for every outfit
    #[arg(
        long,
        env = "ATELIER_VARIATIONS",
        value_delimiter = ',',
        default_value = "11,77"
    )]
    variations: Vec<u32>,

    /// API key of the try-on render service
    #[arg(long, env = "FASHN_API_KEY", hide_env_values = true)]
    render_api_key: Option<String>,

    /// Base URL of the try-on render service
    #[arg(long, env = "ATELIER_RENDER_URL")]
    render_url: Option<String>,

    /// API key of the product search catalog
    #[arg(long, env = "CATALOG_API_KEY", hide_env_values = true)]
    catalog_api_key: Option<String>,

    /// Host of the product search catalog
    #[arg(long, env = "CATALOG_API_HOST")]
    catalog_host: Option<String>,

    /// Do not stream round events to stdout
    #[arg(long)]
    quiet: bool,
}

impl RunArgs {
    fn round_config(&self) -> Result<RoundConfig> {
        let config = RoundConfig {
            render_concurrency: self.render_concurrency,
            variations: self.variations.clone(),
            ..RoundConfig::with_duration(Duration::from_secs(self.round_secs))
        };
        config.validate().context("Invalid round configuration")?;
        Ok(config)
    }

    fn toolbox(&self) -> Result<ToolBox> {
        let closet = Arc::new(LocalCloset::new(&self.closet));
        let mut tools = ToolBox::new();

        match (&self.catalog_api_key, &self.catalog_host) {
            (Some(key), Some(host)) => {
                let catalog = ProductSearchCatalog::new(ProductSearchConfig::new(key, host))
                    .context("Failed to build product search client")?;
                tools = tools.with_catalog(Arc::new(catalog));
            }
            (Some(_), None) | (None, Some(_)) => {
                warn!("product search needs both CATALOG_API_KEY and CATALOG_API_HOST");
            }
            (None, None) => {}
        }
        tools = tools
            .with_catalog(closet.clone())
            .with_wardrobe(closet)
            .with_evaluator(Arc::new(LocalEvaluator::new()));

        match &self.render_api_key {
            Some(key) => {
                let mut config = RenderServiceConfig::new(key);
                if let Some(url) = &self.render_url {
                    config = config.with_base_url(url);
                }
                let render = HttpRenderService::new(config)
                    .context("Failed to build render service client")?;
                tools = tools.with_render_service(Arc::new(render));
            }
            None => warn!("FASHN_API_KEY not set; try-on renders will be unavailable"),
        }

        Ok(tools)
    }
}

#[derive(Debug, Serialize)]
struct PlanView {
    theme: String,
    palette: Vec<String>,
    queries: Vec<SearchQuery>,
}

fn plan_view(theme: &str, limit: usize) -> PlanView {
    let palette = infer_palette(theme);
    let queries = plan_queries(&palette, limit);
    PlanView {
        theme: theme.to_string(),
        palette,
        queries,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    atelier_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run(args) => cmd_run(args).await,
        Commands::Plan { theme, limit } => cmd_plan(&theme, limit),
    }
}

async fn cmd_run(args: RunArgs) -> Result<()> {
    let config = args.round_config()?;
    let tools = args.toolbox()?;
    let request = RoundRequest::new(&args.theme, &args.base_image);

    let outcome = if args.quiet {
        RoundController::new(request, config, tools).run().await?
    } else {
        run_streaming(RoundController::new(request, config, tools)).await?
    };

    info!(
        run_id = %outcome.run_id,
        duration_ms = outcome.duration_ms,
        fallback = outcome.selection.is_fallback(),
        "round finished"
    );
    println!("{}", serde_json::to_string_pretty(&outcome.selection)?);
    Ok(())
}

/// Run the round while a printer task writes each event as one JSON line.
async fn run_streaming(controller: RoundController) -> Result<RoundOutcome> {
    let (tx, mut rx) = mpsc::unbounded_channel::<RoundEvent>();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(error = %e, "failed to encode round event"),
            }
        }
    });

    // The sender lives in the controller; the printer drains once it is dropped.
    let outcome = controller.with_event_sink(tx).run().await;
    printer.await.context("event printer task failed")?;
    Ok(outcome?)
}

fn cmd_plan(theme: &str, limit: usize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&plan_view(theme, limit))?);
    Ok(())
}
