mod cmd;
mod context;
mod output;

use clap::{Parser, Subcommand};
use cmd::{
    analysis::AnalysisSubcommand, auth::AuthSubcommand, config::ConfigSubcommand,
    look::LookSubcommand, product::ProductSubcommand, recommend::RecommendSubcommand,
};
use outfit_client::Outfit;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "outfit",
    about = "Outfit analysis client: sign in, upload photos, browse matches and saved looks",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (default: <config dir>/outfit/config.yaml)
    #[arg(long, global = true, env = "OUTFIT_CONFIG")]
    config: Option<PathBuf>,

    /// Backend API base URL
    #[arg(long, global = true, env = "OUTFIT_API_URL")]
    api_url: Option<String>,

    /// Real-time socket URL
    #[arg(long, global = true, env = "OUTFIT_WS_URL")]
    ws_url: Option<String>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in, sign out and manage the account
    Auth {
        #[command(subcommand)]
        subcommand: AuthSubcommand,
    },

    /// Upload an outfit photo
    Upload {
        /// Image file to upload
        file: PathBuf,

        /// Override the detected content type
        #[arg(long)]
        mime_type: Option<String>,

        /// Start an analysis for the uploaded image
        #[arg(long)]
        analyze: bool,
    },

    /// Manage outfit analyses
    Analysis {
        #[command(subcommand)]
        subcommand: AnalysisSubcommand,
    },

    /// Browse products and the cart
    Product {
        #[command(subcommand)]
        subcommand: ProductSubcommand,
    },

    /// Product recommendations
    Recommend {
        #[command(subcommand)]
        subcommand: RecommendSubcommand,
    },

    /// Manage saved looks
    Look {
        #[command(subcommand)]
        subcommand: LookSubcommand,
    },

    /// Stream live updates from the real-time channel
    Watch {
        /// Stop after this many messages
        #[arg(long)]
        count: Option<usize>,
    },

    /// Check whether a route may be shown to the current session
    Route {
        /// Route path, e.g. /dashboard
        path: String,

        /// The route demands completed onboarding
        #[arg(long)]
        onboarded: bool,
    },

    /// Show or validate configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Watch { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let overrides = context::Overrides {
        api_url: cli.api_url,
        ws_url: cli.ws_url,
    };
    let result = context::Context::resolve(cli.config.as_deref(), overrides)
        .and_then(|ctx| run(&ctx, cli.command, cli.json));

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(ctx: &context::Context, command: Commands, json: bool) -> anyhow::Result<()> {
    let outfit = ctx.outfit()?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(dispatch(ctx, &outfit, command, json))
}

async fn dispatch(
    ctx: &context::Context,
    outfit: &Outfit,
    command: Commands,
    json: bool,
) -> anyhow::Result<()> {
    match command {
        Commands::Auth { subcommand } => cmd::auth::run(outfit, subcommand, json).await,
        Commands::Upload {
            file,
            mime_type,
            analyze,
        } => cmd::upload::run(outfit, &file, mime_type, analyze, json).await,
        Commands::Analysis { subcommand } => cmd::analysis::run(outfit, subcommand, json).await,
        Commands::Product { subcommand } => cmd::product::run(outfit, subcommand, json).await,
        Commands::Recommend { subcommand } => cmd::recommend::run(outfit, subcommand, json).await,
        Commands::Look { subcommand } => cmd::look::run(outfit, subcommand, json).await,
        Commands::Watch { count } => cmd::watch::run(outfit, count, json).await,
        Commands::Route { path, onboarded } => {
            cmd::route::run(outfit, &path, onboarded, json).await
        }
        Commands::Config { subcommand } => cmd::config::run(ctx, subcommand, json),
    }
}
