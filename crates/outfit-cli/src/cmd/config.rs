use crate::context::Context;
use crate::output::print_json;
use anyhow::Context as _;
use clap::Subcommand;
use outfit_core::config::{Config, WarnLevel};
use outfit_core::paths;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective configuration (defaults, file, env and flags merged)
    Show,

    /// Validate the config for common mistakes
    Validate,

    /// Print the config file, state directory and token file locations
    Path,

    /// Write a config file with the built-in defaults
    Init {
        /// Destination (default: <config dir>/outfit/config.yaml)
        #[arg(long)]
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn run(ctx: &Context, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(ctx, json),
        ConfigSubcommand::Validate => validate(ctx, json),
        ConfigSubcommand::Path => path(ctx, json),
        ConfigSubcommand::Init { path, force } => init(path, force),
    }
}

// ---------------------------------------------------------------------------
// show / validate
// ---------------------------------------------------------------------------

fn show(ctx: &Context, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&ctx.config);
    }
    let yaml = serde_yaml::to_string(&ctx.config).context("failed to render config")?;
    print!("{yaml}");
    Ok(())
}

fn validate(ctx: &Context, json: bool) -> anyhow::Result<()> {
    let warnings = ctx.config.validate();

    if json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// path / init
// ---------------------------------------------------------------------------

fn path(ctx: &Context, json: bool) -> anyhow::Result<()> {
    let state_dir = ctx.state_dir()?;
    let token = paths::token_path(&state_dir);
    let config_file = ctx.source.clone().or_else(paths::default_config_path);

    if json {
        print_json(&serde_json::json!({
            "config": config_file,
            "config_loaded": ctx.source.is_some(),
            "state_dir": state_dir,
            "token": token,
            "signed_in": token.exists(),
        }))?;
    } else {
        match &config_file {
            Some(p) if ctx.source.is_some() => println!("config:    {}", p.display()),
            Some(p) => println!("config:    {} (not present, using defaults)", p.display()),
            None => println!("config:    (no config directory on this platform)"),
        }
        println!("state dir: {}", state_dir.display());
        println!("token:     {}", token.display());
    }
    Ok(())
}

fn init(path: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let path = match path {
        Some(p) => p,
        None => paths::default_config_path().context("no config directory on this platform")?,
    };
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    Config::default()
        .save(&path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}
