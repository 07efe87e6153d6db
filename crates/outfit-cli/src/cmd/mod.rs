pub mod analysis;
pub mod auth;
pub mod config;
pub mod look;
pub mod product;
pub mod recommend;
pub mod route;
pub mod upload;
pub mod watch;

use anyhow::Context as _;
use std::io::BufRead;

/// Read one line from stdin with the trailing newline removed. Used for
/// secrets so they stay out of shell history.
pub(crate) fn read_secret(prompt: &str) -> anyhow::Result<String> {
    eprint!("{prompt}: ");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
