#![forbid(unsafe_code)]

//! Turns a stanza file of titled feed URLs into a tree of `.strm` playlists
//! that a media center can scan.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tubestrm::{
    config::{RuntimeOverrides, resolve_runtime_settings},
    http::HttpClient,
    pipeline::Pipeline,
    stanza::load_stanzas,
};

#[derive(Debug, Parser)]
#[command(name = "tubestrm", version, about = "Materialize video feeds as .strm playlists")]
struct Cli {
    /// Root directory the playlists are written below.
    #[arg(long, value_name = "DIR")]
    destination: Option<PathBuf>,

    /// Stanza file with alternating title and URL lines, `-` for stdin.
    #[arg(long, value_name = "FILE", default_value = "stanzas.txt")]
    stanza: String,

    /// Output prefix; required when reading stdin.
    #[arg(long)]
    name: Option<String>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long)]
    debug: bool,

    /// Expand every channel into its playlists and releases.
    #[arg(long)]
    channel_playlists: bool,

    /// Seconds to pause between remote lookups.
    #[arg(long, value_name = "SECS")]
    sleep: Option<u64>,

    #[arg(long, value_name = "LEVELS")]
    max_depth: Option<usize>,

    #[arg(long, value_name = "FILE")]
    env_file: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> RuntimeOverrides {
        RuntimeOverrides {
            destination: self.destination.clone(),
            sleep_secs: self.sleep,
            channel_playlists: self.channel_playlists.then_some(true),
            max_depth: self.max_depth,
            env_path: self.env_file.clone(),
        }
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let settings =
        resolve_runtime_settings(cli.overrides()).context("resolving runtime settings")?;
    let stanzas = load_stanzas(&cli.stanza, cli.name.as_deref())
        .with_context(|| format!("loading stanzas from {}", cli.stanza))?;
    info!(
        prefix = %stanzas.prefix,
        stanzas = stanzas.stanzas.len(),
        destination = %settings.destination.display(),
        "Loaded stanzas"
    );

    let client = HttpClient::new(settings.http_timeout, &settings.user_agent);
    let summary = Pipeline::new(&client, &settings).run(&stanzas);
    info!(?summary, "Finished");
    Ok(())
}
