//! handsign - static hand-sign recognizer driven by landmark frames
//!
//! Reads newline-delimited s-expression messages from a file or stdin and
//! writes one response per message to stdout.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;

use handsign::ipc::{self, AppState, ServeConfig};
use handsign::recognition::{
    Catalogue, FeatureConfig, RecognitionSession, SessionConfig, SingleHandPolicy,
};

#[derive(Parser, Debug)]
#[command(name = "handsign", about = "Static hand-sign recognizer")]
struct Cli {
    /// Minimum seconds between two accepted words
    #[arg(long, default_value_t = 1.5)]
    cooldown: f64,

    /// Margin a fingertip must clear to count as extended (normalized units)
    #[arg(long, default_value_t = 0.02)]
    epsilon: f32,

    /// Minimum wrist-to-knuckle offset for an up/down/left/right palm
    #[arg(long, default_value_t = 0.1)]
    palm_threshold: f32,

    /// Frames in the stability vote (1 disables it)
    #[arg(long, default_value_t = 1)]
    stability_window: usize,

    /// Votes one word needs within the window
    #[arg(long, default_value_t = 1)]
    stability_votes: usize,

    /// Hand used for one-hand signs when two are visible: first, left, or right
    #[arg(long, default_value = "first", value_parser = parse_policy)]
    single_hand: SingleHandPolicy,

    /// Sign table to load instead of the built-in vocabulary
    #[arg(long)]
    catalogue: Option<PathBuf>,

    /// Message file to read (default: stdin)
    #[arg(long)]
    input: Option<PathBuf>,

    /// Write the conversation transcript here at end of input
    #[arg(long)]
    export: Option<PathBuf>,

    /// Log all protocol messages to stderr
    #[arg(long)]
    ipc_trace: bool,

    /// Show version and exit
    #[arg(long)]
    version: bool,
}

fn parse_policy(s: &str) -> Result<SingleHandPolicy, String> {
    SingleHandPolicy::parse(s)
        .ok_or_else(|| format!("unknown policy {s:?}: use first, left, or right"))
}

impl Cli {
    fn session_config(&self) -> anyhow::Result<SessionConfig> {
        if !self.cooldown.is_finite() || self.cooldown < 0.0 {
            bail!("--cooldown must be a non-negative number of seconds");
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            bail!("--epsilon must be non-negative");
        }
        if !self.palm_threshold.is_finite() || self.palm_threshold < 0.0 {
            bail!("--palm-threshold must be non-negative");
        }
        if self.stability_window == 0 || self.stability_votes == 0 {
            bail!("--stability-window and --stability-votes must be at least 1");
        }
        if self.stability_votes > self.stability_window {
            bail!(
                "--stability-votes ({}) cannot exceed --stability-window ({})",
                self.stability_votes,
                self.stability_window
            );
        }
        Ok(SessionConfig {
            cooldown_s: self.cooldown,
            stability_window: self.stability_window,
            stability_votes: self.stability_votes,
            single_hand: self.single_hand,
            features: FeatureConfig {
                extension_epsilon: self.epsilon,
                palm_threshold: self.palm_threshold,
                ..FeatureConfig::default()
            },
            ..SessionConfig::default()
        })
    }
}

fn load_catalogue(path: Option<&PathBuf>) -> anyhow::Result<Catalogue> {
    let Some(path) = path else {
        return Ok(Catalogue::builtin());
    };
    let src = fs::read_to_string(path)
        .with_context(|| format!("reading catalogue {}", path.display()))?;
    let rows = ipc::parse_catalogue_table(&src)
        .with_context(|| format!("parsing catalogue {}", path.display()))?;
    let catalogue = Catalogue::from_rows(rows)
        .with_context(|| format!("building catalogue {}", path.display()))?;
    Ok(catalogue)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("handsign {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Logs go to stderr; stdout carries protocol responses.
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "handsign=info".into()),
        )
        .init();

    info!("handsign v{} starting", env!("CARGO_PKG_VERSION"));

    let config = cli.session_config()?;
    let catalogue = load_catalogue(cli.catalogue.as_ref())?;
    info!("{} signs, cooldown {:.2}s", catalogue.len(), config.cooldown_s);

    let mut state = AppState::new(RecognitionSession::new(Arc::new(catalogue), config));

    let reader: Box<dyn BufRead> = match &cli.input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening input {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let serve_config = ServeConfig {
        trace: cli.ipc_trace,
        ..ServeConfig::default()
    };
    let handled = ipc::serve(reader, io::stdout().lock(), &mut state, &serve_config)
        .context("serving messages")?;

    info!(
        "end of input: {} messages, {} words accepted",
        handled,
        state.session.accepted_count()
    );

    if let Some(path) = &cli.export {
        fs::write(path, state.export_transcript())
            .with_context(|| format!("writing transcript {}", path.display()))?;
        info!("transcript written to {}", path.display());
    }

    Ok(())
}
