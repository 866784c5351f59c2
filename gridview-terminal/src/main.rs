/// gridview terminal renderer
///
/// Loads a JSON point dataset and renders it as a rotating grid (or point
/// cloud) in the terminal. Press Q or Esc to quit.
use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use gridview_core::{GeometryMode, Primitive, RotationAxes, SessionConfig};
use gridview_terminal::TerminalApp;

#[derive(Parser)]
#[command(name = "gridview-terminal", about = "Render a JSON point dataset in the terminal")]
struct Cli {
    /// Point dataset: a JSON array of {x, y, z} objects
    data: Option<PathBuf>,

    /// JSON session config; flags given here override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Draw the points themselves or a grid over their bounding box
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    #[arg(long, value_enum)]
    primitive: Option<PrimitiveArg>,

    /// Rotate about Y only, or about X then Y
    #[arg(long, value_enum)]
    axes: Option<AxesArg>,

    /// Quit after this many frames
    #[arg(long)]
    frames: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Direct,
    Grid,
}

#[derive(Clone, Copy, ValueEnum)]
enum PrimitiveArg {
    Lines,
    Points,
}

#[derive(Clone, Copy, ValueEnum)]
enum AxesArg {
    Y,
    Xy,
}

impl Cli {
    fn session_config(&self) -> anyhow::Result<SessionConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                SessionConfig::from_json_str(&text)
                    .with_context(|| format!("loading config {}", path.display()))?
            }
            None => SessionConfig::default(),
        };

        if let Some(data) = &self.data {
            config.data_path = data.display().to_string();
        }
        if let Some(mode) = self.mode {
            config.geometry = match mode {
                ModeArg::Direct => GeometryMode::Direct,
                ModeArg::Grid => GeometryMode::Grid,
            };
        }
        if let Some(primitive) = self.primitive {
            config.primitive = match primitive {
                PrimitiveArg::Lines => Primitive::Lines,
                PrimitiveArg::Points => Primitive::Points,
            };
        }
        if let Some(axes) = self.axes {
            config.rotation_axes = match axes {
                AxesArg::Y => RotationAxes::Y,
                AxesArg::Xy => RotationAxes::Xy,
            };
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so they do not tear the rendered frame; redirect to keep them
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    let config = cli.session_config()?;
    tracing::info!(data = %config.data_path, "starting terminal renderer");

    let mut app = TerminalApp::new(config).with_frame_limit(cli.frames);
    if let Err(e) = app.run() {
        tracing::error!(error = %e, "render setup failed");
        return Err(e).context("gridview-terminal failed");
    }

    Ok(())
}
