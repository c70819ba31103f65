use std::{
    cell::RefCell,
    io::{self, BufRead},
    path::{Path, PathBuf},
    rc::Rc,
};

use chopper_surface_core::{
    AppConfig, Bridge, CircularSurface, Point, SurfaceGeometry, Transport, WriterChannel,
};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

fn main() -> chopper_surface_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Stdio => run_stdio(&config),
        Commands::HitTest { x, y } => run_hit_test(&config, x, y),
    }
}

fn load_config(path: Option<&Path>) -> chopper_surface_core::Result<AppConfig> {
    match path {
        Some(path) => {
            tracing::info!(?path, "loading configuration");
            AppConfig::load(path)
        }
        None => Ok(AppConfig::default()),
    }
}

fn run_stdio(config: &AppConfig) -> chopper_surface_core::Result<()> {
    tracing::info!("starting stdio bridge");

    let transport = Transport::connected(WriterChannel::new(io::stdout()));
    let bridge = Rc::new(Bridge::connect(transport, config.bridge.clone()));
    let surface = Rc::new(RefCell::new(CircularSurface::from_config(&config.surface)));
    let binding = bridge.bind_surface(surface.clone());

    for line in io::stdin().lock().lines() {
        route_line(&line?, &bridge, &surface);
    }

    binding.unsubscribe();
    bridge.teardown();
    tracing::info!(parameters = bridge.parameters().len(), "host closed the stream");
    Ok(())
}

/// Sends pointer lines to the surface and everything else to the bridge.
fn route_line(line: &str, bridge: &Bridge, surface: &RefCell<CircularSurface>) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    let value = match serde_json::from_str::<Value>(line) {
        Ok(value) if value.get("kind").and_then(Value::as_str) == Some(POINTER_KIND) => value,
        _ => return bridge.receive(line),
    };

    let input = match serde_json::from_value::<PointerInput>(value) {
        Ok(input) => input,
        Err(err) => {
            tracing::warn!(%err, "dropping malformed pointer line");
            return;
        }
    };

    let mut surface = surface.borrow_mut();
    match input {
        PointerInput::Down { x, y } => surface.pointer_down(Point::new(x, y), bridge),
        PointerInput::Move { x, y } => surface.pointer_move(Point::new(x, y), bridge),
        PointerInput::Up { x, y } => surface.pointer_up(Point::new(x, y), bridge),
        PointerInput::Leave => surface.pointer_leave(bridge),
    };
}

fn run_hit_test(config: &AppConfig, x: f64, y: f64) -> chopper_surface_core::Result<()> {
    let geometry = SurfaceGeometry::from_config(&config.surface);
    let region = geometry.hit_test(Point::new(x, y));
    tracing::debug!(x, y, ?region, "hit test");
    println!("{}", serde_json::to_string(&region)?);
    Ok(())
}

fn init_tracing() {
    // Stdout carries the protocol, so diagnostics go to stderr.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .try_init();
}

const POINTER_KIND: &str = "pointer";

/// Pointer input fed to the driver alongside host traffic, as
/// `{"kind":"pointer","phase":...}` lines. Only `leave` may omit coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
enum PointerInput {
    Down { x: f64, y: f64 },
    Move { x: f64, y: f64 },
    Up { x: f64, y: f64 },
    Leave,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Chopper Surface host bridge driver", long_about = None)]
struct Cli {
    /// JSON configuration file. Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the bridge over stdio: host messages and pointer events arrive
    /// as JSON lines on stdin, invoke envelopes leave on stdout.
    Stdio,
    /// Report which region of the surface a point falls in.
    HitTest {
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
    },
}
