use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use emberlife_core::{LifeConfig, Simulator};
use tracing::info;

mod terminal;

use terminal::TerminalSink;

#[derive(Parser, Debug)]
#[command(
    name = "emberlife",
    version,
    about = "Toroidal Game of Life with fading trails, rendered in the terminal"
)]
struct Cli {
    /// Grid width in cells; defaults to the terminal width.
    #[arg(long)]
    width: Option<u32>,

    /// Grid height in cells; defaults to twice the usable terminal height.
    #[arg(long)]
    height: Option<u32>,

    /// Fraction of cells seeded alive at startup and on reseed.
    #[arg(long, default_value_t = 0.33)]
    density: f32,

    /// Number of fade levels for the dying-cell trail.
    #[arg(long, default_value_t = 8)]
    fade_levels: u8,

    /// Fade levels dropped per generation by dying cells.
    #[arg(long, default_value_t = 1)]
    decay_rate: u8,

    /// RNG seed for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,

    /// Target generations per second.
    #[arg(long, default_value_t = 30.0)]
    fps: f32,

    /// Stop after this many generations instead of running forever.
    #[arg(long)]
    generations: Option<u64>,

    /// Disable the stability watchdog and its automatic reseeds.
    #[arg(long)]
    no_auto_reset: bool,
}

impl Cli {
    fn to_config(&self) -> Result<LifeConfig> {
        let (cols, rows) = crossterm::terminal::size().context("querying terminal size")?;
        // One row is reserved for the status bar; half blocks pack two grid
        // rows into each remaining terminal row.
        let config = LifeConfig {
            width: self.width.unwrap_or_else(|| u32::from(cols.max(1))),
            height: self
                .height
                .unwrap_or_else(|| u32::from(rows.saturating_sub(1).max(1)) * 2),
            fade_levels: self.fade_levels,
            decay_rate: self.decay_rate,
            auto_reset_on_stable: !self.no_auto_reset,
            initial_density: self.density,
            rng_seed: self.seed,
            ..LifeConfig::default()
        };
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.to_config()?;
    info!(
        width = config.width,
        height = config.height,
        density = config.initial_density,
        "starting EmberLife"
    );

    let result = run(&cli, config);
    terminal::restore();
    result
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: &Cli, config: LifeConfig) -> Result<()> {
    let sink = TerminalSink::new().context("initialising terminal renderer")?;
    let mut sim = Simulator::new(config, Box::new(sink))?;

    let frame_budget = Duration::from_secs_f32(1.0 / cli.fps.max(1.0));
    let mut remaining = cli.generations;
    let mut failure = None;
    sim.run(|events| {
        if events.reseeded {
            info!(population = events.population, "reseeding after sustained stability");
        }
        if let Some(left) = remaining.as_mut() {
            if *left == 0 {
                return false;
            }
            *left -= 1;
        }
        match terminal::wait_for_quit(frame_budget) {
            Ok(quit) => !quit,
            Err(err) => {
                failure = Some(err);
                false
            }
        }
    });

    match failure {
        Some(err) => Err(err).context("terminal event loop failed"),
        None => Ok(()),
    }
}
