//! Offline sweep measuring how many generations a random board needs to
//! settle, across board sizes and seed densities. Emits one CSV row per
//! size/density combination on stdout.
//!
//! Unlike the runtime watchdog, stability here is exact: the alive mask is
//! compared against the two previous generations, so period-1 and period-2
//! patterns are detected with no false positives.

use anyhow::Result;
use clap::Parser;
use emberlife_core::{FadeGrid, LifeError};
use rand::{SeedableRng, rngs::SmallRng};
use rayon::prelude::*;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "emberlife-stats",
    version,
    about = "Sweep generations-until-stable statistics over board sizes and densities"
)]
struct Cli {
    /// Square board sizes to sweep.
    #[arg(long, value_delimiter = ',', default_values_t = [8u32, 16, 32, 64])]
    sizes: Vec<u32>,

    /// Density sweep lower bound, in percent.
    #[arg(long, default_value_t = 20)]
    min_density: u32,

    /// Density sweep upper bound, in percent.
    #[arg(long, default_value_t = 50)]
    max_density: u32,

    /// Samples per size/density combination.
    #[arg(long, default_value_t = 1_000)]
    samples: u32,

    /// Generation cap; samples that hit it are reported as outliers.
    #[arg(long, default_value_t = 10_000)]
    max_generations: u32,

    /// Base RNG seed; per-sample seeds are derived from it.
    #[arg(long, default_value_t = 0x5EED)]
    seed: u64,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    info!(
        sizes = ?cli.sizes,
        samples = cli.samples,
        "starting stability sweep"
    );

    println!("board_size,density_pct,p10,median,mean,outliers,samples");
    for &size in &cli.sizes {
        for density_pct in cli.min_density..=cli.max_density {
            let density = density_pct as f32 / 100.0;
            let generations = (0..cli.samples)
                .into_par_iter()
                .map(|sample| {
                    let seed = cli.seed
                        ^ (u64::from(size) << 40)
                        ^ (u64::from(density_pct) << 32)
                        ^ u64::from(sample);
                    let mut rng = SmallRng::seed_from_u64(seed);
                    run_until_stable(size, density, cli.max_generations, &mut rng)
                })
                .collect::<Result<Vec<u32>, LifeError>>()?;

            let mut settled: Vec<u32> = generations
                .iter()
                .copied()
                .filter(|&generation| generation < cli.max_generations)
                .collect();
            let outliers = generations.len() - settled.len();
            if settled.is_empty() {
                let cap = cli.max_generations;
                println!(
                    "{size},{density_pct},{cap},{cap},{:.1},{outliers},{}",
                    f64::from(cap),
                    cli.samples
                );
                continue;
            }
            settled.sort_unstable();
            let p10 = percentile(&settled, 10);
            let median = percentile(&settled, 50);
            let mean = settled.iter().map(|&g| f64::from(g)).sum::<f64>() / settled.len() as f64;
            println!(
                "{size},{density_pct},{p10},{median},{mean:.1},{outliers},{}",
                cli.samples
            );
        }
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

/// Evolve a randomized `size`x`size` board until its alive mask matches one
/// of the two previous generations, or `cap` generations elapse.
///
/// Runs with two fade levels so the generation buffer is the alive mask
/// itself.
fn run_until_stable(
    size: u32,
    density: f32,
    cap: u32,
    rng: &mut SmallRng,
) -> Result<u32, LifeError> {
    let mut grid = FadeGrid::new(size, size, 2)?;
    grid.randomize(density, rng);
    let mut prev1 = grid.cells().to_vec();
    let mut prev2 = prev1.clone();
    for generation in 1..=cap {
        grid.compute_next_generation(1);
        grid.swap_buffers();
        if grid.cells() == prev1.as_slice() || grid.cells() == prev2.as_slice() {
            return Ok(generation);
        }
        std::mem::swap(&mut prev1, &mut prev2);
        prev1.copy_from_slice(grid.cells());
    }
    Ok(cap)
}

fn percentile(sorted: &[u32], pct: usize) -> u32 {
    let index = (pct * sorted.len() / 100).min(sorted.len() - 1);
    sorted[index]
}
