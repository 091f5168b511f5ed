//! Core types for EmberLife: a toroidal Game of Life with fade trails and a
//! self-stabilization watchdog.

use rand::{Rng, SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when constructing simulation state.
#[derive(Debug, Error)]
pub enum LifeError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// An RGB color handed to the frame sink alongside each fade level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Self = Self { r: 0, g: 0, b: 0 };

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Mapping from fade level to display color, one entry per level.
///
/// Entry 0 is the dead color, the last entry the alive color. Everything in
/// between is the trail left behind by recently-dead cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    colors: Vec<Rgb>,
}

impl Palette {
    /// Build the default ember trail: dim blues rising into greens, with the
    /// alive level rendered bright red.
    #[must_use]
    pub fn ember(levels: u8) -> Self {
        let mut colors = vec![Rgb::BLACK; levels as usize];
        let Some(max) = (levels as usize).checked_sub(1) else {
            return Self { colors };
        };
        if max == 0 {
            return Self { colors };
        }
        colors[max] = Rgb::new(0xFF, 0x00, 0x00);
        let interior = max - 1;
        let blues = interior.div_ceil(2);
        for level in 1..=interior {
            colors[level] = if level <= blues {
                Rgb::new(0, 0, (0x0F * level / blues) as u8)
            } else {
                Rgb::new(0, (0x0F * (level - blues) / (interior - blues)) as u8, 0)
            };
        }
        Self { colors }
    }

    /// Build a palette from explicit per-level colors.
    #[must_use]
    pub fn from_colors(colors: Vec<Rgb>) -> Self {
        Self { colors }
    }

    /// Number of levels this palette covers.
    #[must_use]
    pub fn levels(&self) -> usize {
        self.colors.len()
    }

    /// Color for `level`, falling back to black for out-of-range levels.
    #[must_use]
    pub fn color(&self, level: u8) -> Rgb {
        self.colors.get(level as usize).copied().unwrap_or(Rgb::BLACK)
    }
}

/// Static configuration for one simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifeConfig {
    /// Grid width in cells.
    pub width: u32,
    /// Grid height in cells.
    pub height: u32,
    /// Number of fade levels; the top level is "alive", 0 is fully dead.
    pub fade_levels: u8,
    /// How many levels a dying cell drops per generation.
    pub decay_rate: u8,
    /// Whether the stability watchdog runs and may reseed the grid.
    pub auto_reset_on_stable: bool,
    /// Consecutive stable generations required before a reseed.
    pub stable_generations: u32,
    /// Length of the population history window.
    pub history_size: usize,
    /// Fraction of cells seeded alive at startup and on reseed.
    pub initial_density: f32,
    /// Pause inserted after a reseed before the loop resumes.
    pub reseed_pause: Duration,
    /// Optional RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,
}

impl Default for LifeConfig {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            fade_levels: 8,
            decay_rate: 1,
            auto_reset_on_stable: true,
            stable_generations: 10,
            history_size: 3,
            initial_density: 0.33,
            reseed_pause: Duration::from_millis(500),
            rng_seed: None,
        }
    }
}

impl LifeConfig {
    /// Validates the configuration, failing fast on out-of-range values.
    pub fn validate(&self) -> Result<(), LifeError> {
        if self.width == 0 || self.height == 0 {
            return Err(LifeError::InvalidConfig(
                "grid dimensions must be non-zero",
            ));
        }
        if self.fade_levels < 2 {
            return Err(LifeError::InvalidConfig("fade_levels must be at least 2"));
        }
        if self.decay_rate == 0 {
            return Err(LifeError::InvalidConfig("decay_rate must be at least 1"));
        }
        if self.stable_generations == 0 {
            return Err(LifeError::InvalidConfig(
                "stable_generations must be positive",
            ));
        }
        if self.history_size == 0 {
            return Err(LifeError::InvalidConfig("history_size must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.initial_density) {
            return Err(LifeError::InvalidConfig(
                "initial_density must be within [0, 1]",
            ));
        }
        Ok(())
    }

    /// Returns the configured RNG, generating a seed from entropy if absent.
    fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}

/// Double-buffered toroidal grid of fade levels.
///
/// Two owned generation buffers plus an `active` indicator model the display's
/// front/back buffer pair; the rule pass reads one and writes the other, so no
/// buffer is ever read and written in the same pass. A third buffer tracks the
/// decay state of dying cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FadeGrid {
    width: u32,
    height: u32,
    max_level: u8,
    buffers: [Vec<u8>; 2],
    active: usize,
    fade: Vec<u8>,
}

impl FadeGrid {
    /// Construct a grid with all cells dead.
    pub fn new(width: u32, height: u32, fade_levels: u8) -> Result<Self, LifeError> {
        if width == 0 || height == 0 {
            return Err(LifeError::InvalidConfig(
                "grid dimensions must be non-zero",
            ));
        }
        if fade_levels < 2 {
            return Err(LifeError::InvalidConfig("fade_levels must be at least 2"));
        }
        let cells = (width as usize) * (height as usize);
        Ok(Self {
            width,
            height,
            max_level: fade_levels - 1,
            buffers: [vec![0; cells], vec![0; cells]],
            active: 0,
            fade: vec![0; cells],
        })
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// The fade level that marks a cell as alive.
    #[must_use]
    pub const fn max_level(&self) -> u8 {
        self.max_level
    }

    /// The currently presented generation buffer.
    #[must_use]
    pub fn cells(&self) -> &[u8] {
        &self.buffers[self.active]
    }

    /// Fade level at `(x, y)` in the active buffer, if in bounds.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize) * (self.width as usize) + x as usize;
        self.buffers[self.active].get(idx).copied()
    }

    /// Write `level` at `(x, y)` into the active buffer and the fade tracker.
    /// Out-of-bounds writes are ignored.
    pub fn set(&mut self, x: u32, y: u32, level: u8) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = (y as usize) * (self.width as usize) + x as usize;
        let level = level.min(self.max_level);
        self.buffers[self.active][idx] = level;
        self.fade[idx] = level;
    }

    /// Number of fully-alive cells in the active buffer.
    #[must_use]
    pub fn population(&self) -> u32 {
        let max = self.max_level;
        self.cells().iter().filter(|&&cell| cell == max).count() as u32
    }

    /// Independently set every cell alive with probability `fraction`.
    ///
    /// Overwrites the active buffer and the fade tracker; the back buffer is
    /// left untouched and will be fully rewritten by the next rule pass.
    pub fn randomize<R: Rng + ?Sized>(&mut self, fraction: f32, rng: &mut R) {
        let max = self.max_level;
        let front = &mut self.buffers[self.active];
        for (cell, fade) in front.iter_mut().zip(self.fade.iter_mut()) {
            if rng.random::<f32>() < fraction {
                *cell = max;
                *fade = max;
            } else {
                *cell = 0;
                *fade = 0;
            }
        }
    }

    /// One rule pass: read the active buffer, write the inactive one.
    ///
    /// A cell is alive next generation iff it has exactly 3 fully-alive
    /// neighbors, or 2 and is itself fully alive. Dying cells do not count as
    /// neighbors. Everything not reborn decays by `decay_rate`, clamped at 0,
    /// which leaves the visual trail. Does not swap the buffer roles.
    pub fn compute_next_generation(&mut self, decay_rate: u8) {
        let w = self.width as usize;
        let h = self.height as usize;
        let max = self.max_level;
        let active = self.active;
        let (head, tail) = self.buffers.split_at_mut(1);
        let (front, back) = if active == 0 {
            (head[0].as_slice(), tail[0].as_mut_slice())
        } else {
            (tail[0].as_slice(), head[0].as_mut_slice())
        };
        let fade = &mut self.fade;

        for y in 0..h {
            let row = y * w;
            let up = (if y == 0 { h - 1 } else { y - 1 }) * w;
            let down = (if y + 1 == h { 0 } else { y + 1 }) * w;
            for x in 0..w {
                let left = if x == 0 { w - 1 } else { x - 1 };
                let right = if x + 1 == w { 0 } else { x + 1 };

                let mut neighbors = 0u8;
                for idx in [
                    up + left,
                    up + x,
                    up + right,
                    row + left,
                    row + right,
                    down + left,
                    down + x,
                    down + right,
                ] {
                    if front[idx] == max {
                        neighbors += 1;
                    }
                }

                let here = row + x;
                let alive = front[here] == max;
                if neighbors == 3 || (neighbors == 2 && alive) {
                    back[here] = max;
                    fade[here] = max;
                } else {
                    fade[here] = fade[here].saturating_sub(decay_rate);
                    back[here] = fade[here];
                }
            }
        }
    }

    /// Swap which buffer is active. A role swap only, no copying.
    pub fn swap_buffers(&mut self) {
        self.active ^= 1;
    }
}

/// Sliding window of recent population counts, most-recent first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationHistory {
    counts: Vec<u32>,
}

impl PopulationHistory {
    /// Create a zero-filled window of `size` entries.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            counts: vec![0; size],
        }
    }

    /// Insert `count` at the front, evicting the oldest entry.
    pub fn push(&mut self, count: u32) {
        if self.counts.is_empty() {
            return;
        }
        let last = self.counts.len() - 1;
        self.counts.copy_within(0..last, 1);
        self.counts[0] = count;
    }

    /// Reset every entry to zero.
    pub fn reset(&mut self) {
        self.counts.fill(0);
    }

    /// The window contents, most-recent first.
    #[must_use]
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }
}

/// Heuristic stability check over a population count window.
///
/// Catches static patterns, period-2 oscillators, and low-amplitude
/// oscillations using counts alone. It can miss genuinely periodic patterns
/// whose population varies widely, and can flag coincidentally similar counts;
/// the consecutive-generation threshold in [`Simulator`] absorbs most of the
/// false positives.
#[must_use]
pub fn is_stable(history: &[u32]) -> bool {
    if history.len() >= 2 && history[0] == history[1] {
        return true;
    }
    if history.len() >= 3 {
        if history[0] == history[2] && history[0] != history[1] {
            return true;
        }
        let distinct: HashSet<u32> = history.iter().copied().collect();
        if distinct.len() <= 3 {
            let min = history.iter().min().copied().unwrap_or(0);
            let max = history.iter().max().copied().unwrap_or(0);
            if max - min <= 2 {
                return true;
            }
        }
    }
    false
}

/// Borrowed view of one presented frame: the front buffer, its dimensions,
/// and the palette mapping fade levels to colors.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    cells: &'a [u8],
    width: u32,
    height: u32,
    palette: &'a Palette,
}

impl<'a> FrameView<'a> {
    #[must_use]
    pub fn new(cells: &'a [u8], width: u32, height: u32, palette: &'a Palette) -> Self {
        debug_assert_eq!(cells.len(), (width as usize) * (height as usize));
        Self {
            cells,
            width,
            height,
            palette,
        }
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub const fn palette(&self) -> &'a Palette {
        self.palette
    }

    #[must_use]
    pub const fn cells(&self) -> &'a [u8] {
        self.cells
    }

    /// Fade level at `(x, y)`, if in bounds.
    #[must_use]
    pub fn level(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize) * (self.width as usize) + x as usize;
        self.cells.get(idx).copied()
    }
}

/// Consumer of presented frames.
///
/// Called once per generation right after the buffer swap. The call may block
/// for as long as the display needs; the simulation has no other suspension
/// point besides the post-reseed pause.
pub trait FrameSink {
    fn present(&mut self, frame: FrameView<'_>);
}

/// Sink that discards every frame. Useful for tests and headless runs.
#[derive(Debug, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn present(&mut self, _frame: FrameView<'_>) {}
}

/// What happened during one generation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenerationEvents {
    /// Generations since the last reseed; 0 right after a reseed.
    pub generation: u64,
    /// Population after this step, when the watchdog is enabled.
    pub population: Option<u32>,
    /// Whether the history window was judged stable this generation.
    pub stable: bool,
    /// Whether this generation triggered a reseed.
    pub reseeded: bool,
}

/// Orchestrates the generation loop: rule pass, buffer swap, frame
/// presentation, and the stability watchdog.
pub struct Simulator {
    config: LifeConfig,
    grid: FadeGrid,
    palette: Palette,
    history: PopulationHistory,
    stable_count: u32,
    generation: u64,
    rng: SmallRng,
    sink: Box<dyn FrameSink>,
}

impl Simulator {
    /// Build a simulator with the default ember palette and seed the grid
    /// from `initial_density`.
    pub fn new(config: LifeConfig, sink: Box<dyn FrameSink>) -> Result<Self, LifeError> {
        let palette = Palette::ember(config.fade_levels);
        Self::with_palette(config, palette, sink)
    }

    /// Build a simulator with an explicit palette.
    pub fn with_palette(
        config: LifeConfig,
        palette: Palette,
        sink: Box<dyn FrameSink>,
    ) -> Result<Self, LifeError> {
        config.validate()?;
        if palette.levels() != config.fade_levels as usize {
            return Err(LifeError::InvalidConfig(
                "palette must have one color per fade level",
            ));
        }
        let mut rng = config.seeded_rng();
        let mut grid = FadeGrid::new(config.width, config.height, config.fade_levels)?;
        grid.randomize(config.initial_density, &mut rng);
        let history = PopulationHistory::new(config.history_size);
        Ok(Self {
            config,
            grid,
            palette,
            history,
            stable_count: 0,
            generation: 0,
            rng,
            sink,
        })
    }

    #[must_use]
    pub fn config(&self) -> &LifeConfig {
        &self.config
    }

    #[must_use]
    pub fn grid(&self) -> &FadeGrid {
        &self.grid
    }

    /// Mutable grid access, for planting patterns before a run.
    pub fn grid_mut(&mut self) -> &mut FadeGrid {
        &mut self.grid
    }

    #[must_use]
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    #[must_use]
    pub fn history(&self) -> &PopulationHistory {
        &self.history
    }

    #[must_use]
    pub const fn stable_count(&self) -> u32 {
        self.stable_count
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Advance one generation: rule pass, swap, present, then (when enabled)
    /// the stability watchdog.
    ///
    /// Stability checks are suppressed until `history_size` generations have
    /// elapsed since the last reseed, so the zero-initialized window cannot
    /// spuriously satisfy the static check.
    pub fn step(&mut self) -> GenerationEvents {
        self.grid.compute_next_generation(self.config.decay_rate);
        self.grid.swap_buffers();
        self.sink.present(FrameView::new(
            self.grid.cells(),
            self.grid.width(),
            self.grid.height(),
            &self.palette,
        ));

        let mut events = GenerationEvents::default();
        if self.config.auto_reset_on_stable {
            let population = self.grid.population();
            self.history.push(population);
            self.generation += 1;
            events.population = Some(population);

            let window_filled = self.generation >= self.config.history_size as u64;
            let stable = window_filled && is_stable(self.history.counts());
            events.stable = stable;
            if stable {
                self.stable_count += 1;
                if self.stable_count >= self.config.stable_generations {
                    self.reseed();
                    events.reseeded = true;
                }
            } else {
                self.stable_count = 0;
            }
        }
        events.generation = self.generation;
        events
    }

    /// Discard the grid and reseed it randomly, resetting the watchdog state.
    pub fn reseed(&mut self) {
        self.grid
            .randomize(self.config.initial_density, &mut self.rng);
        self.history.reset();
        self.stable_count = 0;
        self.generation = 0;
    }

    /// Run generations until `keep_going` returns false.
    ///
    /// Sleeps for `reseed_pause` after a reseed, mirroring the brief visual
    /// hold before a fresh board starts evolving. The stop condition is
    /// checked once per generation, after the sleep.
    pub fn run<F>(&mut self, mut keep_going: F)
    where
        F: FnMut(&GenerationEvents) -> bool,
    {
        loop {
            let events = self.step();
            if events.reseeded && !self.config.reseed_pause.is_zero() {
                std::thread::sleep(self.config.reseed_pause);
            }
            if !keep_going(&events) {
                break;
            }
        }
    }
}
