//! Ratatui/crossterm frame sink: fade levels to colored half blocks.

use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::{
    cursor::{Hide, Show},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use emberlife_core::{FrameSink, FrameView, Rgb};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Style},
    widgets::Paragraph,
};
use supports_color::{Stream, on_cached};
use tracing::warn;

/// Renderer that presents each generation as half-block glyphs, packing two
/// grid rows into every terminal row, with a one-line status bar below.
pub struct TerminalSink {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    truecolor: bool,
    frames: u64,
}

impl TerminalSink {
    /// Enter raw mode and the alternate screen, then take over rendering.
    pub fn new() -> Result<Self> {
        enable_raw_mode().context("enabling raw mode")?;
        let mut out = io::stdout();
        execute!(out, EnterAlternateScreen, Hide).context("entering alternate screen")?;
        let terminal = Terminal::new(CrosstermBackend::new(out))?;
        let truecolor = on_cached(Stream::Stdout).is_some_and(|level| level.has_16m);
        Ok(Self {
            terminal,
            truecolor,
            frames: 0,
        })
    }

    fn draw(&mut self, frame: &FrameView<'_>) -> Result<()> {
        let truecolor = self.truecolor;
        let frames = self.frames;
        let max = frame.palette().levels().saturating_sub(1) as u8;
        let population = frame.cells().iter().filter(|&&cell| cell == max).count();
        self.terminal.draw(|f| {
            let chunks =
                Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).split(f.area());
            render_cells(frame, truecolor, chunks[0], f.buffer_mut());
            let status = Paragraph::new(format!(
                " frame {frames} | population {population} | q to quit"
            ))
            .style(Style::default().fg(Color::DarkGray));
            f.render_widget(status, chunks[1]);
        })?;
        Ok(())
    }
}

impl FrameSink for TerminalSink {
    fn present(&mut self, frame: FrameView<'_>) {
        self.frames += 1;
        if let Err(err) = self.draw(&frame) {
            warn!(error = %err, "failed to draw frame");
        }
    }
}

/// Leave the alternate screen and restore the cooked terminal. Safe to call
/// even if setup never completed.
pub fn restore() {
    if let Err(err) = disable_raw_mode() {
        warn!(error = %err, "failed to disable raw mode");
    }
    if let Err(err) = execute!(io::stdout(), LeaveAlternateScreen, Show) {
        warn!(error = %err, "failed to leave alternate screen");
    }
}

/// Block up to `timeout` waiting for a quit key (`q`, Esc, or Ctrl-C).
///
/// Doubles as the frame pacer: the timeout is the per-generation budget.
pub fn wait_for_quit(timeout: Duration) -> Result<bool> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if !event::poll(remaining).context("polling terminal events")? {
            return Ok(false);
        }
        if let Event::Key(key) = event::read().context("reading terminal event")? {
            if key.kind == KeyEventKind::Press && is_quit_key(key) {
                return Ok(true);
            }
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
    }
}

fn is_quit_key(key: KeyEvent) -> bool {
    matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
        || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
}

fn render_cells(frame: &FrameView<'_>, truecolor: bool, area: Rect, buf: &mut Buffer) {
    let cols = area.width.min(frame.width().min(u32::from(u16::MAX)) as u16);
    let rows = area
        .height
        .min(frame.height().div_ceil(2).min(u32::from(u16::MAX)) as u16);
    for row in 0..rows {
        let top_y = u32::from(row) * 2;
        for col in 0..cols {
            let x = u32::from(col);
            let top = frame.level(x, top_y).unwrap_or(0);
            let bottom = frame.level(x, top_y + 1).unwrap_or(0);
            if let Some(cell) = buf.cell_mut((area.x + col, area.y + row)) {
                cell.set_symbol("▀");
                cell.set_fg(level_color(frame.palette().color(top), truecolor));
                cell.set_bg(level_color(frame.palette().color(bottom), truecolor));
            }
        }
    }
}

fn level_color(rgb: Rgb, truecolor: bool) -> Color {
    if truecolor {
        Color::Rgb(rgb.r, rgb.g, rgb.b)
    } else {
        Color::Indexed(ansi256(rgb))
    }
}

/// Nearest entry in the 6x6x6 ANSI color cube.
fn ansi256(rgb: Rgb) -> u8 {
    let scale = |channel: u8| (u16::from(channel) * 5 / 255) as u8;
    16 + 36 * scale(rgb.r) + 6 * scale(rgb.g) + scale(rgb.b)
}
