//! UI rendering module.
//!
//! The editor grid fills the screen above a one-line status bar.

mod footer;
mod surface;

use ratatui::prelude::*;

use nvim_tui::grid::Grid;
use nvim_tui::render::paint;

use surface::BufferSurface;

/// Rows taken by the status bar.
pub const STATUS_HEIGHT: u16 = 1;

/// Main render function - called whenever the grid changes.
pub fn render(frame: &mut Frame, grid: &Grid) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(STATUS_HEIGHT)])
        .split(frame.area());

    paint(grid, &mut BufferSurface::new(frame.buffer_mut(), chunks[0]));
    footer::render(frame, grid, chunks[1]);
}

/// Grid size `(cols, rows)` for a terminal of the given size.
pub fn editor_size(width: u16, height: u16) -> (u16, u16) {
    (width.max(1), height.saturating_sub(STATUS_HEIGHT).max(1))
}
