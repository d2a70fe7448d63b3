//! `Surface` over a ratatui buffer, one grid cell per terminal cell.

use ratatui::buffer::Buffer;
use ratatui::layout::{Position as CellPosition, Rect as Area};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Span;

use nvim_tui::grid::CursorShape;
use nvim_tui::redraw::Rgb;
use nvim_tui::render::{Position, Rect, Size, Surface, TextStyle};

pub fn color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.r(), rgb.g(), rgb.b())
}

/// Draws into `area` of a frame buffer; anything outside is clipped.
pub struct BufferSurface<'a> {
    buf: &'a mut Buffer,
    area: Area,
}

impl<'a> BufferSurface<'a> {
    pub fn new(buf: &'a mut Buffer, area: Area) -> Self {
        Self { buf, area }
    }

    /// Apply `style` to every in-area cell of `rect`.
    fn style_rect(&mut self, rect: Rect, style: Style) {
        for dy in 0..rect.height {
            for dx in 0..rect.width {
                let (Ok(x), Ok(y)) = (u16::try_from(rect.x + dx), u16::try_from(rect.y + dy)) else {
                    continue;
                };
                if x >= self.area.width || y >= self.area.height {
                    continue;
                }
                let at = CellPosition::new(self.area.x + x, self.area.y + y);
                if let Some(cell) = self.buf.cell_mut(at) {
                    cell.set_style(style);
                }
            }
        }
    }
}

impl Surface for BufferSurface<'_> {
    fn measure_text(&self, text: &str) -> Size {
        Size {
            width: Span::raw(text).width() as u32,
            height: 1,
        }
    }

    fn draw_text(&mut self, text: &str, at: Position, style: &TextStyle) {
        let (Ok(x), Ok(y)) = (u16::try_from(at.x), u16::try_from(at.y)) else {
            return;
        };
        if x >= self.area.width || y >= self.area.height {
            return;
        }
        let mut ratatui_style = Style::default().fg(color(style.fg)).bg(color(style.bg));
        if style.bold {
            ratatui_style = ratatui_style.add_modifier(Modifier::BOLD);
        }
        if style.italic {
            ratatui_style = ratatui_style.add_modifier(Modifier::ITALIC);
        }
        if style.underline {
            ratatui_style = ratatui_style.add_modifier(Modifier::UNDERLINED);
        }
        let max_width = usize::from(self.area.width - x);
        self.buf.set_stringn(
            self.area.x + x,
            self.area.y + y,
            text,
            max_width,
            ratatui_style,
        );
    }

    fn draw_rect(&mut self, rect: Rect, rgb: Rgb) {
        self.style_rect(rect, Style::default().bg(color(rgb)));
    }

    /// Terminal cells cannot be split, so the bar cursor is drawn as an
    /// underline instead of a narrow rect.
    fn draw_cursor(&mut self, rect: Rect, _rgb: Rgb, shape: CursorShape) {
        let modifier = match shape {
            CursorShape::Block => Modifier::REVERSED,
            CursorShape::Bar => Modifier::UNDERLINED,
        };
        self.style_rect(rect, Style::default().add_modifier(modifier));
    }
}
