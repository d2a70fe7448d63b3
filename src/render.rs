//! Painting a grid onto a drawing surface.
//!
//! The core never draws. A front-end implements [`Surface`] for whatever it
//! renders to (a terminal buffer, a bitmap) and calls [`paint`] with a
//! snapshot taken after a batch was applied.

use crate::grid::{Cell, CursorShape, Grid};
use crate::redraw::Rgb;

/// Extent in surface units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

/// Top-left corner in surface units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Style of one text run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextStyle {
    pub fg: Rgb,
    pub bg: Rgb,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl From<&Cell> for TextStyle {
    fn from(cell: &Cell) -> Self {
        Self {
            fg: cell.fg,
            bg: cell.bg,
            bold: cell.bold,
            italic: cell.italic,
            underline: cell.underline,
        }
    }
}

/// Drawing primitives a front-end provides.
pub trait Surface {
    /// Size of `text` when drawn in the surface's font.
    fn measure_text(&self, text: &str) -> Size;

    fn draw_text(&mut self, text: &str, at: Position, style: &TextStyle);

    fn draw_rect(&mut self, rect: Rect, color: Rgb);

    /// Draw the cursor. Surfaces that can invert cells in place override
    /// this; the default fills the rect.
    fn draw_cursor(&mut self, rect: Rect, color: Rgb, _shape: CursorShape) {
        self.draw_rect(rect, color);
    }
}

/// Paint `grid` onto `surface`.
///
/// Each row gets a background rect, then one `draw_text` per maximal run of
/// same-styled cells, then the cursor.
pub fn paint<S: Surface + ?Sized>(grid: &Grid, surface: &mut S) {
    if grid.is_empty() {
        return;
    }
    let cell = surface.measure_text("M");
    let cols = grid.cols() as u32;

    for row in 0..grid.rows() {
        let y = row as u32 * cell.height;
        surface.draw_rect(
            Rect {
                x: 0,
                y,
                width: cols * cell.width,
                height: cell.height,
            },
            grid.default_background(),
        );

        for run in runs(grid.row(row)) {
            surface.draw_text(
                &run.text,
                Position {
                    x: run.start as u32 * cell.width,
                    y,
                },
                &run.style,
            );
        }
    }

    let cursor = grid.cursor();
    let shape = grid.cursor_shape();
    let width = match shape {
        CursorShape::Block => cell.width,
        CursorShape::Bar => (cell.width / 4).max(1),
    };
    surface.draw_cursor(
        Rect {
            x: cursor.col as u32 * cell.width,
            y: cursor.row as u32 * cell.height,
            width,
            height: cell.height,
        },
        grid.cell(cursor.row, cursor.col).fg,
        shape,
    );
}

/// A maximal span of same-styled cells.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    /// Column of the first cell.
    pub start: usize,
    /// Cell text, blanks as spaces.
    pub text: String,
    pub style: TextStyle,
}

/// Split a row into runs of identical style.
pub fn runs(row: &[Cell]) -> Vec<TextRun> {
    let mut out: Vec<TextRun> = Vec::new();
    let mut first: Option<&Cell> = None;

    for (col, cell) in row.iter().enumerate() {
        let glyph = if cell.is_blank() { " " } else { cell.text.as_str() };
        match (first, out.last_mut()) {
            (Some(head), Some(run)) if head.same_style(cell) => run.text.push_str(glyph),
            _ => {
                first = Some(cell);
                out.push(TextRun {
                    start: col,
                    text: glyph.to_string(),
                    style: TextStyle::from(cell),
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redraw::{HighlightUpdate, RedrawOp};
    use pretty_assertions::assert_eq;

    /// Records calls in a character-cell coordinate system.
    #[derive(Default)]
    struct Recorder {
        texts: Vec<(String, Position, TextStyle)>,
        rects: Vec<(Rect, Rgb)>,
    }

    impl Surface for Recorder {
        fn measure_text(&self, text: &str) -> Size {
            Size {
                width: text.chars().count() as u32,
                height: 1,
            }
        }

        fn draw_text(&mut self, text: &str, at: Position, style: &TextStyle) {
            self.texts.push((text.to_string(), at, *style));
        }

        fn draw_rect(&mut self, rect: Rect, color: Rgb) {
            self.rects.push((rect, color));
        }
    }

    #[test]
    fn test_runs_split_on_style_change() {
        let mut grid = Grid::new(1, 6);
        grid.apply(&RedrawOp::Put("ab".into()));
        grid.apply(&RedrawOp::HighlightSet(HighlightUpdate {
            bold: Some(true),
            ..Default::default()
        }));
        grid.apply(&RedrawOp::Put("cd".into()));

        let runs = runs(grid.row(0));
        let texts: Vec<_> = runs.iter().map(|r| (r.start, r.text.as_str())).collect();
        assert_eq!(texts, vec![(0, "ab"), (2, "cd"), (4, "  ")]);
        assert!(runs[1].style.bold);
    }

    #[test]
    fn test_paint_emits_rows_and_cursor() {
        let mut grid = Grid::new(2, 3);
        grid.apply(&RedrawOp::Put("xyz".into()));

        let mut surface = Recorder::default();
        paint(&grid, &mut surface);

        // Two row backgrounds, then the cursor.
        assert_eq!(surface.rects.len(), 3);
        assert_eq!(
            surface.rects[0].0,
            Rect {
                x: 0,
                y: 0,
                width: 3,
                height: 1
            }
        );
        let (cursor, _) = surface.rects[2];
        assert_eq!((cursor.x, cursor.y), (0, 1));

        assert_eq!(surface.texts[0].0, "xyz");
        assert_eq!(surface.texts[1].0, "   ");
        assert_eq!(surface.texts[1].1, Position { x: 0, y: 1 });
    }

    #[test]
    fn test_bar_cursor_is_narrow() {
        struct Wide(Recorder);
        impl Surface for Wide {
            fn measure_text(&self, _text: &str) -> Size {
                Size {
                    width: 8,
                    height: 16,
                }
            }
            fn draw_text(&mut self, text: &str, at: Position, style: &TextStyle) {
                self.0.draw_text(text, at, style);
            }
            fn draw_rect(&mut self, rect: Rect, color: Rgb) {
                self.0.draw_rect(rect, color);
            }
        }

        let mut grid = Grid::new(1, 2);
        grid.apply(&RedrawOp::ModeChange("insert".into()));
        let mut surface = Wide(Recorder::default());
        paint(&grid, &mut surface);
        let (cursor, _) = *surface.0.rects.last().unwrap();
        assert_eq!(cursor.width, 2);
        assert_eq!(cursor.height, 16);
    }

    #[test]
    fn test_paint_skips_empty_grid() {
        let mut surface = Recorder::default();
        paint(&Grid::new(0, 0), &mut surface);
        assert!(surface.rects.is_empty());
        assert!(surface.texts.is_empty());
    }
}
