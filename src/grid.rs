//! The editor's logical screen.
//!
//! [`Grid`] is a rows x cols matrix of cells plus cursor, scroll region,
//! active highlight, and window metadata. It changes only through
//! [`Grid::apply`]. Renderers on other threads read it through
//! [`SharedGrid`], which applies a whole redraw batch under one write lock so
//! a reader never sees a half-applied batch.
//!
//! Operations are total over a well-formed grid. An operation that cannot
//! be applied safely (a cursor outside the grid, a put on a grid with no
//! cells) means the decoder or the engine is broken, and it panics instead
//! of corrupting the screen.

use std::sync::{Arc, PoisonError, RwLock};

use crate::redraw::{HighlightUpdate, RedrawOp, Rgb};

/// Foreground used until the engine sends `update_fg`.
pub const DEFAULT_FOREGROUND: Rgb = Rgb(0xFF_FF_FF);
/// Background used until the engine sends `update_bg`.
pub const DEFAULT_BACKGROUND: Rgb = Rgb(0x32_32_32);

/// One screen cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// A single display character, or empty for a blank cell.
    pub text: String,
    pub fg: Rgb,
    pub bg: Rgb,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl Cell {
    /// An empty cell in the given colours.
    pub fn blank(fg: Rgb, bg: Rgb) -> Self {
        Self {
            text: String::new(),
            fg,
            bg,
            bold: false,
            italic: false,
            underline: false,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.is_empty()
    }

    /// Whether two cells can be drawn in one run.
    pub fn same_style(&self, other: &Cell) -> bool {
        self.fg == other.fg
            && self.bg == other.bg
            && self.bold == other.bold
            && self.italic == other.italic
            && self.underline == other.underline
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pub row: usize,
    pub col: usize,
}

/// Inclusive rectangle that confines `Scroll`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollRegion {
    pub top: usize,
    pub bottom: usize,
    pub left: usize,
    pub right: usize,
}

impl ScrollRegion {
    /// The whole grid.
    pub fn full(rows: usize, cols: usize) -> Self {
        Self {
            top: 0,
            bottom: rows.saturating_sub(1),
            left: 0,
            right: cols.saturating_sub(1),
        }
    }

    pub fn height(&self) -> usize {
        self.bottom - self.top + 1
    }
}

/// Highlight applied to cells written by `Put`.
///
/// Colours left as `None` follow the grid defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    pub foreground: Option<Rgb>,
    pub background: Option<Rgb>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub reverse: bool,
}

impl Attributes {
    fn merge(&mut self, update: &HighlightUpdate) {
        if update.foreground.is_some() {
            self.foreground = update.foreground;
        }
        if update.background.is_some() {
            self.background = update.background;
        }
        if let Some(bold) = update.bold {
            self.bold = bold;
        }
        if let Some(italic) = update.italic {
            self.italic = italic;
        }
        if let Some(underline) = update.underline {
            self.underline = underline;
        }
        if let Some(reverse) = update.reverse {
            self.reverse = reverse;
        }
    }
}

/// Cursor glyph shape, driven by `ModeChange`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorShape {
    /// Full cell width.
    Block,
    /// Narrow bar for insert mode.
    Bar,
}

/// The editor screen.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    rows: usize,
    cols: usize,
    cells: Vec<Vec<Cell>>,
    cursor: Cursor,
    scroll_region: ScrollRegion,
    highlight: Attributes,
    default_fg: Rgb,
    default_bg: Rgb,
    title: String,
    icon: String,
    mode: String,
    busy: bool,
    mouse_enabled: bool,
    /// The last cell of the last row has been written; further put
    /// characters are dropped until the cursor is moved.
    wrap_pending: bool,
}

impl Grid {
    pub fn new(rows: usize, cols: usize) -> Self {
        let blank = Cell::blank(DEFAULT_FOREGROUND, DEFAULT_BACKGROUND);
        Self {
            rows,
            cols,
            cells: vec![vec![blank; cols]; rows],
            cursor: Cursor::default(),
            scroll_region: ScrollRegion::full(rows, cols),
            highlight: Attributes::default(),
            default_fg: DEFAULT_FOREGROUND,
            default_bg: DEFAULT_BACKGROUND,
            title: String::new(),
            icon: String::new(),
            mode: "normal".to_string(),
            busy: false,
            mouse_enabled: false,
            wrap_pending: false,
        }
    }

    /// Apply one operation.
    pub fn apply(&mut self, op: &RedrawOp) {
        match op {
            RedrawOp::Clear => self.clear(),
            RedrawOp::Resize { rows, cols } => self.resize(*rows, *cols),
            RedrawOp::SetForeground(rgb) => self.default_fg = rgb.unwrap_or(DEFAULT_FOREGROUND),
            RedrawOp::SetBackground(rgb) => self.default_bg = rgb.unwrap_or(DEFAULT_BACKGROUND),
            RedrawOp::HighlightSet(update) => self.highlight.merge(update),
            RedrawOp::EolClear => self.eol_clear(),
            RedrawOp::SetTitle(title) => self.title.clone_from(title),
            RedrawOp::SetIcon(icon) => self.icon.clone_from(icon),
            RedrawOp::Put(text) => self.put(text),
            RedrawOp::CursorGoto { row, col } => self.cursor_goto(*row, *col),
            RedrawOp::Scroll(count) => self.scroll(*count),
            RedrawOp::SetScrollRegion {
                top,
                bottom,
                left,
                right,
            } => self.set_scroll_region(ScrollRegion {
                top: *top,
                bottom: *bottom,
                left: *left,
                right: *right,
            }),
            RedrawOp::ModeChange(mode) => self.mode.clone_from(mode),
            RedrawOp::Busy(busy) => self.busy = *busy,
            RedrawOp::Mouse(enabled) => self.mouse_enabled = *enabled,
        }
    }

    /// Apply a batch in order.
    pub fn apply_all<'a>(&mut self, ops: impl IntoIterator<Item = &'a RedrawOp>) {
        for op in ops {
            self.apply(op);
        }
    }

    // ---------------------------------------------------------------------
    // Operations
    // ---------------------------------------------------------------------

    fn clear(&mut self) {
        let blank = self.default_cell();
        for row in &mut self.cells {
            row.fill(blank.clone());
        }
        self.wrap_pending = false;
    }

    /// Keep the overlapping region, pad with default cells, and reset the
    /// scroll region to the new bounds.
    fn resize(&mut self, rows: usize, cols: usize) {
        let blank = self.default_cell();
        self.cells.truncate(rows);
        for row in &mut self.cells {
            row.resize(cols, blank.clone());
        }
        self.cells.resize(rows, vec![blank; cols]);

        self.rows = rows;
        self.cols = cols;
        self.cursor.row = self.cursor.row.min(rows.saturating_sub(1));
        self.cursor.col = self.cursor.col.min(cols.saturating_sub(1));
        self.scroll_region = ScrollRegion::full(rows, cols);
        self.wrap_pending = false;
    }

    fn eol_clear(&mut self) {
        self.assert_not_empty("eol_clear");
        let blank = self.current_blank();
        let Cursor { row, col } = self.cursor;
        self.cells[row][col..].fill(blank);
    }

    /// Write `text` one character per cell from the cursor, wrapping to the
    /// next row at the right edge. Nothing is written past the last cell.
    fn put(&mut self, text: &str) {
        self.assert_not_empty("put");
        for ch in text.chars() {
            if self.wrap_pending {
                break;
            }
            let cell = self.styled_cell(ch);
            let Cursor { row, col } = self.cursor;
            self.cells[row][col] = cell;

            if col + 1 < self.cols {
                self.cursor.col += 1;
            } else if row + 1 < self.rows {
                self.cursor.row += 1;
                self.cursor.col = 0;
            } else {
                self.wrap_pending = true;
            }
        }
    }

    fn cursor_goto(&mut self, row: usize, col: usize) {
        assert!(
            row < self.rows && col < self.cols,
            "cursor_goto({}, {}) outside {}x{} grid",
            row,
            col,
            self.rows,
            self.cols
        );
        self.cursor = Cursor { row, col };
        self.wrap_pending = false;
    }

    /// Shift the scroll region by `count` rows: positive moves content up,
    /// negative moves it down. Revealed rows are blank in the default
    /// background.
    fn scroll(&mut self, count: i64) {
        if count == 0 || self.is_empty() {
            return;
        }
        let region = self.scroll_region;
        let blank = self.default_cell();
        let n = usize::try_from(count.unsigned_abs()).unwrap_or(usize::MAX);

        if n >= region.height() {
            for row in region.top..=region.bottom {
                self.cells[row][region.left..=region.right].fill(blank.clone());
            }
            return;
        }

        let full_width = region.left == 0 && region.right + 1 == self.cols;
        if full_width {
            let rows = &mut self.cells[region.top..=region.bottom];
            if count > 0 {
                rows.rotate_left(n);
            } else {
                rows.rotate_right(n);
            }
        } else if count > 0 {
            for row in region.top..=region.bottom - n {
                self.copy_row_span(row + n, row, region.left, region.right);
            }
        } else {
            for row in (region.top + n..=region.bottom).rev() {
                self.copy_row_span(row - n, row, region.left, region.right);
            }
        }

        let revealed = if count > 0 {
            region.bottom + 1 - n..=region.bottom
        } else {
            region.top..=region.top + n - 1
        };
        for row in revealed {
            self.cells[row][region.left..=region.right].fill(blank.clone());
        }
    }

    fn set_scroll_region(&mut self, region: ScrollRegion) {
        assert!(
            region.top <= region.bottom
                && region.bottom < self.rows
                && region.left <= region.right
                && region.right < self.cols,
            "scroll region {:?} outside {}x{} grid",
            region,
            self.rows,
            self.cols
        );
        self.scroll_region = region;
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    fn copy_row_span(&mut self, from: usize, to: usize, left: usize, right: usize) {
        let span = self.cells[from][left..=right].to_vec();
        self.cells[to][left..=right].clone_from_slice(&span);
    }

    fn default_cell(&self) -> Cell {
        Cell::blank(self.default_fg, self.default_bg)
    }

    /// Blank cell in the active highlight's background.
    fn current_blank(&self) -> Cell {
        Cell::blank(
            self.default_fg,
            self.highlight.background.unwrap_or(self.default_bg),
        )
    }

    fn styled_cell(&self, ch: char) -> Cell {
        let mut fg = self.highlight.foreground.unwrap_or(self.default_fg);
        let mut bg = self.highlight.background.unwrap_or(self.default_bg);
        if self.highlight.reverse {
            std::mem::swap(&mut fg, &mut bg);
        }
        Cell {
            text: ch.to_string(),
            fg,
            bg,
            bold: self.highlight.bold,
            italic: self.highlight.italic,
            underline: self.highlight.underline,
        }
    }

    fn assert_not_empty(&self, op: &str) {
        assert!(!self.is_empty(), "{} on a grid with no cells", op);
    }

    // ---------------------------------------------------------------------
    // Read access
    // ---------------------------------------------------------------------

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        &self.cells[row][col]
    }

    pub fn row(&self, row: usize) -> &[Cell] {
        &self.cells[row]
    }

    /// Row contents as text, blank cells rendered as spaces.
    pub fn row_text(&self, row: usize) -> String {
        self.cells[row]
            .iter()
            .map(|c| if c.is_blank() { " " } else { c.text.as_str() })
            .collect()
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn scroll_region(&self) -> ScrollRegion {
        self.scroll_region
    }

    pub fn highlight(&self) -> &Attributes {
        &self.highlight
    }

    pub fn default_foreground(&self) -> Rgb {
        self.default_fg
    }

    pub fn default_background(&self) -> Rgb {
        self.default_bg
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn icon(&self) -> &str {
        &self.icon
    }

    pub fn mode(&self) -> &str {
        &self.mode
    }

    pub fn cursor_shape(&self) -> CursorShape {
        if self.mode == "insert" {
            CursorShape::Bar
        } else {
            CursorShape::Block
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn mouse_enabled(&self) -> bool {
        self.mouse_enabled
    }
}

/// A grid shared between the reader task (sole writer) and renderers.
#[derive(Debug, Clone)]
pub struct SharedGrid {
    inner: Arc<RwLock<Grid>>,
}

impl SharedGrid {
    pub fn new(grid: Grid) -> Self {
        Self {
            inner: Arc::new(RwLock::new(grid)),
        }
    }

    /// Apply a whole batch under one write lock.
    pub fn apply_batch(&self, ops: &[RedrawOp]) {
        let mut grid = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        grid.apply_all(ops);
    }

    /// Copy of the grid as of the last completed batch.
    pub fn snapshot(&self) -> Grid {
        self.read(Grid::clone)
    }

    /// Run `f` against the grid without copying it.
    pub fn read<R>(&self, f: impl FnOnce(&Grid) -> R) -> R {
        let grid = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&grid)
    }
}
