//! Status line: editor title on the left, mode and size on the right.

use ratatui::prelude::*;
use ratatui::widgets::Paragraph;
use unicode_truncate::UnicodeTruncateStr;

use nvim_tui::grid::Grid;

pub fn render(frame: &mut Frame, grid: &Grid, area: Rect) {
    let line = status_line(grid, usize::from(area.width));
    frame.render_widget(
        Paragraph::new(line).style(Style::default().bg(Color::DarkGray).fg(Color::White)),
        area,
    );
}

fn status_line(grid: &Grid, width: usize) -> Line<'static> {
    let mut right = format!(" {} ", grid.mode().to_uppercase());
    if grid.is_busy() {
        right.push_str("[busy] ");
    }
    right.push_str(&format!("{}x{} ", grid.cols(), grid.rows()));

    let title = if grid.title().is_empty() {
        "[No Name]"
    } else {
        grid.title()
    };
    let room = width.saturating_sub(right.len() + 1);
    let (title, title_width) = title.unicode_truncate(room);
    let padding = width.saturating_sub(title_width + 1 + right.len());

    Line::from(vec![
        Span::styled(format!(" {}", title), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" ".repeat(padding)),
        Span::styled(right, Style::default().fg(Color::Cyan)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use nvim_tui::redraw::RedrawOp;

    fn text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_status_line_shows_title_and_mode() {
        let mut grid = Grid::new(24, 80);
        grid.apply(&RedrawOp::SetTitle("main.rs".into()));
        grid.apply(&RedrawOp::ModeChange("insert".into()));
        let line = text(&status_line(&grid, 40));
        assert!(line.starts_with(" main.rs"));
        assert!(line.ends_with(" INSERT 80x24 "));
        assert_eq!(line.len(), 40);
    }

    #[test]
    fn test_long_title_is_truncated() {
        let mut grid = Grid::new(24, 80);
        grid.apply(&RedrawOp::SetTitle("x".repeat(100)));
        let line = text(&status_line(&grid, 30));
        assert_eq!(line.len(), 30);
        assert!(line.contains("NORMAL"));
    }
}
