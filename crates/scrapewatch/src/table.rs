use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use scrapewatch_core::{ItemStatus, SessionStatus};

use crate::color;

/// How a cell is colored once padded.
#[derive(Debug, Clone, Copy)]
pub enum Style {
    Plain,
    Accent,
    Muted,
    Session(SessionStatus),
    Item(ItemStatus),
}

#[derive(Debug, Clone)]
pub struct Cell {
    text: String,
    style: Style,
}

impl Cell {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::styled(text, Style::Plain)
    }

    pub fn styled(text: impl Into<String>, style: Style) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    fn render(&self, width: usize) -> String {
        let padded = pad(&self.text, width);
        match self.style {
            Style::Plain => padded,
            Style::Accent => color::accent(&padded),
            Style::Muted => color::muted(&padded),
            Style::Session(status) => color::session_status(status, &padded),
            Style::Item(status) => color::item_status(status, &padded),
        }
    }
}

/// Box-drawn table sized to its widest cell per column.
pub struct TableFormatter {
    headers: Vec<&'static str>,
    rows: Vec<Vec<Cell>>,
}

impl TableFormatter {
    pub fn new(headers: &[&'static str]) -> Self {
        Self {
            headers: headers.to_vec(),
            rows: Vec::new(),
        }
    }

    /// Append a row. Missing trailing cells render empty; extra cells are dropped.
    pub fn push_row(&mut self, mut cells: Vec<Cell>) {
        cells.resize_with(self.headers.len(), || Cell::plain(""));
        self.rows.push(cells);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> Vec<usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                self.rows
                    .iter()
                    .map(|row| display_width(&row[i].text))
                    .fold(display_width(header), usize::max)
            })
            .collect()
    }

    pub fn render(&self) -> Vec<String> {
        let widths = self.widths();
        let sep = color::muted("│");
        let join_row = |cells: Vec<String>| format!("{sep} {} {sep}", cells.join(&format!(" {sep} ")));

        let mut lines = Vec::with_capacity(self.rows.len() + 4);
        lines.push(border(&widths, '┌', '┬', '┐'));
        lines.push(join_row(
            self.headers
                .iter()
                .zip(&widths)
                .map(|(header, width)| color::bold(&pad(header, *width)))
                .collect(),
        ));
        lines.push(border(&widths, '├', '┼', '┤'));
        for row in &self.rows {
            lines.push(join_row(
                row.iter()
                    .zip(&widths)
                    .map(|(cell, width)| cell.render(*width))
                    .collect(),
            ));
        }
        lines.push(border(&widths, '└', '┴', '┘'));
        lines
    }

    pub fn print(&self) {
        for line in self.render() {
            println!("{}", line);
        }
    }
}

fn border(widths: &[usize], left: char, mid: char, right: char) -> String {
    let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
    color::muted(&format!(
        "{}{}{}",
        left,
        segments.join(&mid.to_string()),
        right
    ))
}

/// Compute the terminal display width of a string.
///
/// Wide characters (CJK, emoji) count as 2 columns.
pub(crate) fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Pad a string to a minimum display width without truncating.
pub(crate) fn pad(s: &str, min_width: usize) -> String {
    let width = display_width(s);
    if width >= min_width {
        s.to_string()
    } else {
        format!("{}{}", s, " ".repeat(min_width - width))
    }
}

/// Cut a string to at most `max_width` display columns, ending in "..." when cut.
pub(crate) fn truncate(s: &str, max_width: usize) -> String {
    if display_width(s) <= max_width {
        return s.to_string();
    }
    let budget = max_width.saturating_sub(3);
    let mut used = 0;
    let mut out = String::new();
    for ch in s.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(ch);
    }
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_shorter_than_width() {
        assert_eq!(pad("hi", 5), "hi   ");
    }

    #[test]
    fn test_pad_longer_than_width() {
        // Never truncates
        assert_eq!(pad("hello world", 5), "hello world");
    }

    #[test]
    fn test_display_width_cjk() {
        assert_eq!(display_width("日本"), 4);
    }

    #[test]
    fn test_pad_with_wide_chars() {
        assert_eq!(pad("日本", 6), "日本  ");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this-is-a-very-long-string", 10), "this-is...");
        assert_eq!(truncate("abcd", 3), "...");
    }

    #[test]
    fn test_truncate_wide_chars_on_column_boundary() {
        // Each CJK char is 2 columns; only one fits before the ellipsis.
        assert_eq!(truncate("日本語テキスト", 6), "日...");
    }

    #[test]
    fn test_table_sizes_columns_to_widest_cell() {
        crate::color::set_no_color();
        let mut table = TableFormatter::new(&["Id", "Name"]);
        table.push_row(vec![Cell::plain("s1"), Cell::plain("long session name")]);
        table.push_row(vec![Cell::plain("session-two")]);
        let lines = table.render();

        assert_eq!(lines.len(), 6);
        assert_eq!(lines[1], "│ Id          │ Name              │");
        assert_eq!(lines[3], "│ s1          │ long session name │");
        assert_eq!(lines[4], "│ session-two │                   │");
        assert!(lines[0].starts_with('┌'));
        assert!(lines[5].ends_with('┘'));
    }
}
