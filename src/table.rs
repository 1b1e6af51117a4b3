use std::borrow::Cow;
use std::fmt::Write as _;

/// Cells wider than this are cut and end in an ellipsis.
pub const MAX_CELL_WIDTH: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

/// Renders an aligned plain-text table with a dashed rule under the header.
/// `aligns` may be shorter than `headers`; missing entries align left.
pub fn render_table(headers: &[&str], rows: &[Vec<String>], aligns: &[Align]) -> String {
    let column_count = headers.len();
    let headers: Vec<Cow<'_, str>> = headers.iter().map(|h| clip(h)).collect();
    let rows: Vec<Vec<Cow<'_, str>>> = rows
        .iter()
        .map(|row| row.iter().take(column_count).map(|cell| clip(cell)).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count().max(3)).collect();
    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(cell.chars().count());
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(&headers, &widths, &[]));
    let rule: Vec<Cow<'_, str>> = widths.iter().map(|w| Cow::Owned("-".repeat(*w))).collect();
    let _ = writeln!(output, "{}", format_row(&rule, &widths, &[]));
    for row in &rows {
        let _ = writeln!(output, "{}", format_row(row, &widths, aligns));
    }
    output
}

fn format_row(cells: &[Cow<'_, str>], widths: &[usize], aligns: &[Align]) -> String {
    let mut line = String::new();
    for (idx, width) in widths.iter().enumerate() {
        if idx > 0 {
            line.push_str("  ");
        }
        let cell = cells.get(idx).map(|c| c.as_ref()).unwrap_or("");
        let padding = width.saturating_sub(cell.chars().count());
        match aligns.get(idx).copied().unwrap_or(Align::Left) {
            Align::Left => {
                line.push_str(cell);
                line.push_str(&" ".repeat(padding));
            }
            Align::Right => {
                line.push_str(&" ".repeat(padding));
                line.push_str(cell);
            }
        }
    }
    line.truncate(line.trim_end().len());
    line
}

/// Flattens control whitespace and shortens overlong cells.
fn clip(value: &str) -> Cow<'_, str> {
    let needs_flatten = value.contains(['\n', '\r', '\t']);
    let too_wide = value.chars().count() > MAX_CELL_WIDTH;
    if !needs_flatten && !too_wide {
        return Cow::Borrowed(value);
    }
    let mut clipped: String = value
        .chars()
        .map(|ch| if matches!(ch, '\n' | '\r' | '\t') { ' ' } else { ch })
        .take(if too_wide { MAX_CELL_WIDTH - 1 } else { usize::MAX })
        .collect();
    if too_wide {
        clipped.push('…');
    }
    Cow::Owned(clipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn right_aligned_columns_pad_on_the_left() {
        let rendered = render_table(
            &["name", "n"],
            &[vec!["a".into(), "5".into()], vec!["bb".into(), "10".into()]],
            &[Align::Left, Align::Right],
        );
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "name  n");
        assert_eq!(lines[1], "----  ---");
        assert_eq!(lines[2], "a       5");
        assert_eq!(lines[3], "bb     10");
    }

    #[test]
    fn long_and_multiline_cells_are_clipped() {
        let long = "x".repeat(MAX_CELL_WIDTH + 5);
        assert_eq!(clip(&long).chars().count(), MAX_CELL_WIDTH);
        assert_eq!(clip("a\nb"), "a b");
    }
}
