use super::patterns::PatternLibrary;
use super::source::Cell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Header,
    Skip,
    Data,
}

pub fn classify_row(patterns: &PatternLibrary, row: &[Cell]) -> RowKind {
    if is_header_row(patterns, row) {
        return RowKind::Header;
    }
    if is_skip_row(patterns, row) {
        return RowKind::Skip;
    }
    RowKind::Data
}

pub fn is_header_row(patterns: &PatternLibrary, row: &[Cell]) -> bool {
    let mut header_count = 0usize;
    let mut non_empty_count = 0usize;

    for cell in row {
        let text = cell.text.trim();
        if text.is_empty() {
            continue;
        }
        non_empty_count += 1;
        if patterns.is_header_cell(text) {
            header_count += 1;
        }
    }

    if non_empty_count <= 3 {
        header_count >= non_empty_count / 2 + 1
    } else {
        header_count >= 2
    }
}

pub fn is_skip_row(patterns: &PatternLibrary, row: &[Cell]) -> bool {
    let joined = row
        .iter()
        .map(|cell| cell.text.as_str())
        .collect::<Vec<&str>>()
        .join(" ");
    patterns.is_skip_text(&joined)
}
