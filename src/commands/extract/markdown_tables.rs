use regex::Regex;

use super::source::{Cell, Table};

pub fn parse_markdown_tables(text: &str) -> Vec<Table> {
    let separator_row = Regex::new(r"^\|[\s\-:]+\|$").expect("valid separator row regex");
    let separator_cells = Regex::new(r"^\|(\s*[-:]+\s*\|)+$").expect("valid separator cell regex");

    let mut tables = Vec::<Table>::new();
    let mut current = Vec::<Vec<Cell>>::new();

    for raw_line in text.lines() {
        let line = raw_line.trim();

        if line.contains('|') {
            if separator_row.is_match(line) || separator_cells.is_match(line) {
                continue;
            }

            let segments = if line.starts_with('|') {
                let pieces = line.split('|').collect::<Vec<&str>>();
                pieces[1..pieces.len().saturating_sub(1)].to_vec()
            } else {
                line.split('|').collect::<Vec<&str>>()
            };

            let cells = segments
                .iter()
                .map(|segment| Cell::text_only(*segment))
                .collect::<Vec<Cell>>();

            if cells.iter().any(|cell| !cell.text.is_empty()) {
                current.push(cells);
            }
        } else if !current.is_empty() {
            if current.len() >= 2 {
                tables.push(Table {
                    bbox: None,
                    rows: std::mem::take(&mut current),
                });
            } else {
                current.clear();
            }
        }
    }

    if current.len() >= 2 {
        tables.push(Table {
            bbox: None,
            rows: current,
        });
    }

    tables
}
