use std::collections::{HashMap, HashSet};

use super::patterns::{DEFAULT_IDENTIFIER_PRIORITY, IdentifierField, PatternLibrary};
use super::row_classify::is_header_row;
use super::source::Table;

const HEADER_SCAN_ROWS: usize = 3;
const DEFAULT_SAMPLE_ROWS: usize = 10;
const MIN_CONTENT_SCORE: f64 = 0.5;
const WIDE_COLUMN_RATIO: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MappedField {
    ItemNo,
    Upc,
    Sku,
    ProductName,
    Count,
    Price,
}

const ASSIGNMENT_PRIORITY: [MappedField; 6] = [
    MappedField::ItemNo,
    MappedField::Upc,
    MappedField::Sku,
    MappedField::ProductName,
    MappedField::Count,
    MappedField::Price,
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMap {
    pub item_no: Option<usize>,
    pub upc: Option<usize>,
    pub sku: Option<usize>,
    pub product_name: Option<usize>,
    pub count: Option<usize>,
    pub price: Option<usize>,
}

impl ColumnMap {
    pub fn get(&self, field: MappedField) -> Option<usize> {
        match field {
            MappedField::ItemNo => self.item_no,
            MappedField::Upc => self.upc,
            MappedField::Sku => self.sku,
            MappedField::ProductName => self.product_name,
            MappedField::Count => self.count,
            MappedField::Price => self.price,
        }
    }

    pub fn set(&mut self, field: MappedField, column: usize) {
        let slot = match field {
            MappedField::ItemNo => &mut self.item_no,
            MappedField::Upc => &mut self.upc,
            MappedField::Sku => &mut self.sku,
            MappedField::ProductName => &mut self.product_name,
            MappedField::Count => &mut self.count,
            MappedField::Price => &mut self.price,
        };
        if slot.is_none() {
            *slot = Some(column);
        }
    }

    pub fn identifier_column(&self, field: IdentifierField) -> Option<usize> {
        match field {
            IdentifierField::Upc => self.upc,
            IdentifierField::Sku => self.sku,
            IdentifierField::ItemNo => self.item_no,
        }
    }

    pub fn has_identifier_columns(&self) -> bool {
        self.upc.is_some() || self.sku.is_some() || self.item_no.is_some()
    }

    pub fn assigned_columns(&self) -> HashSet<usize> {
        [
            self.item_no,
            self.upc,
            self.sku,
            self.product_name,
            self.count,
            self.price,
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

#[derive(Debug)]
pub struct ColumnDetector<'p> {
    patterns: &'p PatternLibrary,
    identifier_priority: Vec<IdentifierField>,
    sample_rows: usize,
}

impl<'p> ColumnDetector<'p> {
    pub fn new(patterns: &'p PatternLibrary) -> Self {
        Self {
            patterns,
            identifier_priority: DEFAULT_IDENTIFIER_PRIORITY.to_vec(),
            sample_rows: DEFAULT_SAMPLE_ROWS,
        }
    }

    pub fn with_identifier_priority(mut self, priority: Vec<IdentifierField>) -> Self {
        if !priority.is_empty() {
            self.identifier_priority = priority;
        }
        self
    }

    pub fn with_sample_rows(mut self, sample_rows: usize) -> Self {
        self.sample_rows = sample_rows.max(1);
        self
    }

    pub fn map_by_headers(&self, table: &Table) -> ColumnMap {
        let mut mapping = ColumnMap::default();

        for row in table.rows.iter().take(HEADER_SCAN_ROWS) {
            for (column, cell) in row.iter().enumerate() {
                let text = cell.text.trim();
                if text.is_empty() {
                    continue;
                }

                for field in &self.identifier_priority {
                    if self.patterns.is_identifier_header(*field, text) {
                        mapping.set(mapped_identifier(*field), column);
                    }
                }

                if self.patterns.is_product_name_header(text) {
                    mapping.set(MappedField::ProductName, column);
                }

                if self.patterns.is_count_header(text) {
                    mapping.set(MappedField::Count, column);
                }
            }
        }

        mapping
    }

    pub fn map_columns(&self, table: &Table) -> ColumnMap {
        let mut mapping = self.map_by_headers(table);

        let num_cols = table.rows.iter().map(Vec::len).max().unwrap_or(0);
        if num_cols == 0 {
            return mapping;
        }

        let mut scores = HashMap::<(usize, MappedField), f64>::new();
        let mut widths = HashMap::<usize, Vec<usize>>::new();

        let data_rows = table
            .rows
            .iter()
            .filter(|row| !is_header_row(self.patterns, row))
            .take(self.sample_rows);

        for row in data_rows {
            for (column, cell) in row.iter().enumerate() {
                let text = cell.text.trim();
                if text.is_empty() {
                    continue;
                }

                let width = text.chars().count();
                widths.entry(column).or_default().push(width);

                if self.patterns.is_identifier(text) {
                    *scores.entry((column, MappedField::ItemNo)).or_default() += 1.0;
                }
                if self.patterns.is_price(text) {
                    *scores.entry((column, MappedField::Price)).or_default() += 1.0;
                }
                if self.patterns.is_count_cell(text) {
                    *scores.entry((column, MappedField::Count)).or_default() += 1.0;
                }
                if width > 15 && !self.patterns.is_identifier(text) && !self.patterns.is_price(text)
                {
                    *scores.entry((column, MappedField::ProductName)).or_default() += 0.5;
                }

                let is_alphanumeric = text.chars().all(|character| character.is_ascii_alphanumeric());
                let has_digit = text.chars().any(|character| character.is_ascii_digit());
                if width <= 15 && is_alphanumeric && has_digit {
                    if width >= 10 {
                        *scores.entry((column, MappedField::Upc)).or_default() += 0.8;
                    } else if width >= 4 {
                        *scores.entry((column, MappedField::Sku)).or_default() += 0.5;
                    }
                }
            }
        }

        let average_widths = widths
            .iter()
            .map(|(column, values)| {
                let total: usize = values.iter().sum();
                (*column, total as f64 / values.len() as f64)
            })
            .collect::<HashMap<usize, f64>>();

        let max_width = average_widths.values().copied().fold(0.0_f64, f64::max);
        if max_width > 0.0 {
            for (column, width) in &average_widths {
                if *width > max_width * WIDE_COLUMN_RATIO {
                    *scores.entry((*column, MappedField::ProductName)).or_default() += 0.5;
                }
            }
        }

        let mut assigned = mapping.assigned_columns();
        for field in ASSIGNMENT_PRIORITY {
            if mapping.get(field).is_some() {
                continue;
            }

            let mut best: Option<(usize, f64)> = None;
            for column in 0..num_cols {
                if assigned.contains(&column) {
                    continue;
                }
                let score = scores.get(&(column, field)).copied().unwrap_or(0.0);
                if score > best.map(|(_, value)| value).unwrap_or(0.0) {
                    best = Some((column, score));
                }
            }

            if let Some((column, score)) = best
                && score >= MIN_CONTENT_SCORE
            {
                mapping.set(field, column);
                assigned.insert(column);
            }
        }

        mapping
    }

    pub fn find_count_column(&self, table: &Table) -> Option<usize> {
        let num_cols = table.rows.iter().map(Vec::len).max().unwrap_or(0);

        let mut best: Option<(usize, f64)> = None;
        for column in 2..num_cols {
            let mut count_matches = 0usize;
            let mut total_cells = 0usize;

            for row in &table.rows {
                let Some(cell) = row.get(column) else {
                    continue;
                };
                let text = cell.text.trim();
                if text.is_empty() {
                    continue;
                }
                total_cells += 1;
                if self.patterns.is_count_cell(text) {
                    count_matches += 1;
                }
            }

            if total_cells == 0 || count_matches == 0 {
                continue;
            }

            let match_rate = count_matches as f64 / total_cells as f64;
            let min_rate = if total_cells <= 2 { 1.0 } else { 0.5 };
            if match_rate >= min_rate && match_rate > best.map(|(_, rate)| rate).unwrap_or(0.0) {
                best = Some((column, match_rate));
            }
        }

        best.map(|(column, _)| column)
    }
}

fn mapped_identifier(field: IdentifierField) -> MappedField {
    match field {
        IdentifierField::Upc => MappedField::Upc,
        IdentifierField::Sku => MappedField::Sku,
        IdentifierField::ItemNo => MappedField::ItemNo,
    }
}
