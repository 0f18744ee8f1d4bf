use crate::model::Product;

use super::patterns::{PatternLibrary, combine_identifiers};
use super::source::PageContent;

const LOOK_AHEAD_LIMIT: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    Scanning,
    AccumulatingDescription(Vec<String>),
}

impl ScanState {
    pub fn take_pending(&mut self) -> Vec<String> {
        match std::mem::replace(self, ScanState::Scanning) {
            ScanState::Scanning => Vec::new(),
            ScanState::AccumulatingDescription(lines) => lines,
        }
    }

    pub fn take_pending_name(&mut self) -> String {
        self.take_pending().join(" ")
    }

    pub fn push_line(&mut self, line: &str) {
        match self {
            ScanState::Scanning => {
                *self = ScanState::AccumulatingDescription(vec![line.to_string()]);
            }
            ScanState::AccumulatingDescription(lines) => lines.push(line.to_string()),
        }
    }
}

#[derive(Debug, Default)]
pub struct LookAhead {
    pub uom: Option<String>,
    pub description: Vec<String>,
}

#[derive(Debug)]
pub struct TextFallbackParser<'p> {
    patterns: &'p PatternLibrary,
}

impl<'p> TextFallbackParser<'p> {
    pub fn new(patterns: &'p PatternLibrary) -> Self {
        Self { patterns }
    }

    pub fn parse(&self, page: &PageContent, source_file: &str) -> Vec<Product> {
        let mut products = Vec::new();
        let mut state = ScanState::Scanning;
        let lines = &page.lines;

        for (index, raw_line) in lines.iter().enumerate() {
            let line = raw_line.trim();

            if self.patterns.is_skip_text(line) {
                state.take_pending();
                continue;
            }

            if let Some(dual) = self.patterns.match_dual_id(line) {
                let name = prepend_pending(&mut state, dual.name);
                let (pkg, uom) = self.patterns.parse_count_uom(&dual.count);

                let mut product = Product::new(name, page.page_number, source_file);
                product.item_no = combine_identifiers(&dual.upc, &dual.sku, "");
                product.pkg = pkg;
                product.uom = uom;
                products.push(product);
                continue;
            }

            if let Some(single) = self.patterns.match_product_line(line) {
                let name = prepend_pending(&mut state, single.name);
                let (pkg, uom) = self.patterns.parse_count_uom(&single.count);

                let mut product = Product::new(name, page.page_number, source_file);
                product.item_no = single.item_no;
                product.pkg = pkg;
                product.uom = uom;
                products.push(product);
                continue;
            }

            if let Some(item) = self.patterns.match_multiline_item(line) {
                let name = state.take_pending_name();
                let (pkg, uom) = self.patterns.parse_count_uom(&item.count);

                let mut product = Product::new(name, page.page_number, source_file);
                product.item_no = item.item_no;
                product.pkg = pkg;
                product.uom = uom;
                products.push(product);
                continue;
            }

            if let Some(card) = self.patterns.match_code_price(line) {
                let name = state.take_pending_name();

                let mut product = Product::new(name, page.page_number, source_file);
                product.item_no = card.item_no;
                product.pkg = "1".to_string();
                product.uom = card.uom;
                products.push(product);
                continue;
            }

            if let Some(prefix) = self.patterns.match_item_prefix(line) {
                let mut name = prepend_pending(&mut state, prefix.rest);

                let ahead = self.look_ahead(lines, index + 1);
                for extra in &ahead.description {
                    if name.is_empty() {
                        name = extra.clone();
                    } else {
                        name.push(' ');
                        name.push_str(extra);
                    }
                }

                if self.patterns.is_identifier(&prefix.item_no) {
                    let uom = ahead.uom.unwrap_or_default();
                    let mut product = Product::new(name, page.page_number, source_file);
                    product.item_no = prefix.item_no;
                    product.pkg = if uom.is_empty() {
                        String::new()
                    } else {
                        "1".to_string()
                    };
                    product.uom = uom;
                    products.push(product);
                }
                continue;
            }

            if self.patterns.is_identifier(line) {
                let ahead = self.look_ahead(lines, index + 1);
                let mut name = ahead.description.join(" ");
                let pending = state.take_pending_name();
                if name.is_empty() {
                    name = pending;
                }

                let uom = ahead.uom.unwrap_or_default();
                let mut product = Product::new(name, page.page_number, source_file);
                product.item_no = line.to_string();
                product.pkg = if uom.is_empty() {
                    String::new()
                } else {
                    "1".to_string()
                };
                product.uom = uom;
                products.push(product);
                continue;
            }

            if !line.is_empty()
                && !line.starts_with('$')
                && !self.patterns.is_bare_number(line)
                && !self.patterns.is_section_heading(line)
            {
                state.push_line(line);
            }
        }

        products
    }

    pub fn look_ahead(&self, lines: &[String], from: usize) -> LookAhead {
        let mut result = LookAhead::default();

        for raw_line in lines.iter().skip(from).take(LOOK_AHEAD_LIMIT) {
            let line = raw_line.trim();

            if let Some(uom) = self.patterns.find_price_uom(line) {
                result.uom = Some(uom);
                break;
            }

            let first_token = line.split_whitespace().next().unwrap_or("");
            if self.patterns.has_item_prefix(line) || self.patterns.is_identifier(first_token) {
                break;
            }

            if !line.is_empty() && !line.starts_with('$') {
                result.description.push(line.to_string());
            }
        }

        result
    }
}

fn prepend_pending(state: &mut ScanState, name: String) -> String {
    let pending = state.take_pending_name();
    if pending.is_empty() {
        name
    } else if name.is_empty() {
        pending
    } else {
        format!("{pending} {name}")
    }
}
