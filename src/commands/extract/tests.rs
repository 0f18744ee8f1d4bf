use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use anyhow::{Result, bail};

use crate::model::{FieldLocation, Product};

use super::column_map::ColumnDetector;
use super::markdown_tables::parse_markdown_tables;
use super::merge::merge_extractions;
use super::patterns::{IdentifierField, PatternLibrary, clean_product_name, combine_identifiers};
use super::pipeline::{PagePipeline, mean_field_confidence, method_order, stamp_text_confidence};
use super::row_classify::{RowKind, classify_row};
use super::source::{
    BBox, BackendOutput, CatalogDump, Cell, DumpSource, MethodKind, PageClassification,
    PageContent, PageSource, Table,
};
use super::table_records::build_records;
use super::text_fallback::{ScanState, TextFallbackParser};
use super::validate::{filter_valid, validate_record};

fn patterns() -> PatternLibrary {
    PatternLibrary::new().expect("pattern library compiles")
}

fn cell(text: &str) -> Cell {
    Cell::text_only(text)
}

fn located_cell(text: &str) -> Cell {
    Cell {
        text: text.to_string(),
        bbox: Some(BBox {
            x0: 0.0,
            y0: 0.0,
            x1: 10.0,
            y1: 10.0,
        }),
    }
}

fn table(rows: Vec<Vec<Cell>>) -> Table {
    Table { bbox: None, rows }
}

fn classification(is_scanned: bool, has_borders: bool, layout: &str) -> PageClassification {
    let json = format!(
        "{{\"is_scanned\": {is_scanned}, \"has_borders\": {has_borders}, \"layout\": \"{layout}\"}}"
    );
    serde_json::from_str(&json).expect("classification parses")
}

#[test]
fn is_identifier_accepts_catalog_code_shapes() {
    let patterns = patterns();

    for value in ["12345", "1234", "PMS989803150181", "TTRS-42", "BJ100120", "TSTAG1", "CS-2"] {
        assert!(patterns.is_identifier(value), "expected identifier: {value}");
    }

    for value in ["", "123", "ABC-DEF", "Nylon", "Blue Widget"] {
        assert!(!patterns.is_identifier(value), "unexpected identifier: {value}");
    }
}

#[test]
fn false_positive_flags_specification_values() {
    let patterns = patterns();

    for value in [
        "75kg",
        "200x85x203cm",
        "IP65",
        "Class II",
        "EN 597-1",
        "Nylon",
        "10-20",
        "50%",
        "12V",
        "10bar",
        "500ml",
        "100rpm",
        "Weight:",
        "Yes",
        "Analog Pump",
        "High MVTR 4 stretch",
    ] {
        assert!(
            patterns.is_false_positive_identifier(value),
            "expected false positive: {value}"
        );
    }

    for value in ["12345", "TTRS-42", "012345678901 / ABC123", ""] {
        assert!(
            !patterns.is_false_positive_identifier(value),
            "unexpected false positive: {value}"
        );
    }
}

#[test]
fn parse_count_uom_round_trips() {
    let patterns = patterns();

    assert_eq!(
        patterns.parse_count_uom("1,000 ct."),
        ("1000".to_string(), "ct".to_string())
    );
    assert_eq!(
        patterns.parse_count_uom("2,500/RL"),
        ("2500".to_string(), "rl".to_string())
    );
    assert_eq!(
        patterns.parse_count_uom("32 ct"),
        ("32".to_string(), "ct".to_string())
    );
    assert_eq!(
        patterns.parse_count_uom("100 pk"),
        ("100".to_string(), "pk".to_string())
    );
    assert_eq!(patterns.parse_count_uom(""), (String::new(), String::new()));
    assert_eq!(
        patterns.parse_count_uom("100 widgets"),
        ("100".to_string(), "widgets".to_string())
    );
    assert_eq!(
        patterns.parse_count_uom("ct"),
        (String::new(), "ct".to_string())
    );
}

#[test]
fn combine_identifiers_orders_and_dedupes() {
    assert_eq!(
        combine_identifiers("012345678901", "ABC123", ""),
        "012345678901 / ABC123"
    );
    assert_eq!(
        combine_identifiers("012345678901", "012345678901", "12345"),
        "012345678901 / 12345"
    );
    assert_eq!(combine_identifiers("", "", "12345"), "12345");
    assert_eq!(combine_identifiers("", "", ""), "");
}

#[test]
fn clean_product_name_collapses_whitespace() {
    assert_eq!(clean_product_name("  Blue \n  Widget  "), "Blue Widget");
    assert_eq!(clean_product_name(""), "");
}

#[test]
fn classify_row_requires_header_majority_for_small_rows() {
    let patterns = patterns();

    let header = vec![cell("Item #"), cell("Description"), cell("Count")];
    assert_eq!(classify_row(&patterns, &header), RowKind::Header);

    let product = vec![cell("12345"), cell("Description")];
    assert_eq!(classify_row(&patterns, &product), RowKind::Data);

    let wide = vec![
        cell("Item #"),
        cell("Description"),
        cell("32 ct."),
        cell("$4.99"),
    ];
    assert_eq!(classify_row(&patterns, &wide), RowKind::Header);
}

#[test]
fn classify_row_flags_footer_notes_as_skip() {
    let patterns = patterns();

    let footer = vec![cell(""), cell("See Page 12 for details")];
    assert_eq!(classify_row(&patterns, &footer), RowKind::Skip);

    let starred = vec![cell("* Prices subject to change")];
    assert_eq!(classify_row(&patterns, &starred), RowKind::Skip);
}

#[test]
fn map_by_headers_finds_identifier_name_and_count_columns() {
    let patterns = patterns();
    let detector = ColumnDetector::new(&patterns);

    let table = table(vec![
        vec![cell("Item #"), cell("Description"), cell("Count")],
        vec![cell("12345"), cell("Blue Widget"), cell("32 ct.")],
    ]);

    let mapping = detector.map_by_headers(&table);
    assert_eq!(mapping.item_no, Some(0));
    assert_eq!(mapping.product_name, Some(1));
    assert_eq!(mapping.count, Some(2));
    assert_eq!(mapping.upc, None);
}

#[test]
fn map_by_headers_honors_identifier_priority() {
    let patterns = patterns();

    let table = table(vec![
        vec![cell("UPC"), cell("Item #")],
        vec![cell("012345678901"), cell("12345")],
    ]);

    let default_detector = ColumnDetector::new(&patterns);
    let mapping = default_detector.map_by_headers(&table);
    assert_eq!(mapping.upc, Some(0));
    assert_eq!(mapping.item_no, Some(1));

    let item_only = ColumnDetector::new(&patterns)
        .with_identifier_priority(vec![IdentifierField::ItemNo]);
    let mapping = item_only.map_by_headers(&table);
    assert_eq!(mapping.upc, None);
    assert_eq!(mapping.item_no, Some(1));
}

#[test]
fn map_columns_recovers_mapping_from_content_signals() {
    let patterns = patterns();
    let detector = ColumnDetector::new(&patterns);

    let table = table(vec![
        vec![
            cell("12345"),
            cell("Blue Widget Deluxe Gift Pack"),
            cell("32 ct."),
            cell("$4.99"),
        ],
        vec![
            cell("23456"),
            cell("Red Widget Economy Bundle"),
            cell("100 pk"),
            cell("$9.99"),
        ],
        vec![
            cell("34567"),
            cell("Green Widget Family Size Carton"),
            cell("1,000 ct."),
            cell("$19.99"),
        ],
    ]);

    let mapping = detector.map_columns(&table);
    assert_eq!(mapping.item_no, Some(0));
    assert_eq!(mapping.product_name, Some(1));
    assert_eq!(mapping.count, Some(2));
    assert_eq!(mapping.price, Some(3));
}

#[test]
fn find_count_column_requires_match_rate() {
    let patterns = patterns();
    let detector = ColumnDetector::new(&patterns);

    let counts = table(vec![
        vec![cell("12345"), cell("Blue Widget"), cell("32 ct.")],
        vec![cell("23456"), cell("Red Widget"), cell("100 pk")],
    ]);
    assert_eq!(detector.find_count_column(&counts), Some(2));

    let descriptions = table(vec![
        vec![cell("12345"), cell("Blue Widget"), cell("assorted colors")],
        vec![cell("23456"), cell("Red Widget"), cell("new for spring")],
    ]);
    assert_eq!(detector.find_count_column(&descriptions), None);
}

#[test]
fn build_records_extracts_product_and_drops_specification_row() {
    let patterns = patterns();
    let detector = ColumnDetector::new(&patterns);

    let table = table(vec![
        vec![cell("Item #"), cell("Description"), cell("Count")],
        vec![cell("12345"), cell("Blue Widget"), cell("32 ct.")],
        vec![cell("Weight:"), cell("75kg"), cell("")],
    ]);

    let records = build_records(&patterns, &detector, &table, 4, "catalog.pdf", 1.0);
    let records = filter_valid(&patterns, records);

    assert_eq!(records.len(), 1);
    let product = &records[0];
    assert_eq!(product.item_no, "12345");
    assert_eq!(product.product_name, "Blue Widget");
    assert_eq!(product.pkg, "32");
    assert_eq!(product.uom, "ct");
    assert_eq!(product.page_number, 4);
    assert_eq!(product.source_file, "catalog.pdf");
}

#[test]
fn build_records_combines_upc_and_sku_identifiers() {
    let patterns = patterns();
    let detector = ColumnDetector::new(&patterns);

    let table = table(vec![
        vec![cell("UPC"), cell("SKU"), cell("Description"), cell("Count")],
        vec![
            cell("012345678901"),
            cell("ABC123"),
            cell("Acne Control Cleanser"),
            cell("8 oz"),
        ],
    ]);

    let records = build_records(&patterns, &detector, &table, 1, "catalog.pdf", 1.0);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].item_no, "012345678901 / ABC123");
    assert_eq!(records[0].uom, "oz");
}

#[test]
fn build_records_falls_back_to_positional_columns() {
    let patterns = patterns();
    let detector = ColumnDetector::new(&patterns).with_sample_rows(2);

    let table = table(vec![
        vec![cell(""), cell("Filler A")],
        vec![cell(""), cell("Filler B")],
        vec![cell("12345"), cell("Blue Widget")],
    ]);

    let records = build_records(&patterns, &detector, &table, 1, "catalog.pdf", 1.0);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].item_no, "12345");
    assert_eq!(records[0].product_name, "Blue Widget");
}

#[test]
fn build_records_stamps_field_locations_at_caller_confidence() {
    let patterns = patterns();
    let detector = ColumnDetector::new(&patterns);

    let table = table(vec![
        vec![
            located_cell("Item #"),
            located_cell("Description"),
            located_cell("Count"),
        ],
        vec![
            located_cell("12345"),
            located_cell("Blue Widget"),
            located_cell("32 ct."),
        ],
    ]);

    let records = build_records(&patterns, &detector, &table, 2, "catalog.pdf", 0.95);
    assert_eq!(records.len(), 1);

    let locations = &records[0].field_locations;
    for field in ["item_no", "product_name", "pkg", "uom"] {
        let location = locations.get(field).expect("field location recorded");
        assert_eq!(location.confidence, 0.95);
        assert_eq!(location.page_number, 2);
    }
}

#[test]
fn parse_markdown_tables_recovers_pipe_tables() {
    let text = "Intro paragraph\n\n| Item # | Description | Count |\n|---|---|---|\n| 12345 | Blue Widget | 32 ct. |\n\nTrailing text";

    let tables = parse_markdown_tables(text);
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].rows.len(), 2);
    assert_eq!(tables[0].rows[1][0].text, "12345");

    assert!(parse_markdown_tables("no tables here").is_empty());
    assert!(parse_markdown_tables("| lonely | row |").is_empty());
}

#[test]
fn scan_state_transitions_between_scanning_and_accumulating() {
    let mut state = ScanState::Scanning;
    assert!(state.take_pending().is_empty());

    state.push_line("Blue Widget");
    state.push_line("Deluxe Edition");
    assert_eq!(
        state,
        ScanState::AccumulatingDescription(vec![
            "Blue Widget".to_string(),
            "Deluxe Edition".to_string(),
        ])
    );

    assert_eq!(state.take_pending_name(), "Blue Widget Deluxe Edition");
    assert_eq!(state, ScanState::Scanning);
}

#[test]
fn text_fallback_emits_record_from_item_prefix_lines() {
    let patterns = patterns();
    let parser = TextFallbackParser::new(&patterns);

    let page = PageContent {
        page_number: 3,
        lines: vec![
            "Item # TTRS-42".to_string(),
            "Blue Widget".to_string(),
            "$12.00 /EACH".to_string(),
        ],
        raw_text: String::new(),
    };

    let products = parser.parse(&page, "catalog.pdf");
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].item_no, "TTRS-42");
    assert_eq!(products[0].product_name, "Blue Widget");
    assert_eq!(products[0].pkg, "1");
    assert_eq!(products[0].uom, "each");
    assert_eq!(products[0].page_number, 3);
}

#[test]
fn text_fallback_parses_dual_identifier_lines() {
    let patterns = patterns();
    let parser = TextFallbackParser::new(&patterns);

    let page = PageContent {
        page_number: 1,
        lines: vec!["A1 446761 ACNE CONTROL CLEANSER 8 OZ $16.00".to_string()],
        raw_text: String::new(),
    };

    let products = parser.parse(&page, "catalog.pdf");
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].item_no, "A1 / 446761");
    assert_eq!(products[0].product_name, "ACNE CONTROL CLEANSER");
    assert_eq!(products[0].pkg, "8");
    assert_eq!(products[0].uom, "oz");
}

#[test]
fn text_fallback_parses_single_line_products() {
    let patterns = patterns();
    let parser = TextFallbackParser::new(&patterns);

    let page = PageContent {
        page_number: 1,
        lines: vec!["12345 Blue Widget 32 ct. $4.99".to_string()],
        raw_text: String::new(),
    };

    let products = parser.parse(&page, "catalog.pdf");
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].item_no, "12345");
    assert_eq!(products[0].product_name, "Blue Widget");
    assert_eq!(products[0].pkg, "32");
    assert_eq!(products[0].uom, "ct");
}

#[test]
fn text_fallback_attaches_pending_description_to_multiline_items() {
    let patterns = patterns();
    let parser = TextFallbackParser::new(&patterns);

    let page = PageContent {
        page_number: 1,
        lines: vec![
            "Blue Widget Deluxe".to_string(),
            "12345 32 ct. $4.99".to_string(),
        ],
        raw_text: String::new(),
    };

    let products = parser.parse(&page, "catalog.pdf");
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].item_no, "12345");
    assert_eq!(products[0].product_name, "Blue Widget Deluxe");
    assert_eq!(products[0].pkg, "32");
}

#[test]
fn text_fallback_parses_product_card_lines() {
    let patterns = patterns();
    let parser = TextFallbackParser::new(&patterns);

    let page = PageContent {
        page_number: 1,
        lines: vec![
            "Handy Brace".to_string(),
            "PMS989803150181 $42.26 /EACH".to_string(),
        ],
        raw_text: String::new(),
    };

    let products = parser.parse(&page, "catalog.pdf");
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].item_no, "PMS989803150181");
    assert_eq!(products[0].product_name, "Handy Brace");
    assert_eq!(products[0].pkg, "1");
    assert_eq!(products[0].uom, "each");
}

#[test]
fn text_fallback_clears_pending_description_on_skip_lines() {
    let patterns = patterns();
    let parser = TextFallbackParser::new(&patterns);

    let page = PageContent {
        page_number: 1,
        lines: vec![
            "Stale description".to_string(),
            "Please note delivery times".to_string(),
            "12345 32 ct. $4.99".to_string(),
        ],
        raw_text: String::new(),
    };

    let products = parser.parse(&page, "catalog.pdf");
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].product_name, "");
}

#[test]
fn text_fallback_ignores_section_headings() {
    let patterns = patterns();
    let parser = TextFallbackParser::new(&patterns);

    let page = PageContent {
        page_number: 1,
        lines: vec![
            "CLEANING SUPPLIES".to_string(),
            "12345 32 ct. $4.99".to_string(),
        ],
        raw_text: String::new(),
    };

    let products = parser.parse(&page, "catalog.pdf");
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].product_name, "");
}

#[test]
fn look_ahead_is_bounded_to_four_lines() {
    let patterns = patterns();
    let parser = TextFallbackParser::new(&patterns);

    let lines = vec![
        "one".to_string(),
        "two".to_string(),
        "three".to_string(),
        "four".to_string(),
        "$12.00 /EACH".to_string(),
    ];

    let ahead = parser.look_ahead(&lines, 0);
    assert_eq!(ahead.uom, None);
    assert_eq!(ahead.description.len(), 4);
}

#[test]
fn look_ahead_stops_at_next_identifier_line() {
    let patterns = patterns();
    let parser = TextFallbackParser::new(&patterns);

    let lines = vec![
        "Some description".to_string(),
        "67890 32 ct. $1.00".to_string(),
        "$12.00 /EACH".to_string(),
    ];

    let ahead = parser.look_ahead(&lines, 0);
    assert_eq!(ahead.uom, None);
    assert_eq!(ahead.description, vec!["Some description".to_string()]);
}

#[test]
fn validate_record_drops_specification_shapes() {
    let patterns = patterns();

    let mut spec_label = Product::new("Weight:", 1, "catalog.pdf");
    spec_label.item_no = "12345".to_string();
    assert!(!validate_record(&patterns, &spec_label));

    let mut short_name = Product::new("ab", 1, "catalog.pdf");
    short_name.item_no = "12345".to_string();
    assert!(!validate_record(&patterns, &short_name));

    let mut false_positive = Product::new("Blue Widget", 1, "catalog.pdf");
    false_positive.item_no = "75kg".to_string();
    assert!(!validate_record(&patterns, &false_positive));

    let mut unnamed = Product::new("", 1, "catalog.pdf");
    unnamed.item_no = "12345".to_string();
    assert!(validate_record(&patterns, &unnamed));

    let mut valid = Product::new("Blue Widget", 1, "catalog.pdf");
    valid.item_no = "12345".to_string();
    assert!(validate_record(&patterns, &valid));
}

#[test]
fn merge_prefers_longest_name_and_highest_confidence_fields() {
    let mut short_name = Product::new("Widget", 3, "catalog.pdf");
    short_name.item_no = "1234".to_string();
    short_name.pkg = "32".to_string();
    short_name.uom = "ct".to_string();
    for field in ["product_name", "pkg", "uom"] {
        short_name
            .field_locations
            .insert(field.to_string(), FieldLocation::synthetic(3, 0.8));
    }

    let mut long_name = Product::new("Blue Widget Deluxe", 3, "catalog.pdf");
    long_name.item_no = "1234".to_string();
    long_name
        .field_locations
        .insert("product_name".to_string(), FieldLocation::synthetic(3, 0.5));

    let merged = merge_extractions(&[vec![short_name], vec![long_name]]);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].product_name, "Blue Widget Deluxe");
    assert_eq!(merged[0].pkg, "32");
    assert_eq!(merged[0].uom, "ct");
    assert_eq!(merged[0].field_confidence("product_name"), 0.8);
}

#[test]
fn merge_is_idempotent_for_identical_result_lists() {
    let mut product = Product::new("Blue Widget", 3, "catalog.pdf");
    product.item_no = "1234".to_string();
    product.pkg = "32".to_string();

    let once = merge_extractions(&[vec![product.clone()]]);
    let twice = merge_extractions(&[vec![product.clone()], vec![product.clone()]]);

    assert_eq!(once.len(), 1);
    assert_eq!(twice.len(), 1);
    assert_eq!(once[0].item_no, twice[0].item_no);
    assert_eq!(once[0].product_name, twice[0].product_name);
    assert_eq!(once[0].pkg, twice[0].pkg);
}

#[test]
fn merge_keys_by_page_as_well_as_identifier() {
    let mut page_three = Product::new("Blue Widget", 3, "catalog.pdf");
    page_three.item_no = "1234".to_string();
    let mut page_seven = Product::new("Different Widget", 7, "catalog.pdf");
    page_seven.item_no = "1234".to_string();

    let merged = merge_extractions(&[vec![page_three], vec![page_seven]]);
    assert_eq!(merged.len(), 2);
}

#[test]
fn merge_drops_records_without_identifiers() {
    let unnamed = Product::new("Blue Widget", 3, "catalog.pdf");
    let merged = merge_extractions(&[vec![unnamed]]);
    assert!(merged.is_empty());
}

#[test]
fn method_order_follows_page_classification() {
    let scanned = classification(true, false, "mixed");
    assert_eq!(
        method_order(&scanned),
        &[MethodKind::TableStructure, MethodKind::DocumentLayout]
    );

    let bordered = classification(false, true, "tabular");
    let order = method_order(&bordered);
    assert_eq!(order.first(), Some(&MethodKind::BorderGrid));
    assert_eq!(order.len(), 4);

    let borderless = classification(false, false, "borderless");
    assert_eq!(method_order(&borderless).first(), Some(&MethodKind::BorderlessGrid));

    let text_only = classification(false, false, "text-only");
    assert_eq!(
        method_order(&text_only),
        &[MethodKind::LayoutMarkdown, MethodKind::TextLayout]
    );

    let mixed = classification(false, false, "mixed");
    assert_eq!(method_order(&mixed).len(), 8);
    assert_eq!(method_order(&mixed).first(), Some(&MethodKind::BorderGrid));
}

#[test]
fn mean_field_confidence_is_zero_without_locations() {
    let product = Product::new("Blue Widget", 1, "catalog.pdf");
    assert_eq!(mean_field_confidence(&[product]), 0.0);
}

#[test]
fn stamp_text_confidence_inserts_and_raises_only_lower() {
    let mut product = Product::new("Blue Widget", 1, "catalog.pdf");
    product
        .field_locations
        .insert("pkg".to_string(), FieldLocation::synthetic(1, 0.9));

    let mut records = vec![product];
    stamp_text_confidence(&mut records, 1, 0.5);

    assert_eq!(records[0].field_confidence("pkg"), 0.9);
    assert_eq!(records[0].field_confidence("item_no"), 0.5);
    assert_eq!(records[0].field_confidence("product_name"), 0.5);
}

struct StubSource {
    classification: PageClassification,
    captures: HashMap<&'static str, BackendOutput>,
    failing: HashSet<&'static str>,
    lines: Vec<String>,
    calls: RefCell<Vec<&'static str>>,
}

impl StubSource {
    fn new(classification: PageClassification) -> Self {
        Self {
            classification,
            captures: HashMap::new(),
            failing: HashSet::new(),
            lines: Vec::new(),
            calls: RefCell::new(Vec::new()),
        }
    }

    fn with_capture(mut self, kind: MethodKind, output: BackendOutput) -> Self {
        self.captures.insert(kind.as_str(), output);
        self
    }

    fn with_failure(mut self, kind: MethodKind) -> Self {
        self.failing.insert(kind.as_str());
        self
    }

    fn with_lines(mut self, lines: &[&str]) -> Self {
        self.lines = lines.iter().map(ToString::to_string).collect();
        self
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }
}

impl PageSource for StubSource {
    fn source_file(&self) -> &str {
        "stub.pdf"
    }

    fn page_count(&self) -> usize {
        1
    }

    fn classification(&self, _page_number: usize) -> PageClassification {
        self.classification
    }

    fn capture(&self, kind: MethodKind, _page_number: usize) -> Result<Option<BackendOutput>> {
        self.calls.borrow_mut().push(kind.as_str());
        if self.failing.contains(kind.as_str()) {
            bail!("backend crashed");
        }
        Ok(self.captures.get(kind.as_str()).cloned())
    }

    fn page_content(&self, page_number: usize) -> PageContent {
        PageContent {
            page_number,
            lines: self.lines.clone(),
            raw_text: self.lines.join("\n"),
        }
    }
}

fn bordered_table() -> Table {
    table(vec![
        vec![
            located_cell("Item #"),
            located_cell("Description"),
            located_cell("Count"),
        ],
        vec![
            located_cell("12345"),
            located_cell("Blue Widget"),
            located_cell("32 ct."),
        ],
    ])
}

#[test]
fn pipeline_accepts_first_high_confidence_method_and_stops() {
    let patterns = patterns();
    let source = StubSource::new(classification(false, true, "tabular"))
        .with_capture(
            MethodKind::BorderGrid,
            BackendOutput::Tables(vec![bordered_table()]),
        )
        .with_capture(
            MethodKind::CellMatrix,
            BackendOutput::Tables(vec![bordered_table()]),
        );

    let mut pipeline = PagePipeline::new(&source, &patterns);
    let products = pipeline.run_page(1);

    assert_eq!(products.len(), 1);
    assert_eq!(products[0].item_no, "12345");
    assert_eq!(source.calls(), vec!["border_grid"]);

    let stats = pipeline.stats();
    assert_eq!(stats.accepted_pages, 1);
    assert_eq!(stats.method_usage.get("border_grid"), Some(&1));
}

#[test]
fn pipeline_merges_sub_threshold_results() {
    let patterns = patterns();

    let markdown =
        "| Item # | Description | Count |\n|---|---|---|\n| 12345 | Blue Widget | 32 ct. |";
    let source = StubSource::new(classification(false, false, "text-only"))
        .with_capture(
            MethodKind::LayoutMarkdown,
            BackendOutput::Markdown(markdown.to_string()),
        )
        .with_capture(
            MethodKind::TextLayout,
            BackendOutput::Lines(vec!["12345 Blue Widget Deluxe 32 ct. $4.99".to_string()]),
        );

    let mut pipeline = PagePipeline::new(&source, &patterns);
    let products = pipeline.run_page(1);

    assert_eq!(source.calls(), vec!["layout_markdown", "text_layout"]);
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].item_no, "12345");
    assert_eq!(products[0].product_name, "Blue Widget Deluxe");
    assert_eq!(products[0].pkg, "32");

    let stats = pipeline.stats();
    assert_eq!(stats.merged_pages, 1);
    assert_eq!(stats.method_usage.get("merged"), Some(&1));
}

#[test]
fn pipeline_falls_back_to_regex_parsing_when_methods_produce_nothing() {
    let patterns = patterns();
    let source = StubSource::new(classification(false, false, "text-only")).with_lines(&[
        "Item # TTRS-42",
        "Blue Widget",
        "$12.00 /EACH",
    ]);

    let mut pipeline = PagePipeline::new(&source, &patterns);
    let products = pipeline.run_page(1);

    assert_eq!(products.len(), 1);
    assert_eq!(products[0].item_no, "TTRS-42");
    assert_eq!(products[0].uom, "each");
    assert_eq!(products[0].field_confidence("item_no"), 0.5);

    let stats = pipeline.stats();
    assert_eq!(stats.fallback_pages, 1);
    assert_eq!(stats.method_usage.get("regex_fallback"), Some(&1));
    assert!(stats.empty_pages.is_empty());
}

#[test]
fn pipeline_records_empty_pages_without_failing() {
    let patterns = patterns();
    let source = StubSource::new(classification(false, false, "text-only"));

    let mut pipeline = PagePipeline::new(&source, &patterns);
    let products = pipeline.run_page(1);

    assert!(products.is_empty());
    assert_eq!(pipeline.stats().empty_pages, vec![1]);
}

#[test]
fn pipeline_treats_backend_failure_as_zero_records() {
    let patterns = patterns();
    let source = StubSource::new(classification(false, true, "tabular"))
        .with_failure(MethodKind::BorderGrid)
        .with_capture(
            MethodKind::CellMatrix,
            BackendOutput::Tables(vec![bordered_table()]),
        );

    let mut pipeline = PagePipeline::new(&source, &patterns);
    let products = pipeline.run_page(1);

    assert_eq!(products.len(), 1);
    assert_eq!(source.calls(), vec!["border_grid", "cell_matrix"]);

    let stats = pipeline.stats();
    assert_eq!(stats.warnings.len(), 1);
    assert!(stats.warnings[0].contains("border_grid"));
    assert_eq!(stats.method_usage.get("cell_matrix"), Some(&1));
}

#[test]
fn dump_source_normalizes_cells_and_serves_captures() {
    let json = r#"{
        "source_file": "catalog.pdf",
        "pages": [
            {
                "page_number": 1,
                "classification": {"is_scanned": false, "has_borders": true, "layout": "tabular"},
                "raw_text": "Item # TTRS-42\nBlue Widget",
                "methods": {
                    "border_grid": {
                        "tables": [
                            {
                                "bbox": [0, 0, 100, 50],
                                "rows": [
                                    ["Item #", {"text": "Description"}],
                                    [{"text": " 12345 ", "bbox": [0, 10, 20, 20]}, "Blue Widget"]
                                ]
                            }
                        ]
                    }
                }
            }
        ]
    }"#;

    let dump: CatalogDump = serde_json::from_str(json).expect("dump parses");
    let source = DumpSource::from_dump(dump).expect("dump indexes");

    assert_eq!(source.page_count(), 1);
    assert!(source.classification(1).has_borders);

    let capture = source
        .capture(MethodKind::BorderGrid, 1)
        .expect("capture succeeds")
        .expect("capture present");
    let BackendOutput::Tables(tables) = capture else {
        panic!("expected table output");
    };
    assert_eq!(tables[0].rows[1][0].text, "12345");
    assert_eq!(
        tables[0].rows[1][0].bbox,
        Some(BBox {
            x0: 0.0,
            y0: 10.0,
            x1: 20.0,
            y1: 20.0
        })
    );

    assert!(
        source
            .capture(MethodKind::CellMatrix, 1)
            .expect("capture succeeds")
            .is_none()
    );

    let content = source.page_content(1);
    assert_eq!(content.lines, vec!["Item # TTRS-42", "Blue Widget"]);
}
