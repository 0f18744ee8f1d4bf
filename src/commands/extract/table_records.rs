use std::collections::{BTreeMap, HashSet};

use crate::model::{FieldLocation, Product};

use super::column_map::ColumnDetector;
use super::patterns::{IdentifierField, PatternLibrary, clean_product_name, combine_identifiers};
use super::row_classify::{RowKind, classify_row};
use super::source::{BBox, Cell, Table};

pub fn build_records(
    patterns: &PatternLibrary,
    detector: &ColumnDetector<'_>,
    table: &Table,
    page_number: usize,
    source_file: &str,
    confidence: f64,
) -> Vec<Product> {
    let mapping = detector.map_columns(table);
    let count_column = mapping.count.or_else(|| detector.find_count_column(table));
    let use_positional = !mapping.has_identifier_columns();

    let mut products = Vec::new();

    for row in &table.rows {
        if classify_row(patterns, row) != RowKind::Data {
            continue;
        }
        if row.len() < 2 {
            continue;
        }

        let mut upc = String::new();
        let mut sku = String::new();
        let mut item_no = String::new();
        let mut locations = BTreeMap::<String, FieldLocation>::new();
        let mut name_column = mapping.product_name;

        if use_positional {
            item_no = row[0].text.trim().to_string();
            if !patterns.is_identifier(&item_no) {
                continue;
            }
            name_column = Some(1);
            record_location(&mut locations, "item_no", row[0].bbox, page_number, confidence);
        } else {
            let mut has_valid_id = false;

            if let Some(cell) = mapped_cell(row, mapping.identifier_column(IdentifierField::Upc)) {
                let value = cell.text.trim();
                if !value.is_empty() {
                    upc = value.to_string();
                    has_valid_id = true;
                    record_location(&mut locations, "upc", cell.bbox, page_number, confidence);
                }
            }

            if let Some(cell) = mapped_cell(row, mapping.identifier_column(IdentifierField::Sku)) {
                let value = cell.text.trim();
                if !value.is_empty() {
                    sku = value.to_string();
                    has_valid_id = true;
                    record_location(&mut locations, "sku", cell.bbox, page_number, confidence);
                }
            }

            if let Some(cell) = mapped_cell(row, mapping.identifier_column(IdentifierField::ItemNo))
            {
                let value = cell.text.trim();
                if !value.is_empty() {
                    item_no = value.to_string();
                    if patterns.is_identifier(&item_no) {
                        has_valid_id = true;
                        record_location(
                            &mut locations,
                            "item_no",
                            cell.bbox,
                            page_number,
                            confidence,
                        );
                    }
                }
            }

            if !has_valid_id {
                continue;
            }

            if name_column.is_none() {
                name_column = fallback_name_column(row, &mapping.assigned_columns(), count_column);
            }
        }

        let mut product_name = String::new();
        if let Some(cell) = mapped_cell(row, name_column) {
            product_name = clean_product_name(&cell.text);
            record_location(
                &mut locations,
                "product_name",
                cell.bbox,
                page_number,
                confidence,
            );
        }

        if product_name.is_empty() {
            continue;
        }

        let mut pkg = String::new();
        let mut uom = String::new();
        if let Some(cell) = mapped_cell(row, count_column) {
            let (parsed_pkg, parsed_uom) = patterns.parse_count_uom(&cell.text);
            pkg = parsed_pkg;
            uom = parsed_uom;

            if let Some(bbox) = cell.bbox {
                let location = field_location(bbox, page_number, confidence);
                if !pkg.is_empty() {
                    locations.insert("pkg".to_string(), location);
                }
                if !uom.is_empty() {
                    locations.insert("uom".to_string(), location);
                }
            }
        }

        let mut product = Product::new(product_name, page_number, source_file);
        product.item_no = combine_identifiers(&upc, &sku, &item_no);
        product.pkg = pkg;
        product.uom = uom;
        product.field_locations = locations;
        products.push(product);
    }

    products
}

fn mapped_cell(row: &[Cell], column: Option<usize>) -> Option<&Cell> {
    column.and_then(|index| row.get(index))
}

fn fallback_name_column(
    row: &[Cell],
    assigned: &HashSet<usize>,
    count_column: Option<usize>,
) -> Option<usize> {
    for (index, cell) in row.iter().enumerate() {
        if assigned.contains(&index) || count_column == Some(index) {
            continue;
        }
        let text = cell.text.trim();
        if !text.is_empty() && !text.starts_with('$') {
            return Some(index);
        }
    }
    None
}

fn field_location(bbox: BBox, page_number: usize, confidence: f64) -> FieldLocation {
    FieldLocation {
        x0: bbox.x0,
        y0: bbox.y0,
        x1: bbox.x1,
        y1: bbox.y1,
        page_number,
        confidence,
    }
}

fn record_location(
    locations: &mut BTreeMap<String, FieldLocation>,
    field: &str,
    bbox: Option<BBox>,
    page_number: usize,
    confidence: f64,
) {
    if let Some(bbox) = bbox {
        locations.insert(
            field.to_string(),
            field_location(bbox, page_number, confidence),
        );
    }
}
