use crate::model::Product;

use super::patterns::PatternLibrary;

pub fn validate_record(patterns: &PatternLibrary, product: &Product) -> bool {
    if patterns.is_false_positive_identifier(&product.item_no) {
        return false;
    }

    if !product.product_name.is_empty() {
        let name = product.product_name.trim();
        if name.ends_with(':') {
            return false;
        }
        if name.chars().count() < 3 {
            return false;
        }
    }

    true
}

pub fn filter_valid(patterns: &PatternLibrary, products: Vec<Product>) -> Vec<Product> {
    products
        .into_iter()
        .filter(|product| validate_record(patterns, product))
        .collect()
}
