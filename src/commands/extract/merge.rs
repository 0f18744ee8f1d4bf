use std::collections::{BTreeMap, HashMap};

use crate::model::{FieldLocation, Product};

pub fn merge_extractions(lists: &[Vec<Product>]) -> Vec<Product> {
    let mut order = Vec::<(String, usize)>::new();
    let mut groups = HashMap::<(String, usize), Vec<Product>>::new();

    for list in lists {
        for product in list {
            if product.item_no.is_empty() {
                continue;
            }

            let key = (product.item_no.clone(), product.page_number);
            let candidates = groups.entry(key.clone()).or_insert_with(|| {
                order.push(key);
                Vec::new()
            });
            candidates.push(product.clone());
        }
    }

    let mut merged = Vec::with_capacity(order.len());
    for key in &order {
        let Some(candidates) = groups.get(key) else {
            continue;
        };

        if candidates.len() == 1 {
            merged.push(candidates[0].clone());
        } else if let Some(product) = merge_variants(candidates) {
            merged.push(product);
        }
    }

    merged
}

pub fn merge_variants(candidates: &[Product]) -> Option<Product> {
    let base = candidates.first()?;

    let mut best_name = base.product_name.clone();
    for candidate in &candidates[1..] {
        if !candidate.product_name.is_empty()
            && candidate.product_name.chars().count() > best_name.chars().count()
        {
            best_name = candidate.product_name.clone();
        }
    }

    let description = best_field(candidates, "description", |product| &product.description);
    let pkg = best_field(candidates, "pkg", |product| &product.pkg);
    let uom = best_field(candidates, "uom", |product| &product.uom);

    let mut locations = BTreeMap::<String, FieldLocation>::new();
    for candidate in candidates {
        for (field, location) in &candidate.field_locations {
            let replace = locations
                .get(field)
                .map(|existing| location.confidence > existing.confidence)
                .unwrap_or(true);
            if replace {
                locations.insert(field.clone(), *location);
            }
        }
    }

    let mut product = Product::new(best_name, base.page_number, &base.source_file);
    product.item_no = base.item_no.clone();
    product.description = description;
    product.pkg = pkg;
    product.uom = uom;
    product.field_locations = locations;
    Some(product)
}

fn best_field<'a>(
    candidates: &'a [Product],
    field: &str,
    value_of: impl Fn(&'a Product) -> &'a String,
) -> String {
    let mut best_value = value_of(&candidates[0]).clone();
    let mut best_confidence = candidates[0].field_confidence(field);

    for candidate in &candidates[1..] {
        let confidence = candidate.field_confidence(field);
        let value = value_of(candidate);
        if confidence > best_confidence && !value.is_empty() {
            best_value = value.clone();
            best_confidence = confidence;
        }
    }

    best_value
}
