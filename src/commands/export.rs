use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::ExportArgs;
use crate::model::ExtractionSession;
use crate::util::ensure_directory;

const CSV_COLUMNS: [&str; 7] = [
    "product_name",
    "description",
    "item_no",
    "pkg",
    "uom",
    "page_number",
    "source_file",
];

pub fn run(args: ExportArgs) -> Result<()> {
    let session = ExtractionSession::load(&args.session_path)?;

    let output_path = args.output_path.unwrap_or_else(|| {
        let stem = Path::new(&session.source_file)
            .file_stem()
            .and_then(|value| value.to_str())
            .unwrap_or("products");
        args.cache_root.join("exports").join(format!("{stem}.csv"))
    });

    if let Some(parent) = output_path.parent() {
        ensure_directory(parent)?;
    }

    let csv = render_csv(&session);
    fs::write(&output_path, csv)
        .with_context(|| format!("failed to write {}", output_path.display()))?;

    info!(
        path = %output_path.display(),
        products = session.products.len(),
        "exported session to csv"
    );

    Ok(())
}

fn render_csv(session: &ExtractionSession) -> String {
    let mut lines = vec![CSV_COLUMNS.join(",")];

    for product in &session.products {
        let fields = [
            product.product_name.clone(),
            product.description.clone(),
            product.item_no.clone(),
            product.pkg.clone(),
            product.uom.clone(),
            product.page_number.to_string(),
            product.source_file.clone(),
        ];

        let row = fields
            .iter()
            .map(|field| escape_csv_cell(field))
            .collect::<Vec<String>>()
            .join(",");
        lines.push(row);
    }

    lines.join("\n") + "\n"
}

fn escape_csv_cell(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use crate::model::Product;

    use super::*;

    #[test]
    fn render_csv_emits_fixed_column_order_and_quotes() {
        let mut session = ExtractionSession::new("catalog.pdf", 2);
        let mut product = Product::new("Widget, Blue", 2, "catalog.pdf");
        product.item_no = "12345".to_string();
        product.pkg = "32".to_string();
        product.uom = "ct".to_string();
        session.add_product(product);

        let csv = render_csv(&session);
        let mut lines = csv.lines();

        assert_eq!(
            lines.next(),
            Some("product_name,description,item_no,pkg,uom,page_number,source_file")
        );
        assert_eq!(
            lines.next(),
            Some("\"Widget, Blue\",,12345,32,ct,2,catalog.pdf")
        );
    }

    #[test]
    fn escape_csv_cell_doubles_embedded_quotes() {
        assert_eq!(escape_csv_cell("plain"), "plain");
        assert_eq!(escape_csv_cell("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
