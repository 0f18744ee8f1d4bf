use anyhow::{Context, Result};
use regex::Regex;

const UOM_UNITS: &str = "ct|pk|pack|bx|oz|gm|ml|lb|qt|pt|bag|roll|pr|dz|set|btl|tube|jar|can|box|ea|sheets?|pair|kit|rl|cs|each|case|carton|drum|gal|pail|tub";

const HEADER_CELL_PATTERNS: &[&str] = &[
    r"(?i)^Item\s*#?$",
    r"(?i)^Description$",
    r"(?i)^Count$",
    r"(?i)^Price$",
    r"(?i)^SKU\s*#?$",
    r"(?i)^UPC",
    r"(?i)^Product\s*(Name|Code)?$",
];

const UPC_HEADER_PATTERNS: &[&str] = &[
    r"(?i)^UPC\s*(Code|#)?$",
    r"(?i)^Universal\s*Product\s*Code$",
    r"(?i)^Barcode$",
    r"(?i)^GTIN$",
    r"(?i)^EAN(-13)?$",
];

const SKU_HEADER_PATTERNS: &[&str] = &[
    r"(?i)^SKU\s*(#|No\.?)?$",
    r"(?i)^Stock\s*(Keeping\s*Unit|#|No\.?)?$",
    r"(?i)^Vendor\s*(#|No\.?)?$",
];

const ITEM_NO_HEADER_PATTERNS: &[&str] = &[
    r"(?i)^Item\s*(#|No\.?|Number)?$",
    r"(?i)^Part\s*(#|No\.?|Number)?$",
    r"(?i)^Catalog\s*(#|No\.?|Number)?$",
    r"(?i)^Cat\s*(#|No\.?)?$",
    r"(?i)^Product\s*(#|Code|ID)$",
    r"(?i)^Model\s*(#|No\.?|Number)?$",
    r"(?i)^Code$",
    r"(?i)^ID$",
    r"(?i)^NDC$",
    r"(?i)^MPN$",
];

const PRODUCT_NAME_HEADER_PATTERNS: &[&str] = &[
    r"(?i)^Description$",
    r"(?i)^Product\s*(Name)?$",
    r"(?i)^Item\s*(Name|Description)$",
    r"(?i)^Name$",
];

const COUNT_HEADER_PATTERNS: &[&str] = &[
    r"(?i)^Count$",
    r"(?i)^Qty\.?$",
    r"(?i)^Quantity$",
    r"(?i)^Pack\s*(Size)?$",
    r"(?i)^Size$",
    r"(?i)^Unit$",
];

const SKIP_ROW_PATTERNS: &[&str] = &[
    r"(?i)See Page",
    r"(?i)Please note",
    r"(?i)Keep this catalog",
    r"^\*",
];

const FALSE_POSITIVE_PATTERNS: &[&str] = &[
    r"(?i)^\d+\.?\d*\s*(kg|g|lb|oz|cm|mm|m|inches?|in|ft|feet)\.?$",
    r"(?i)^\d+\.?\d*\s*x\s*\d+",
    r"(?i)^\d+\s*/\s*\d+\s*(mm|cm|m|kg|g)",
    r"(?i)^\d+\s*(mm|cm|m)\s*diameter$",
    r"(?i)^\d+\.?\d*\s*(minutes?|mins?|hours?|hrs?|seconds?|secs?|days?)\.?$",
    r"(?i)^[\d,]+\s*(mins?|hours?|secs?)$",
    r"^\d+\.?\d*\s*%$",
    r"(?i)^\d+\.?\d*\s*°?[CF]$",
    r"(?i)^\d+\.?\d*\s*(V|A|W|Hz|kW|mA|VA)$",
    r"(?i)^\d+\.?\d*\s*(bar|psi|kPa|MPa|Pa)$",
    r"(?i)^\d+\.?\d*\s*(L|ml|gal|liters?|litres?)$",
    r"(?i)^\d+\.?\d*\s*(rpm|m/s|km/h|mph)$",
    r"^\d+\.?\d*\s*[-~]\s*\d+\.?\d*$",
    r"(?i)^IP[X\d]\d?$",
    r"(?i)^Class\s*[1-9IVX]+$",
    r"(?i)^(BS|EN|ISO|IEC|ANSI|UL|CE|CSA)\s*\d+",
    r"^[A-Za-z\s]+:$",
    r"(?i)^(Yes|No|N/?A|None|Standard|Optional|Included|Available)$",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierField {
    Upc,
    Sku,
    ItemNo,
}

pub const DEFAULT_IDENTIFIER_PRIORITY: [IdentifierField; 3] = [
    IdentifierField::Upc,
    IdentifierField::Sku,
    IdentifierField::ItemNo,
];

#[derive(Debug)]
pub struct DualIdLine {
    pub upc: String,
    pub sku: String,
    pub name: String,
    pub count: String,
}

#[derive(Debug)]
pub struct ProductLine {
    pub item_no: String,
    pub name: String,
    pub count: String,
}

#[derive(Debug)]
pub struct MultilineItemLine {
    pub item_no: String,
    pub count: String,
}

#[derive(Debug)]
pub struct CodePriceLine {
    pub item_no: String,
    pub uom: String,
}

#[derive(Debug)]
pub struct ItemPrefixLine {
    pub item_no: String,
    pub rest: String,
}

#[derive(Debug)]
pub struct PatternLibrary {
    item_no: Regex,
    count_uom: Regex,
    count_column: Regex,
    slash_uom: Regex,
    generic_count: Regex,
    product_line: Regex,
    dual_id: Regex,
    multiline_item: Regex,
    code_price: Regex,
    item_prefix: Regex,
    price: Regex,
    bare_number: Regex,
    price_uom: Regex,
    header_cells: Vec<Regex>,
    upc_headers: Vec<Regex>,
    sku_headers: Vec<Regex>,
    item_no_headers: Vec<Regex>,
    product_name_headers: Vec<Regex>,
    count_headers: Vec<Regex>,
    skip_rows: Vec<Regex>,
    false_positives: Vec<Regex>,
    embedded_measurement: Regex,
    letters_digits_letters: Regex,
    caps_heading: Regex,
    catalog_heading: Regex,
}

impl PatternLibrary {
    pub fn new() -> Result<Self> {
        Ok(Self {
            item_no: Regex::new(
                r"(?i)^([A-Z]{0,4}\d{4,}[-\dA-Z]*|[A-Z]{1,6}-[A-Z-]*\d[\dA-Z-]*|[A-Z]{2,6}\d+[A-Z\d]*|\d{4,5})$",
            )
            .context("failed to compile item number regex")?,
            count_uom: Regex::new(&format!(r"(?i)^([\d,]+)\s*({UOM_UNITS})\.?$"))
                .context("failed to compile count/uom regex")?,
            count_column: Regex::new(&format!(r"(?i)^[\d,]+\s*/?\s*({UOM_UNITS})?\.?$"))
                .context("failed to compile count column regex")?,
            slash_uom: Regex::new(&format!(r"(?i)^([\d,]+)\s*/\s*({UOM_UNITS})$"))
                .context("failed to compile slash uom regex")?,
            generic_count: Regex::new(r"^([\d,]+)\s*(.*)$")
                .context("failed to compile generic count regex")?,
            product_line: Regex::new(&format!(
                r"(?i)^(\d{{4,5}})\s+(.+?)\s+(\d+\s*(?:{UOM_UNITS})\.?)\s+\$(\d+\.?\d*)$"
            ))
            .context("failed to compile product line regex")?,
            dual_id: Regex::new(&format!(
                r"(?i)^([A-Z]\d{{1,3}})\s+(\d{{5,6}})\s+(.+?)\s+(\d+\s*(?:{UOM_UNITS})\.?)\s+\$(\d+\.?\d*)$"
            ))
            .context("failed to compile dual identifier regex")?,
            multiline_item: Regex::new(&format!(
                r"(?i)^(\d{{4,5}})\s+(\d+\s*(?:{UOM_UNITS})\.?)\s+\$(\d+\.?\d*)$"
            ))
            .context("failed to compile multi-line item regex")?,
            code_price: Regex::new(
                r"(?i)^([A-Z]{2,4}[A-Z-]*\d[\dA-Z-]*)\s+\$([\d,]+\.?\d*)\s*/?(EACH|PAIR|RL|BX|CS|PK|EA|CT)\b",
            )
            .context("failed to compile code/price regex")?,
            item_prefix: Regex::new(r"(?i)Item\s*#?\s*:?\s*([A-Z]{0,4}[A-Z-]*\d[\dA-Z-]*)")
                .context("failed to compile item prefix regex")?,
            price: Regex::new(r"^\$[\d,]+\.?\d*$").context("failed to compile price regex")?,
            bare_number: Regex::new(r"^\d+$").context("failed to compile bare number regex")?,
            price_uom: Regex::new(&format!(r"(?i)\$[\d.]+\s*/?\s*({UOM_UNITS})\b"))
                .context("failed to compile price/uom regex")?,
            header_cells: compile_all(HEADER_CELL_PATTERNS, "header cell")?,
            upc_headers: compile_all(UPC_HEADER_PATTERNS, "upc header")?,
            sku_headers: compile_all(SKU_HEADER_PATTERNS, "sku header")?,
            item_no_headers: compile_all(ITEM_NO_HEADER_PATTERNS, "item number header")?,
            product_name_headers: compile_all(PRODUCT_NAME_HEADER_PATTERNS, "product name header")?,
            count_headers: compile_all(COUNT_HEADER_PATTERNS, "count header")?,
            skip_rows: compile_all(SKIP_ROW_PATTERNS, "skip row")?,
            false_positives: compile_all(FALSE_POSITIVE_PATTERNS, "false positive")?,
            embedded_measurement: Regex::new(r"(?i)\d+(cm|mm|m|kg|g|L|ml)\w+")
                .context("failed to compile embedded measurement regex")?,
            letters_digits_letters: Regex::new(r"^[A-Za-z]+\d+[A-Za-z]+")
                .context("failed to compile concatenated description regex")?,
            caps_heading: Regex::new(r"^[A-Z][A-Z\s&,\-]+$")
                .context("failed to compile caps heading regex")?,
            catalog_heading: Regex::new(
                r"(?i)^(Page \d+|Section \d+|Category:|Index|Table of Contents)$",
            )
            .context("failed to compile catalog heading regex")?,
        })
    }

    pub fn is_identifier(&self, value: &str) -> bool {
        let trimmed = value.trim();
        !trimmed.is_empty() && self.item_no.is_match(trimmed)
    }

    pub fn is_false_positive_identifier(&self, value: &str) -> bool {
        let stripped = value.trim();
        if stripped.is_empty() {
            return false;
        }

        let cleaned = stripped.split_whitespace().collect::<String>();

        if self
            .false_positives
            .iter()
            .any(|pattern| pattern.is_match(&cleaned))
        {
            return true;
        }

        if self.embedded_measurement.is_match(&cleaned) {
            return true;
        }

        if cleaned.chars().count() > 15 && self.letters_digits_letters.is_match(&cleaned) {
            return true;
        }

        if value.contains('\n') {
            return true;
        }

        if !cleaned.chars().any(|character| character.is_ascii_digit()) {
            return true;
        }

        if stripped.contains(' ') && !stripped.contains(" / ") {
            let words = stripped.split_whitespace().collect::<Vec<&str>>();
            if words.len() >= 3 {
                return true;
            }
            if words.iter().any(|word| is_descriptive_word(word)) {
                return true;
            }
        }

        false
    }

    pub fn parse_count_uom(&self, raw: &str) -> (String, String) {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return (String::new(), String::new());
        }

        if let Some(captures) = self.count_uom.captures(trimmed) {
            let pkg = captures
                .get(1)
                .map(|group| group.as_str().replace(',', ""))
                .unwrap_or_default();
            let uom = captures
                .get(2)
                .map(|group| group.as_str().to_lowercase())
                .unwrap_or_default();
            return (pkg, uom.trim_end_matches('.').to_string());
        }

        if let Some(captures) = self.slash_uom.captures(trimmed) {
            let pkg = captures
                .get(1)
                .map(|group| group.as_str().replace(',', ""))
                .unwrap_or_default();
            let uom = captures
                .get(2)
                .map(|group| group.as_str().to_lowercase())
                .unwrap_or_default();
            return (pkg, uom);
        }

        if let Some(captures) = self.generic_count.captures(trimmed) {
            let pkg = captures
                .get(1)
                .map(|group| group.as_str().replace(',', ""))
                .unwrap_or_default();
            let uom = captures
                .get(2)
                .map(|group| group.as_str().trim().trim_end_matches('.').to_lowercase())
                .unwrap_or_default();
            return (pkg, uom);
        }

        (String::new(), trimmed.to_string())
    }

    pub fn is_header_cell(&self, value: &str) -> bool {
        let trimmed = value.trim();
        !trimmed.is_empty()
            && self
                .header_cells
                .iter()
                .any(|pattern| pattern.is_match(trimmed))
    }

    pub fn is_skip_text(&self, text: &str) -> bool {
        self.skip_rows.iter().any(|pattern| pattern.is_match(text))
    }

    pub fn is_identifier_header(&self, field: IdentifierField, value: &str) -> bool {
        let patterns = match field {
            IdentifierField::Upc => &self.upc_headers,
            IdentifierField::Sku => &self.sku_headers,
            IdentifierField::ItemNo => &self.item_no_headers,
        };
        patterns.iter().any(|pattern| pattern.is_match(value))
    }

    pub fn is_product_name_header(&self, value: &str) -> bool {
        self.product_name_headers
            .iter()
            .any(|pattern| pattern.is_match(value))
    }

    pub fn is_count_header(&self, value: &str) -> bool {
        self.count_headers
            .iter()
            .any(|pattern| pattern.is_match(value))
    }

    pub fn is_count_cell(&self, value: &str) -> bool {
        self.count_uom.is_match(value) || self.count_column.is_match(value)
    }

    pub fn is_price(&self, value: &str) -> bool {
        self.price.is_match(value)
    }

    pub fn is_bare_number(&self, value: &str) -> bool {
        self.bare_number.is_match(value)
    }

    pub fn is_section_heading(&self, line: &str) -> bool {
        (self.caps_heading.is_match(line) && line.chars().count() > 3)
            || self.catalog_heading.is_match(line)
    }

    pub fn match_dual_id(&self, line: &str) -> Option<DualIdLine> {
        let captures = self.dual_id.captures(line)?;
        Some(DualIdLine {
            upc: capture_string(&captures, 1),
            sku: capture_string(&captures, 2),
            name: capture_string(&captures, 3),
            count: capture_string(&captures, 4),
        })
    }

    pub fn match_product_line(&self, line: &str) -> Option<ProductLine> {
        let captures = self.product_line.captures(line)?;
        Some(ProductLine {
            item_no: capture_string(&captures, 1),
            name: capture_string(&captures, 2),
            count: capture_string(&captures, 3),
        })
    }

    pub fn match_multiline_item(&self, line: &str) -> Option<MultilineItemLine> {
        let captures = self.multiline_item.captures(line)?;
        Some(MultilineItemLine {
            item_no: capture_string(&captures, 1),
            count: capture_string(&captures, 2),
        })
    }

    pub fn match_code_price(&self, line: &str) -> Option<CodePriceLine> {
        let captures = self.code_price.captures(line)?;
        Some(CodePriceLine {
            item_no: capture_string(&captures, 1),
            uom: capture_string(&captures, 3).to_lowercase(),
        })
    }

    pub fn match_item_prefix(&self, line: &str) -> Option<ItemPrefixLine> {
        let captures = self.item_prefix.captures(line)?;
        let item_no = capture_string(&captures, 1);
        let rest = captures
            .get(0)
            .map(|whole| line[whole.end()..].trim().to_string())
            .unwrap_or_default();
        Some(ItemPrefixLine { item_no, rest })
    }

    pub fn has_item_prefix(&self, line: &str) -> bool {
        self.item_prefix.is_match(line)
    }

    pub fn find_price_uom(&self, line: &str) -> Option<String> {
        self.price_uom
            .captures(line)
            .and_then(|captures| captures.get(1).map(|group| group.as_str().to_lowercase()))
    }
}

pub fn combine_identifiers(upc: &str, sku: &str, item_no: &str) -> String {
    let mut parts = Vec::<String>::new();
    for value in [upc, sku, item_no] {
        let trimmed = value.trim();
        if !trimmed.is_empty() && !parts.iter().any(|existing| existing == trimmed) {
            parts.push(trimmed.to_string());
        }
    }
    parts.join(" / ")
}

pub fn clean_product_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<&str>>().join(" ")
}

fn capture_string(captures: &regex::Captures<'_>, index: usize) -> String {
    captures
        .get(index)
        .map(|group| group.as_str().trim().to_string())
        .unwrap_or_default()
}

fn compile_all(patterns: &[&str], what: &str) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern)
                .with_context(|| format!("failed to compile {what} regex: {pattern}"))
        })
        .collect()
}

fn is_descriptive_word(word: &str) -> bool {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let rest = chars.as_str();
    if rest.is_empty() {
        return false;
    }

    word_is_lowercase(word) || (first.is_uppercase() && word_is_lowercase(rest))
}

fn word_is_lowercase(word: &str) -> bool {
    let mut saw_alphabetic = false;
    for character in word.chars() {
        if character.is_alphabetic() {
            saw_alphabetic = true;
            if !character.is_lowercase() {
                return false;
            }
        }
    }
    saw_alphabetic
}
