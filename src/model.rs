use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::util::{generate_record_id, write_json_pretty};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldLocation {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
    pub page_number: usize,
    pub confidence: f64,
}

impl FieldLocation {
    pub fn synthetic(page_number: usize, confidence: f64) -> Self {
        Self {
            x0: 0.0,
            y0: 0.0,
            x1: 0.0,
            y1: 0.0,
            page_number,
            confidence,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub product_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub item_no: String,
    #[serde(default)]
    pub pkg: String,
    #[serde(default)]
    pub uom: String,
    #[serde(default)]
    pub page_number: usize,
    #[serde(default)]
    pub source_file: String,
    #[serde(default = "generate_record_id")]
    pub id: String,
    #[serde(default)]
    pub field_locations: BTreeMap<String, FieldLocation>,
}

impl Product {
    pub fn new(product_name: impl Into<String>, page_number: usize, source_file: &str) -> Self {
        Self {
            product_name: product_name.into(),
            description: String::new(),
            item_no: String::new(),
            pkg: String::new(),
            uom: String::new(),
            page_number,
            source_file: source_file.to_string(),
            id: generate_record_id(),
            field_locations: BTreeMap::new(),
        }
    }

    pub fn field_confidence(&self, field: &str) -> f64 {
        self.field_locations
            .get(field)
            .map(|location| location.confidence)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionSession {
    pub source_file: String,
    pub total_pages: usize,
    #[serde(default)]
    pub current_page: usize,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub completed: bool,
}

impl ExtractionSession {
    pub fn new(source_file: impl Into<String>, total_pages: usize) -> Self {
        Self {
            source_file: source_file.into(),
            total_pages,
            current_page: 1,
            products: Vec::new(),
            completed: false,
        }
    }

    pub fn add_product(&mut self, product: Product) {
        self.products.push(product);
    }

    pub fn session_filename(&self) -> String {
        let stem = Path::new(&self.source_file)
            .file_stem()
            .and_then(|value| value.to_str())
            .unwrap_or("session");
        format!("{stem}.session.json")
    }

    pub fn save(&self, session_dir: &Path) -> Result<PathBuf> {
        let path = session_dir.join(self.session_filename());
        write_json_pretty(&path, self)?;
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path)
            .with_context(|| format!("failed to read session {}", path.display()))?;
        serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse session {}", path.display()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpEntry {
    pub filename: String,
    pub source_file: String,
    pub page_count: usize,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpInventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub source_directory: String,
    pub dump_count: usize,
    pub dumps: Vec<DumpEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolVersions {
    pub rustc: String,
    pub cargo: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractPaths {
    pub cache_root: String,
    pub manifest_dir: String,
    pub dump_path: String,
    pub session_path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractCounts {
    pub pages_total: usize,
    pub pages_processed: usize,
    pub products_extracted: usize,
    pub accepted_pages: usize,
    pub merged_pages: usize,
    pub fallback_pages: usize,
    pub empty_page_count: usize,
    pub empty_pages: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub tool_versions: ToolVersions,
    pub paths: ExtractPaths,
    pub counts: ExtractCounts,
    pub method_usage: BTreeMap<String, usize>,
    pub warnings: Vec<String>,
    pub notes: Vec<String>,
}
