use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl From<[f64; 4]> for BBox {
    fn from(value: [f64; 4]) -> Self {
        Self {
            x0: value[0],
            y0: value[1],
            x1: value[2],
            y1: value[3],
        }
    }
}

impl From<BBox> for [f64; 4] {
    fn from(value: BBox) -> Self {
        [value.x0, value.y0, value.x1, value.y1]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "CellRepr")]
pub struct Cell {
    pub text: String,
    pub bbox: Option<BBox>,
}

impl Cell {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into().trim().to_string(),
            bbox: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CellRepr {
    Text(String),
    Structured {
        #[serde(default)]
        text: String,
        #[serde(default)]
        bbox: Option<BBox>,
    },
}

impl From<CellRepr> for Cell {
    fn from(value: CellRepr) -> Self {
        match value {
            CellRepr::Text(text) => Self {
                text: text.trim().to_string(),
                bbox: None,
            },
            CellRepr::Structured { text, bbox } => Self {
                text: text.trim().to_string(),
                bbox,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    #[serde(default)]
    pub bbox: Option<BBox>,
    #[serde(default)]
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageContent {
    pub page_number: usize,
    #[serde(default)]
    pub lines: Vec<String>,
    #[serde(default)]
    pub raw_text: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutKind {
    Tabular,
    Borderless,
    TextOnly,
    #[default]
    Mixed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PageClassification {
    #[serde(default)]
    pub is_scanned: bool,
    #[serde(default)]
    pub has_borders: bool,
    #[serde(default, alias = "layout_type")]
    pub layout: LayoutKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    BorderGrid,
    TableStructure,
    CellMatrix,
    NativeGrid,
    DocumentLayout,
    BorderlessGrid,
    LayoutMarkdown,
    TextLayout,
}

pub const CONFIDENCE_REGEX_FALLBACK: f64 = 0.5;

impl MethodKind {
    pub const ALL: [MethodKind; 8] = [
        MethodKind::BorderGrid,
        MethodKind::TableStructure,
        MethodKind::CellMatrix,
        MethodKind::NativeGrid,
        MethodKind::DocumentLayout,
        MethodKind::BorderlessGrid,
        MethodKind::LayoutMarkdown,
        MethodKind::TextLayout,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BorderGrid => "border_grid",
            Self::TableStructure => "table_structure",
            Self::CellMatrix => "cell_matrix",
            Self::NativeGrid => "native_grid",
            Self::DocumentLayout => "document_layout",
            Self::BorderlessGrid => "borderless_grid",
            Self::LayoutMarkdown => "layout_markdown",
            Self::TextLayout => "text_layout",
        }
    }

    pub fn confidence(self) -> f64 {
        match self {
            Self::BorderGrid => 1.0,
            Self::TableStructure => 0.98,
            Self::CellMatrix => 0.95,
            Self::NativeGrid => 0.93,
            Self::DocumentLayout => 0.92,
            Self::BorderlessGrid => 0.90,
            Self::LayoutMarkdown => 0.85,
            Self::TextLayout => 0.80,
        }
    }
}

#[derive(Debug, Clone)]
pub enum BackendOutput {
    Tables(Vec<Table>),
    Markdown(String),
    Lines(Vec<String>),
}

pub trait PageSource {
    fn source_file(&self) -> &str;
    fn page_count(&self) -> usize;
    fn classification(&self, page_number: usize) -> PageClassification;
    fn capture(&self, kind: MethodKind, page_number: usize) -> Result<Option<BackendOutput>>;
    fn page_content(&self, page_number: usize) -> PageContent;
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogDump {
    pub source_file: String,
    #[serde(default)]
    pub pages: Vec<PageDump>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageDump {
    pub page_number: usize,
    #[serde(default)]
    pub classification: PageClassification,
    #[serde(default)]
    pub raw_text: String,
    #[serde(default)]
    pub lines: Vec<String>,
    #[serde(default)]
    pub methods: BTreeMap<String, MethodCapture>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MethodCapture {
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub lines: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct DumpSource {
    source_file: String,
    pages: BTreeMap<usize, PageDump>,
}

impl DumpSource {
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            fs::read(path).with_context(|| format!("failed to read dump {}", path.display()))?;
        let dump: CatalogDump = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse dump {}", path.display()))?;
        Self::from_dump(dump)
    }

    pub fn from_dump(dump: CatalogDump) -> Result<Self> {
        if dump.pages.is_empty() {
            bail!("dump for {} contains no pages", dump.source_file);
        }

        let mut pages = BTreeMap::new();
        for page in dump.pages {
            pages.insert(page.page_number, page);
        }

        Ok(Self {
            source_file: dump.source_file,
            pages,
        })
    }
}

impl PageSource for DumpSource {
    fn source_file(&self) -> &str {
        &self.source_file
    }

    fn page_count(&self) -> usize {
        self.pages.keys().next_back().copied().unwrap_or(0)
    }

    fn classification(&self, page_number: usize) -> PageClassification {
        self.pages
            .get(&page_number)
            .map(|page| page.classification)
            .unwrap_or_default()
    }

    fn capture(&self, kind: MethodKind, page_number: usize) -> Result<Option<BackendOutput>> {
        let Some(page) = self.pages.get(&page_number) else {
            return Ok(None);
        };
        let Some(capture) = page.methods.get(kind.as_str()) else {
            return Ok(None);
        };

        if !capture.tables.is_empty() {
            return Ok(Some(BackendOutput::Tables(capture.tables.clone())));
        }
        if let Some(text) = &capture.text {
            return Ok(Some(BackendOutput::Markdown(text.clone())));
        }
        if let Some(lines) = &capture.lines {
            return Ok(Some(BackendOutput::Lines(lines.clone())));
        }

        Ok(None)
    }

    fn page_content(&self, page_number: usize) -> PageContent {
        let Some(page) = self.pages.get(&page_number) else {
            return PageContent {
                page_number,
                ..PageContent::default()
            };
        };

        let lines = if page.lines.is_empty() {
            page.raw_text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(ToOwned::to_owned)
                .collect()
        } else {
            page.lines.clone()
        };

        PageContent {
            page_number,
            lines,
            raw_text: page.raw_text.clone(),
        }
    }
}
