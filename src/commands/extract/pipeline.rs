use std::collections::BTreeMap;

use anyhow::Result;

use crate::model::{FieldLocation, Product};

use super::column_map::ColumnDetector;
use super::markdown_tables::parse_markdown_tables;
use super::merge::merge_extractions;
use super::patterns::PatternLibrary;
use super::source::{
    BackendOutput, CONFIDENCE_REGEX_FALLBACK, LayoutKind, MethodKind, PageClassification,
    PageContent, PageSource,
};
use super::table_records::build_records;
use super::text_fallback::TextFallbackParser;
use super::validate::filter_valid;

pub const DEFAULT_ACCEPT_CONFIDENCE: f64 = 0.85;

const MIN_RECORDS_THRESHOLD: usize = 1;

const TEXT_CONFIDENCE_FIELDS: [&str; 5] = ["item_no", "product_name", "description", "pkg", "uom"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    Accepted(MethodKind),
    Merged,
    FallbackRegex,
    Empty,
}

impl PageOutcome {
    pub fn label(self) -> &'static str {
        match self {
            Self::Accepted(kind) => kind.as_str(),
            Self::Merged => "merged",
            Self::FallbackRegex => "regex_fallback",
            Self::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub empty_pages: Vec<usize>,
    pub method_usage: BTreeMap<String, usize>,
    pub accepted_pages: usize,
    pub merged_pages: usize,
    pub fallback_pages: usize,
    pub warnings: Vec<String>,
}

pub struct PagePipeline<'a> {
    source: &'a dyn PageSource,
    patterns: &'a PatternLibrary,
    detector: ColumnDetector<'a>,
    accept_confidence: f64,
    stats: PipelineStats,
}

impl<'a> PagePipeline<'a> {
    pub fn new(source: &'a dyn PageSource, patterns: &'a PatternLibrary) -> Self {
        Self {
            source,
            patterns,
            detector: ColumnDetector::new(patterns),
            accept_confidence: DEFAULT_ACCEPT_CONFIDENCE,
            stats: PipelineStats::default(),
        }
    }

    pub fn with_detector(mut self, detector: ColumnDetector<'a>) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_accept_confidence(mut self, accept_confidence: f64) -> Self {
        self.accept_confidence = accept_confidence;
        self
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn into_stats(self) -> PipelineStats {
        self.stats
    }

    pub fn run_page(&mut self, page_number: usize) -> Vec<Product> {
        let classification = self.source.classification(page_number);
        let mut collected = Vec::<Vec<Product>>::new();

        for kind in method_order(&classification) {
            let records = match self.attempt(*kind, page_number) {
                Ok(Some(records)) => records,
                Ok(None) => continue,
                Err(err) => {
                    self.stats.warnings.push(format!(
                        "page {page_number}: {} backend failed: {err:#}",
                        kind.as_str()
                    ));
                    continue;
                }
            };

            let records = filter_valid(self.patterns, records);
            if records.is_empty() {
                continue;
            }

            if records.len() >= MIN_RECORDS_THRESHOLD
                && mean_field_confidence(&records) >= self.accept_confidence
            {
                self.record_outcome(PageOutcome::Accepted(*kind));
                return records;
            }

            collected.push(records);
        }

        if !collected.is_empty() {
            let merged = filter_valid(self.patterns, merge_extractions(&collected));
            if !merged.is_empty() {
                self.record_outcome(PageOutcome::Merged);
                return merged;
            }
        }

        let content = self.source.page_content(page_number);
        let parser = TextFallbackParser::new(self.patterns);
        let mut fallback = parser.parse(&content, self.source.source_file());
        stamp_text_confidence(&mut fallback, page_number, CONFIDENCE_REGEX_FALLBACK);
        let fallback = filter_valid(self.patterns, fallback);
        if !fallback.is_empty() {
            self.record_outcome(PageOutcome::FallbackRegex);
            return fallback;
        }

        self.record_outcome(PageOutcome::Empty);
        self.stats.empty_pages.push(page_number);
        Vec::new()
    }

    fn record_outcome(&mut self, outcome: PageOutcome) {
        match outcome {
            PageOutcome::Accepted(_) => self.stats.accepted_pages += 1,
            PageOutcome::Merged => self.stats.merged_pages += 1,
            PageOutcome::FallbackRegex => self.stats.fallback_pages += 1,
            PageOutcome::Empty => return,
        }

        *self
            .stats
            .method_usage
            .entry(outcome.label().to_string())
            .or_default() += 1;
    }

    fn attempt(&self, kind: MethodKind, page_number: usize) -> Result<Option<Vec<Product>>> {
        let Some(output) = self.source.capture(kind, page_number)? else {
            return Ok(None);
        };

        let source_file = self.source.source_file();
        let confidence = kind.confidence();

        let records = match output {
            BackendOutput::Tables(tables) => tables
                .iter()
                .flat_map(|table| {
                    build_records(
                        self.patterns,
                        &self.detector,
                        table,
                        page_number,
                        source_file,
                        confidence,
                    )
                })
                .collect(),
            BackendOutput::Markdown(text) => {
                let mut records = Vec::new();
                for table in parse_markdown_tables(&text) {
                    records.extend(build_records(
                        self.patterns,
                        &self.detector,
                        &table,
                        page_number,
                        source_file,
                        confidence,
                    ));
                }

                if records.is_empty() {
                    let lines = text
                        .lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty())
                        .map(ToOwned::to_owned)
                        .collect::<Vec<String>>();
                    let content = PageContent {
                        page_number,
                        lines,
                        raw_text: text.clone(),
                    };

                    let parser = TextFallbackParser::new(self.patterns);
                    records = parser.parse(&content, source_file);
                    stamp_text_confidence(&mut records, page_number, confidence);
                }

                records
            }
            BackendOutput::Lines(lines) => {
                let raw_text = lines.join("\n");
                let content = PageContent {
                    page_number,
                    lines,
                    raw_text,
                };

                let parser = TextFallbackParser::new(self.patterns);
                let mut records = parser.parse(&content, source_file);
                stamp_text_confidence(&mut records, page_number, confidence);
                records
            }
        };

        Ok(Some(records))
    }
}

pub fn method_order(classification: &PageClassification) -> &'static [MethodKind] {
    if classification.is_scanned {
        return &[MethodKind::TableStructure, MethodKind::DocumentLayout];
    }

    if classification.has_borders {
        return &[
            MethodKind::BorderGrid,
            MethodKind::CellMatrix,
            MethodKind::NativeGrid,
            MethodKind::TextLayout,
        ];
    }

    match classification.layout {
        LayoutKind::Borderless => &[
            MethodKind::BorderlessGrid,
            MethodKind::CellMatrix,
            MethodKind::TableStructure,
            MethodKind::LayoutMarkdown,
        ],
        LayoutKind::TextOnly => &[MethodKind::LayoutMarkdown, MethodKind::TextLayout],
        LayoutKind::Tabular | LayoutKind::Mixed => &MethodKind::ALL,
    }
}

pub fn mean_field_confidence(records: &[Product]) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;

    for record in records {
        for location in record.field_locations.values() {
            total += location.confidence;
            count += 1;
        }
    }

    if count == 0 { 0.0 } else { total / count as f64 }
}

pub fn stamp_text_confidence(records: &mut [Product], page_number: usize, confidence: f64) {
    for record in records {
        for field in TEXT_CONFIDENCE_FIELDS {
            match record.field_locations.get_mut(field) {
                Some(location) => {
                    if location.confidence < confidence {
                        location.confidence = confidence;
                    }
                }
                None => {
                    record.field_locations.insert(
                        field.to_string(),
                        FieldLocation::synthetic(page_number, confidence),
                    );
                }
            }
        }
    }
}
