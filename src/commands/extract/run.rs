use std::process::Command;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::{ExtractArgs, IdentifierPriority};
use crate::model::{ExtractCounts, ExtractPaths, ExtractRunManifest, ExtractionSession, ToolVersions};
use crate::util::{ensure_directory, now_utc_string, utc_compact_string, write_json_pretty};

use super::column_map::ColumnDetector;
use super::patterns::{IdentifierField, PatternLibrary};
use super::pipeline::PagePipeline;
use super::source::{DumpSource, PageSource};

pub fn run(args: ExtractArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let cache_root = args.cache_root.clone();
    let manifest_dir = cache_root.join("manifests");
    ensure_directory(&manifest_dir)?;

    let session_dir = args
        .session_dir
        .clone()
        .unwrap_or_else(|| cache_root.join("sessions"));
    ensure_directory(&session_dir)?;

    let run_manifest_path = args.run_manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!(
            "extract_run_{}.json",
            utc_compact_string(started_ts)
        ))
    });

    info!(
        dump = %args.dump_path.display(),
        run_id = %run_id,
        "starting extraction"
    );

    let source = DumpSource::load(&args.dump_path)?;
    let patterns = PatternLibrary::new()?;
    let detector = ColumnDetector::new(&patterns)
        .with_identifier_priority(resolve_identifier_priority(&args.identifier_priority))
        .with_sample_rows(args.sample_rows);
    let mut pipeline = PagePipeline::new(&source, &patterns)
        .with_detector(detector)
        .with_accept_confidence(args.accept_threshold);

    let total_pages = source.page_count();
    if total_pages == 0 {
        bail!("dump {} contains no pages", args.dump_path.display());
    }
    let page_limit = args
        .max_pages
        .map(|max_pages| max_pages.min(total_pages))
        .unwrap_or(total_pages);

    let mut session = ExtractionSession::new(source.source_file(), total_pages);
    for page_number in 1..=page_limit {
        let products = pipeline.run_page(page_number);
        for product in products {
            session.add_product(product);
        }
        session.current_page = page_number;
    }
    session.completed = page_limit == total_pages;

    let session_path = session.save(&session_dir)?;
    info!(
        path = %session_path.display(),
        products = session.products.len(),
        "wrote extraction session"
    );

    let stats = pipeline.into_stats();
    for warning in &stats.warnings {
        warn!(warning = %warning, "extraction warning");
    }

    let updated_at = now_utc_string();
    let manifest = ExtractRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        status: "completed".to_string(),
        started_at,
        updated_at,
        command: render_extract_command(&args),
        tool_versions: collect_tool_versions()?,
        paths: ExtractPaths {
            cache_root: cache_root.display().to_string(),
            manifest_dir: manifest_dir.display().to_string(),
            dump_path: args.dump_path.display().to_string(),
            session_path: session_path.display().to_string(),
        },
        counts: ExtractCounts {
            pages_total: total_pages,
            pages_processed: page_limit,
            products_extracted: session.products.len(),
            accepted_pages: stats.accepted_pages,
            merged_pages: stats.merged_pages,
            fallback_pages: stats.fallback_pages,
            empty_page_count: stats.empty_pages.len(),
            empty_pages: stats.empty_pages.clone(),
        },
        method_usage: stats.method_usage.clone(),
        warnings: stats.warnings.clone(),
        notes: vec![
            "Extraction pipeline selects backends per page classification and stops early on high-confidence results.".to_string(),
            "Sub-threshold results are reconciled by the confidence merge before the regex fallback runs.".to_string(),
        ],
    };

    write_json_pretty(&run_manifest_path, &manifest)?;

    info!(path = %run_manifest_path.display(), "wrote extract run manifest");
    info!(
        pages = page_limit,
        products = session.products.len(),
        empty_pages = stats.empty_pages.len(),
        "extraction completed"
    );

    Ok(())
}

fn resolve_identifier_priority(priority: &[IdentifierPriority]) -> Vec<IdentifierField> {
    priority
        .iter()
        .map(|field| match field {
            IdentifierPriority::Upc => IdentifierField::Upc,
            IdentifierPriority::Sku => IdentifierField::Sku,
            IdentifierPriority::ItemNo => IdentifierField::ItemNo,
        })
        .collect()
}

fn render_extract_command(args: &ExtractArgs) -> String {
    let mut command = vec![
        "catalex".to_string(),
        "extract".to_string(),
        "--cache-root".to_string(),
        args.cache_root.display().to_string(),
        "--dump-path".to_string(),
        args.dump_path.display().to_string(),
    ];

    if let Some(path) = &args.session_dir {
        command.push("--session-dir".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.run_manifest_path {
        command.push("--run-manifest-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(max_pages) = args.max_pages {
        command.push("--max-pages".to_string());
        command.push(max_pages.to_string());
    }
    command.push("--accept-threshold".to_string());
    command.push(args.accept_threshold.to_string());
    command.push("--sample-rows".to_string());
    command.push(args.sample_rows.to_string());
    for field in &args.identifier_priority {
        command.push("--identifier-priority".to_string());
        command.push(field.as_str().to_string());
    }

    command.join(" ")
}

fn collect_tool_versions() -> Result<ToolVersions> {
    Ok(ToolVersions {
        rustc: command_version("rustc", &["--version"])?,
        cargo: command_version("cargo", &["--version"])?,
    })
}

fn command_version(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("failed to run {} {}", program, args.join(" ")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{} {} failed: {}", program, args.join(" "), stderr.trim());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let version_line = stdout.lines().next().map(str::trim).unwrap_or_default();
    Ok(version_line.to_string())
}
