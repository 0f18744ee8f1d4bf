use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::InventoryArgs;
use crate::commands::extract::source::CatalogDump;
use crate::model::{DumpEntry, DumpInventoryManifest};
use crate::util::{now_utc_string, sha256_file, write_json_pretty};

const DUMP_SUFFIX: &str = ".dump.json";

pub fn run(args: InventoryArgs) -> Result<()> {
    let manifest = build_manifest(&args.cache_root)?;

    if args.dry_run {
        info!(
            dump_count = manifest.dump_count,
            source = %manifest.source_directory,
            "inventory dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args
        .manifest_path
        .unwrap_or_else(|| args.cache_root.join("manifests").join("dump_inventory.json"));

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote inventory manifest");
    info!(dump_count = manifest.dump_count, "inventory completed");

    Ok(())
}

pub fn build_manifest(cache_root: &Path) -> Result<DumpInventoryManifest> {
    let dumps_dir = cache_root.join("dumps");

    let mut dump_paths = discover_dumps(&dumps_dir)?;
    dump_paths.sort();

    if dump_paths.is_empty() {
        bail!("no catalog dumps found in {}", dumps_dir.display());
    }

    let mut dumps = Vec::with_capacity(dump_paths.len());
    for path in dump_paths {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(ToOwned::to_owned)
            .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))?;

        let raw =
            fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let dump: CatalogDump = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        let sha256 = sha256_file(&path)?;

        dumps.push(DumpEntry {
            filename,
            source_file: dump.source_file,
            page_count: dump.pages.len(),
            sha256,
        });
    }

    dumps.sort_by(|a, b| a.filename.cmp(&b.filename));

    Ok(DumpInventoryManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        source_directory: dumps_dir.display().to_string(),
        dump_count: dumps.len(),
        dumps,
    })
}

fn discover_dumps(dumps_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dumps = Vec::new();

    let entries = fs::read_dir(dumps_dir)
        .with_context(|| format!("failed to read {}", dumps_dir.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", dumps_dir.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            continue;
        }

        let is_dump = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.ends_with(DUMP_SUFFIX))
            .unwrap_or(false);

        if is_dump {
            dumps.push(path);
        }
    }

    Ok(dumps)
}
