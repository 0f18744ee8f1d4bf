use std::fs;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::model::{DumpInventoryManifest, ExtractionSession};

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_dir = args.cache_root.join("manifests");
    let inventory_path = manifest_dir.join("dump_inventory.json");
    let session_dir = args.cache_root.join("sessions");

    info!(cache_root = %args.cache_root.display(), "status requested");

    if inventory_path.exists() {
        let raw = fs::read(&inventory_path)
            .with_context(|| format!("failed to read {}", inventory_path.display()))?;
        let inventory: DumpInventoryManifest = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse {}", inventory_path.display()))?;

        info!(
            generated_at = %inventory.generated_at,
            dump_count = inventory.dump_count,
            "loaded inventory manifest"
        );
    } else {
        warn!(path = %inventory_path.display(), "inventory manifest missing");
    }

    if !session_dir.exists() {
        warn!(path = %session_dir.display(), "session directory missing");
        return Ok(());
    }

    let mut session_count = 0usize;
    let entries = fs::read_dir(&session_dir)
        .with_context(|| format!("failed to read {}", session_dir.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", session_dir.display()))?;
        let path = entry.path();

        let is_session = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.ends_with(".session.json"))
            .unwrap_or(false);
        if !is_session {
            continue;
        }

        match ExtractionSession::load(&path) {
            Ok(session) => {
                session_count += 1;
                info!(
                    source_file = %session.source_file,
                    progress = %format!("{}/{}", session.current_page, session.total_pages),
                    products = session.products.len(),
                    completed = session.completed,
                    "session status"
                );
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to load session");
            }
        }
    }

    if session_count == 0 {
        warn!(path = %session_dir.display(), "no extraction sessions found");
    }

    Ok(())
}
