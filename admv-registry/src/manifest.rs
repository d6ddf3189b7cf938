use crate::descriptor::MvDescriptor;
use admv_core::error::AccelError;
use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Path of the manifest file for an MV directory `mv_root/<name>/`.
pub fn manifest_path(mv_root: &Path, name: &str) -> PathBuf {
    mv_root.join(name).join(MANIFEST_FILE_NAME)
}

/// Writes a descriptor's manifest atomically (write to `.tmp`, then
/// rename), so a crash mid-write never leaves a half-written manifest for
/// discovery to trip over.
pub fn write_manifest(mv_root: &Path, descriptor: &MvDescriptor) -> Result<(), AccelError> {
    let dir = mv_root.join(&descriptor.name);
    std::fs::create_dir_all(&dir)
        .map_err(|e| AccelError::Engine(anyhow::anyhow!(e).context("creating mv directory")))?;

    let final_path = dir.join(MANIFEST_FILE_NAME);
    let tmp_path = dir.join(format!("{MANIFEST_FILE_NAME}.tmp"));

    let encoded = serde_json::to_vec_pretty(descriptor)
        .map_err(|e| AccelError::Engine(anyhow::anyhow!(e).context("encoding manifest")))?;
    std::fs::write(&tmp_path, &encoded)
        .map_err(|e| AccelError::Engine(anyhow::anyhow!(e).context("writing manifest.tmp")))?;
    std::fs::rename(&tmp_path, &final_path)
        .map_err(|e| AccelError::Engine(anyhow::anyhow!(e).context("renaming manifest.tmp")))?;
    Ok(())
}

pub fn read_manifest(path: &Path) -> anyhow::Result<MvDescriptor> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let descriptor = serde_json::from_slice(&bytes)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(descriptor)
}

/// Scans `mv_root/*/manifest.json` at startup and loads every descriptor it
/// can parse, quarantining discovery by omission: a directory whose
/// manifest is missing or malformed is logged and skipped rather than
/// failing the whole engine startup (spec.md §4.1 treats a corrupt
/// manifest the same as a missing MV, not a fatal condition).
pub fn discover_manifests(mv_root: &Path) -> Vec<MvDescriptor> {
    let mut descriptors = Vec::new();
    let entries = match std::fs::read_dir(mv_root) {
        Ok(entries) => entries,
        Err(_) => return descriptors,
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let manifest = path.join(MANIFEST_FILE_NAME);
        if !manifest.is_file() {
            continue;
        }
        match read_manifest(&manifest) {
            Ok(descriptor) => descriptors.push(descriptor),
            Err(e) => warn!(path = %manifest.display(), error = %e, "skipping unreadable manifest"),
        }
    }
    descriptors
}
