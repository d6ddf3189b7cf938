use admv_core::error::AccelError;
use std::path::{Path, PathBuf};

/// Layout of one MV's on-disk directory tree under `mv_root/<name>/`.
pub struct MvLayout {
    pub root: PathBuf,
}

impl MvLayout {
    pub fn new(mv_root: &Path, name: &str) -> Self {
        Self {
            root: mv_root.join(name),
        }
    }

    pub fn staging_dir(&self, build_id: &str) -> PathBuf {
        self.root.join("staging").join(build_id)
    }

    pub fn ready_dir(&self) -> PathBuf {
        self.root.join("ready")
    }

    pub fn retired_dir(&self, build_id: &str) -> PathBuf {
        self.root.join("retired").join(build_id)
    }
}

/// Promotes a freshly written staging directory to `ready/`, retiring
/// whatever was there before rather than deleting it outright (spec.md
/// §4.2: promotion must be atomic from a reader's perspective, and old
/// files must survive long enough for in-flight queries against them to
/// finish). Two-phase: stage the new directory at `ready.tmp`, fsync the
/// parent, then rename `ready.tmp` -> `ready`, displacing any previous
/// `ready` to `retired/<build_id>/` first.
pub async fn promote_atomically(layout: &MvLayout, build_id: &str) -> Result<(), AccelError> {
    let staging = layout.staging_dir(build_id);
    let ready = layout.ready_dir();
    let ready_tmp = layout.root.join("ready.tmp");

    tokio::fs::rename(&staging, &ready_tmp)
        .await
        .map_err(|e| engine_err(e, "staging mv directory into ready.tmp"))?;

    if tokio::fs::try_exists(&ready)
        .await
        .map_err(|e| engine_err(e, "checking for existing ready directory"))?
    {
        let retired = layout.retired_dir(build_id);
        if let Some(parent) = retired.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| engine_err(e, "creating retired directory"))?;
        }
        tokio::fs::rename(&ready, &retired)
            .await
            .map_err(|e| engine_err(e, "retiring previous ready directory"))?;
    }

    tokio::fs::rename(&ready_tmp, &ready)
        .await
        .map_err(|e| engine_err(e, "promoting ready.tmp to ready"))?;

    fsync_dir(&layout.root)?;
    Ok(())
}

fn engine_err(e: std::io::Error, context: &str) -> AccelError {
    AccelError::Engine(anyhow::anyhow!(e).context(context.to_string()))
}

/// Fsyncs a directory entry so the rename above survives a crash; renames
/// alone are only guaranteed durable once the containing directory's
/// metadata is flushed.
fn fsync_dir(dir: &Path) -> Result<(), AccelError> {
    let f = std::fs::File::open(dir).map_err(|e| engine_err(e, "opening mv dir for fsync"))?;
    f.sync_all().map_err(|e| engine_err(e, "fsyncing mv dir"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn promote_moves_staging_into_ready() {
        let dir = tempfile::tempdir().unwrap();
        let layout = MvLayout::new(dir.path(), "rev_by_country_day");
        let staging = layout.staging_dir("build-1");
        tokio::fs::create_dir_all(&staging).await.unwrap();
        tokio::fs::write(staging.join("part-0.parquet"), b"data")
            .await
            .unwrap();

        promote_atomically(&layout, "build-1").await.unwrap();

        assert!(layout.ready_dir().join("part-0.parquet").exists());
    }

    #[tokio::test]
    async fn promote_retires_previous_ready() {
        let dir = tempfile::tempdir().unwrap();
        let layout = MvLayout::new(dir.path(), "rev_by_country_day");

        tokio::fs::create_dir_all(layout.staging_dir("build-1")).await.unwrap();
        promote_atomically(&layout, "build-1").await.unwrap();

        tokio::fs::create_dir_all(layout.staging_dir("build-2")).await.unwrap();
        promote_atomically(&layout, "build-2").await.unwrap();

        assert!(layout.retired_dir("build-2").exists());
    }
}
