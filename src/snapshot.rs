use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{ExtractionTarget, RenderedPage};

/// Saves rendered markup for offline selector tuning.
pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Writes `{source}_{query}-{md5 prefix}.html`; identical markup maps to the same file.
    pub fn save(&self, target: &ExtractionTarget, page: &RenderedPage) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create snapshot directory {}", self.dir.display()))?;

        let path = snapshot_path(&self.dir, target, &page.html);
        fs::write(&path, &page.html)
            .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
        Ok(path)
    }
}

fn snapshot_path(dir: &Path, target: &ExtractionTarget, html: &str) -> PathBuf {
    let digest = format!("{:x}", md5::compute(html.as_bytes()));
    dir.join(format!(
        "{}_{}-{}.html",
        file_stem(&target.source),
        file_stem(&target.query),
        &digest[..12]
    ))
}

fn file_stem(text: &str) -> String {
    text.trim()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}
