//! Writing conversion results next to the input or into an output directory

use crate::convert::Conversion;
use crate::dicom::MetadataMap;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// `<stem>.png` and `<stem>.json` for `input`, in `output_dir` if given
#[must_use]
pub fn output_paths(input: &Path, output_dir: Option<&Path>) -> (PathBuf, PathBuf) {
    let stem = input.file_stem().unwrap_or(input.as_os_str());
    let dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    // stems like `ct.1` keep their dots
    let with_suffix = |suffix: &str| {
        let mut name = stem.to_os_string();
        name.push(suffix);
        dir.join(name)
    };
    (with_suffix(".png"), with_suffix(".json"))
}

/// Writes the PNG (images only) and, unless disabled, the metadata JSON
///
/// Returns the paths written.
pub fn write_conversion(
    conversion: &Conversion,
    input: &Path,
    output_dir: Option<&Path>,
    write_metadata: bool,
) -> Result<Vec<PathBuf>> {
    if let Some(dir) = output_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    }

    let (png_path, json_path) = output_paths(input, output_dir);
    let mut written = Vec::new();

    if let Conversion::Image { raster, .. } = conversion {
        fs::write(&png_path, raster.png())
            .with_context(|| format!("Failed to write PNG: {}", png_path.display()))?;
        info!(path = %png_path.display(), width = raster.width(), height = raster.height(), "wrote image");
        written.push(png_path);
    }

    if write_metadata {
        write_metadata_json(conversion.metadata(), &json_path)?;
        written.push(json_path);
    }

    Ok(written)
}

pub fn write_metadata_json(metadata: &MetadataMap, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(metadata).context("Failed to serialize metadata")?;
    fs::write(path, json).with_context(|| format!("Failed to write metadata: {}", path.display()))?;
    info!(path = %path.display(), entries = metadata.len(), "wrote metadata");
    Ok(())
}
