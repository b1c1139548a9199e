//! One-file conversion pipeline
//!
//! bytes → parse → classify → transfer syntax → extract → (external decode)
//! → reconstruct. Metadata is taken off the parsed dataset independently, so
//! it survives a failed conversion.

use crate::dicom::{
    DicomError, DocumentKind, MetadataMap, ParsedDataset, ProcessError, UnknownSyntaxPolicy,
    check_dataset_body, classify, default_skip_tags, extract_metadata, extract_pixel_data, parse, read_dicom_file,
    resolve_transfer_syntax,
};
use crate::external::{ExternalDecoder, decode_payload};
use crate::image::{RasterImage, reconstruct};
use crate::types::WindowLevel;
use dicom::core::Tag;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Per-call conversion settings
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Tags left out of the metadata map
    pub skip_tags: HashSet<Tag>,
    /// Window used instead of the dataset's, when usable
    pub window: Option<WindowLevel>,
    pub unknown_syntax: UnknownSyntaxPolicy,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            skip_tags: default_skip_tags(),
            window: None,
            unknown_syntax: UnknownSyntaxPolicy::Fail,
        }
    }
}

/// Outcome of converting one file
#[derive(Debug, Clone)]
pub enum Conversion {
    Image {
        raster: RasterImage,
        metadata: MetadataMap,
    },
    /// Structured reports and other documents without pixel data
    Document {
        kind: DocumentKind,
        metadata: MetadataMap,
    },
}

impl Conversion {
    #[must_use]
    pub fn metadata(&self) -> &MetadataMap {
        match self {
            Self::Image { metadata, .. } | Self::Document { metadata, .. } => metadata,
        }
    }

    #[must_use]
    pub fn kind(&self) -> DocumentKind {
        match self {
            Self::Image { .. } => DocumentKind::Image,
            Self::Document { kind, .. } => *kind,
        }
    }
}

/// Converts one DICOM file held in memory
///
/// # Errors
///
/// [`ProcessError::NotADicomFile`] if the bytes do not parse,
/// [`ProcessError::ConversionFailed`] (with the metadata that could be read)
/// if the pixel pipeline fails.
pub fn convert(
    bytes: impl Into<Arc<[u8]>>,
    decoder: &dyn ExternalDecoder,
    options: &ConvertOptions,
) -> Result<Conversion, ProcessError> {
    let dataset = parse(bytes).map_err(ProcessError::NotADicomFile)?;
    let metadata = extract_metadata(&dataset, &options.skip_tags);

    // only the file meta group is available for a deflated body
    if let Err(error) = check_dataset_body(&dataset) {
        return Err(ProcessError::ConversionFailed {
            metadata: Box::new(metadata),
            error,
        });
    }

    let kind = classify(&dataset);
    if !kind.is_image() {
        info!(%kind, "no image to render");
        return Ok(Conversion::Document { kind, metadata });
    }

    match render_image(&dataset, decoder, options) {
        Ok(raster) => Ok(Conversion::Image { raster, metadata }),
        Err(error) => Err(ProcessError::ConversionFailed {
            metadata: Box::new(metadata),
            error,
        }),
    }
}

/// Reads and converts one DICOM file
///
/// # Errors
///
/// [`ProcessError::Io`] when the file cannot be read, otherwise as [`convert`].
pub fn convert_file(
    file_path: &Path,
    decoder: &dyn ExternalDecoder,
    options: &ConvertOptions,
) -> Result<Conversion, ProcessError> {
    let bytes = read_dicom_file(file_path)?;
    convert(bytes, decoder, options)
}

/// Pixel pipeline for a dataset already known to hold an image
///
/// # Errors
///
/// Any [`DicomError`] raised while resolving the transfer syntax, extracting,
/// decoding or reconstructing.
pub fn render_image(
    dataset: &ParsedDataset,
    decoder: &dyn ExternalDecoder,
    options: &ConvertOptions,
) -> Result<RasterImage, DicomError> {
    let syntax = resolve_transfer_syntax(dataset, options.unknown_syntax)?;
    debug!(%syntax, strategy = ?syntax.strategy(), "resolved transfer syntax");

    let payload = extract_pixel_data(dataset, syntax)?;
    let samples = decode_payload(payload, decoder)?;
    reconstruct(&samples, dataset, options.window)
}
