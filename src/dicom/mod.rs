//! DICOM file parsing and metadata extraction
//!
//! This module parses DICOM byte streams, resolves their transfer syntax,
//! isolates pixel data and extracts a flat metadata map.

mod attributes;
pub mod dictionary;
mod document;
mod error;
mod metadata;
mod parser;
mod photometric;
mod pixel_data;
mod transfer_syntax;
mod validation;

#[cfg(test)]
pub(crate) mod testing;

// Re-export public API
pub use attributes::{ErrorContext, ImageAttributes, PixelRepresentation, extract_sop_class};
pub use document::{DocumentKind, classify, is_structured_report};
pub use error::{DicomError, ProcessError};
pub use metadata::{
    MetadataMap, MetadataValue, SOP_CLASS_NAME_KEY, TRANSFER_SYNTAX_NAME_KEY, default_skip_tags,
    extract_metadata, looks_like_binary,
};
pub use parser::{CharacterSet, Element, ParsedDataset, parse};
pub use photometric::PhotometricInterpretation;
pub use pixel_data::{CompressedFrame, DecodedSamples, PixelPayload, extract_pixel_data};
pub use transfer_syntax::{
    DecodeStrategy, ExternalTool, IntermediateFormat, TransferSyntax, UnknownSyntaxPolicy, standard_name,
    uids,
};

use anyhow::{Context, Result};
use std::path::Path;

/// Read a DICOM file into memory
pub fn read_dicom_file(file_path: &Path) -> Result<Vec<u8>> {
    std::fs::read(file_path)
        .with_context(|| format!("Failed to open DICOM file: {}", file_path.display()))
}

/// Open and parse a DICOM file
pub fn open_dicom_file(file_path: &Path) -> Result<ParsedDataset> {
    let bytes = read_dicom_file(file_path)?;
    parse(bytes).with_context(|| format!("Failed to parse DICOM file: {}", file_path.display()))
}

/// Transfer syntax of a dataset; datasets without one are implicit VR little endian
///
/// # Errors
///
/// [`DicomError::UnsupportedTransferSyntax`] when the body is deflated, or
/// when the UID is unknown and the policy is [`UnknownSyntaxPolicy::Fail`].
pub fn resolve_transfer_syntax(
    dataset: &ParsedDataset,
    policy: UnknownSyntaxPolicy,
) -> std::result::Result<TransferSyntax, DicomError> {
    check_dataset_body(dataset)?;
    match dataset.transfer_syntax_uid() {
        Some(uid) => TransferSyntax::resolve_with_policy(&uid, policy),
        None if dataset.is_explicit_vr() => Ok(TransferSyntax::ExplicitVrLittleEndian),
        None => Ok(TransferSyntax::ImplicitVrLittleEndian),
    }
}

/// Fails for datasets whose body could not be read past the file meta group
///
/// # Errors
///
/// [`DicomError::UnsupportedTransferSyntax`] for deflated bodies.
pub fn check_dataset_body(dataset: &ParsedDataset) -> std::result::Result<(), DicomError> {
    match dataset.deflated_syntax() {
        Some(uid) => Err(DicomError::unsupported_transfer_syntax(&uid)),
        None => Ok(()),
    }
}
