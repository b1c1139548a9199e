use super::transfer_syntax::standard_name;
use crate::dicom::MetadataMap;
use dicom::core::Tag;
use thiserror::Error;

/// Failure converting one DICOM file
///
/// Every variant is fatal for the file it was raised on; none are retried.
#[derive(Debug, Error)]
pub enum DicomError {
    /// Truncated or structurally invalid element stream
    #[error("malformed DICOM at byte {offset}{}: {reason}", tag_suffix(.tag))]
    Malformed {
        offset: usize,
        tag: Option<Tag>,
        reason: String,
    },

    /// The dataset has no (7FE0,0010) element
    #[error("no pixel data element (7FE0,0010) in dataset")]
    NoPixelData,

    #[error("unsupported transfer syntax {name} ({uid})")]
    UnsupportedTransferSyntax { uid: String, name: String },

    #[error("malformed encapsulated pixel data ({syntax}) at byte {offset}: {reason}")]
    MalformedEncapsulatedStream {
        syntax: String,
        offset: usize,
        reason: String,
    },

    #[error(
        "insufficient pixel data: {rows}x{cols} at {bits_allocated} bits needs {required} bytes, found {available}"
    )]
    InsufficientPixelData {
        rows: u16,
        cols: u16,
        bits_allocated: u16,
        required: usize,
        available: usize,
    },

    /// An external decoder failed; `diagnostic` carries the tool's own error text
    #[error("external decoder {tool} failed: {diagnostic}")]
    ExternalDecode { tool: String, diagnostic: String },

    /// A required image attribute is absent; `context` hints at the document type
    #[error("missing or invalid {name} {tag}{context}")]
    MissingAttribute {
        tag: Tag,
        name: &'static str,
        context: String,
    },

    /// Pixel layout outside monochrome 8/16-bit single-sample images
    #[error("unsupported pixel layout: {0}")]
    UnsupportedPixelLayout(String),

    #[error("PNG encoding failed: {0}")]
    PngEncoding(#[from] std::io::Error),
}

fn tag_suffix(tag: &Option<Tag>) -> String {
    tag.map(|t| format!(" in element {t}")).unwrap_or_default()
}

impl DicomError {
    pub(crate) fn unsupported_transfer_syntax(uid: &str) -> Self {
        Self::UnsupportedTransferSyntax {
            uid: uid.to_string(),
            name: standard_name(uid),
        }
    }

    pub(crate) fn malformed(offset: usize, tag: Option<Tag>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            offset,
            tag,
            reason: reason.into(),
        }
    }
}

/// Error type that preserves metadata when available
#[derive(Debug, Error)]
pub enum ProcessError {
    /// File could not be read from disk
    #[error(transparent)]
    Io(#[from] anyhow::Error),

    /// File is not a valid DICOM - no metadata available
    #[error("{0}")]
    NotADicomFile(DicomError),

    /// Valid DICOM file but image conversion failed
    #[error("{error}")]
    ConversionFailed {
        metadata: Box<MetadataMap>,
        error: DicomError,
    },

    /// Image ready but writing outputs failed
    #[error("{error:#}")]
    OutputFailed {
        metadata: Box<MetadataMap>,
        error: anyhow::Error,
    },
}

impl ProcessError {
    /// Returns metadata if available (for verbose display before error)
    #[must_use]
    pub fn metadata(&self) -> Option<&MetadataMap> {
        match self {
            ProcessError::ConversionFailed { metadata, .. } => Some(metadata),
            ProcessError::OutputFailed { metadata, .. } => Some(metadata),
            _ => None,
        }
    }
}
