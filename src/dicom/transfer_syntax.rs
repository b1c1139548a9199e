//! Transfer syntax registry
//!
//! Closed set of transfer syntaxes this crate can render, each bound to one
//! pixel-data strategy. Lookup happens once per file, before extraction.

use super::error::DicomError;
use crate::types::ByteOrder;
use dicom::encoding::TransferSyntaxIndex;
use dicom::transfer_syntax::TransferSyntaxRegistry;
use std::fmt;
use tracing::warn;

/// Well-known transfer syntax UIDs
pub mod uids {
    pub const IMPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2";
    pub const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";
    pub const EXPLICIT_VR_BIG_ENDIAN: &str = "1.2.840.10008.1.2.2";
    pub const JPEG_LOSSLESS_PROCESS_14: &str = "1.2.840.10008.1.2.4.57";
    pub const JPEG_LOSSLESS_SV1: &str = "1.2.840.10008.1.2.4.70";
    pub const JPEG_2000_LOSSLESS: &str = "1.2.840.10008.1.2.4.90";
    pub const JPEG_2000: &str = "1.2.840.10008.1.2.4.91";
    pub const DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1.99";
    pub const JPIP_REFERENCED_DEFLATE: &str = "1.2.840.10008.1.2.4.95";

    /// Syntaxes whose dataset body is a deflate stream
    #[must_use]
    pub fn is_deflated(uid: &str) -> bool {
        matches!(
            uid.trim_end_matches(['\0', ' ']),
            DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN | JPIP_REFERENCED_DEFLATE
        )
    }
}

/// Transfer syntaxes with a pixel-data strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferSyntax {
    ExplicitVrLittleEndian,
    ImplicitVrLittleEndian,
    ExplicitVrBigEndian,
    /// JPEG 2000 codestream in encapsulated fragments
    Jpeg2000,
    /// JPEG Lossless, Non-Hierarchical, Process 14 frame
    JpegLossless,
}

/// External program needed to decode a compressed payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternalTool {
    OpenJpeg,
    ImageMagick,
}

impl fmt::Display for ExternalTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenJpeg => write!(f, "opj_decompress"),
            Self::ImageMagick => write!(f, "magick"),
        }
    }
}

/// Format an external decoder hands back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntermediateFormat {
    /// Bare samples in the given byte order
    Raw(ByteOrder),
    /// Portable graymap (P5)
    Pgm,
}

/// How to turn a transfer syntax's pixel data into samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeStrategy {
    /// `None` when samples are stored natively
    pub utility: Option<ExternalTool>,
    pub output_format: IntermediateFormat,
    /// Extension for the temporary payload file handed to `utility`
    pub temp_extension: &'static str,
}

/// What to do with a transfer syntax outside the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownSyntaxPolicy {
    /// Reject with [`DicomError::UnsupportedTransferSyntax`]
    #[default]
    Fail,
    /// Treat the pixel data as an encapsulated JPEG 2000 codestream
    AssumeJpeg2000,
}

impl TransferSyntax {
    /// Resolves a transfer syntax UID
    ///
    /// # Errors
    ///
    /// Returns [`DicomError::UnsupportedTransferSyntax`] for UIDs outside the
    /// registry.
    pub fn resolve(uid: &str) -> Result<Self, DicomError> {
        match uid.trim_end_matches(['\0', ' ']) {
            uids::EXPLICIT_VR_LITTLE_ENDIAN => Ok(Self::ExplicitVrLittleEndian),
            uids::IMPLICIT_VR_LITTLE_ENDIAN => Ok(Self::ImplicitVrLittleEndian),
            uids::EXPLICIT_VR_BIG_ENDIAN => Ok(Self::ExplicitVrBigEndian),
            uids::JPEG_2000_LOSSLESS | uids::JPEG_2000 => Ok(Self::Jpeg2000),
            uids::JPEG_LOSSLESS_PROCESS_14 | uids::JPEG_LOSSLESS_SV1 => Ok(Self::JpegLossless),
            other => Err(DicomError::unsupported_transfer_syntax(other)),
        }
    }

    /// Resolves a UID, applying `policy` to UIDs outside the registry
    ///
    /// # Errors
    ///
    /// Returns [`DicomError::UnsupportedTransferSyntax`] when the UID is
    /// unknown and the policy is [`UnknownSyntaxPolicy::Fail`].
    pub fn resolve_with_policy(uid: &str, policy: UnknownSyntaxPolicy) -> Result<Self, DicomError> {
        match (Self::resolve(uid), policy) {
            (Err(DicomError::UnsupportedTransferSyntax { uid, name }), UnknownSyntaxPolicy::AssumeJpeg2000) => {
                warn!(%uid, %name, "unknown transfer syntax, decoding as JPEG 2000 by configuration");
                Ok(Self::Jpeg2000)
            }
            (result, _) => result,
        }
    }

    #[must_use]
    pub fn uid(self) -> &'static str {
        match self {
            Self::ExplicitVrLittleEndian => uids::EXPLICIT_VR_LITTLE_ENDIAN,
            Self::ImplicitVrLittleEndian => uids::IMPLICIT_VR_LITTLE_ENDIAN,
            Self::ExplicitVrBigEndian => uids::EXPLICIT_VR_BIG_ENDIAN,
            Self::Jpeg2000 => uids::JPEG_2000_LOSSLESS,
            Self::JpegLossless => uids::JPEG_LOSSLESS_PROCESS_14,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ExplicitVrLittleEndian => "Explicit VR Little Endian",
            Self::ImplicitVrLittleEndian => "Implicit VR Little Endian",
            Self::ExplicitVrBigEndian => "Explicit VR Big Endian",
            Self::Jpeg2000 => "JPEG 2000 Image Compression",
            Self::JpegLossless => "JPEG Lossless, Non-Hierarchical (Process 14)",
        }
    }

    #[must_use]
    pub fn strategy(self) -> DecodeStrategy {
        match self {
            Self::ExplicitVrLittleEndian | Self::ImplicitVrLittleEndian => DecodeStrategy {
                utility: None,
                output_format: IntermediateFormat::Raw(ByteOrder::Little),
                temp_extension: "raw",
            },
            Self::ExplicitVrBigEndian => DecodeStrategy {
                utility: None,
                // samples are swapped to little endian during extraction
                output_format: IntermediateFormat::Raw(ByteOrder::Little),
                temp_extension: "raw",
            },
            Self::Jpeg2000 => DecodeStrategy {
                utility: Some(ExternalTool::OpenJpeg),
                output_format: IntermediateFormat::Pgm,
                temp_extension: "j2k",
            },
            Self::JpegLossless => DecodeStrategy {
                utility: Some(ExternalTool::ImageMagick),
                output_format: IntermediateFormat::Pgm,
                temp_extension: "jpg",
            },
        }
    }
}

impl fmt::Display for TransferSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{name} ({uid})", name = self.name(), uid = self.uid())
    }
}

/// Standard name of any transfer syntax UID, or "Unknown"
#[must_use]
pub fn standard_name(uid: &str) -> String {
    TransferSyntaxRegistry
        .get(uid)
        .map_or_else(|| "Unknown".to_string(), |ts| ts.name().to_string())
}
