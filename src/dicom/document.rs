//! Up-front document classification
//!
//! Decides from the SOP Class UID and the presence of (7FE0,0010) whether a
//! dataset is an image before any pixel extraction is attempted.

use super::parser::ParsedDataset;
use dicom::dictionary_std::tags;
use std::fmt;

/// Structured Report Storage SOP classes share this UID prefix
const STRUCTURED_REPORT_PREFIX: &str = "1.2.840.10008.5.1.4.1.1.88.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Has pixel data to render
    Image,
    /// Structured report: findings as text and codes, no pixel data
    StructuredReport,
    /// Anything else without pixel data (presentation states, KOS, PDFs...)
    NonImage,
}

impl DocumentKind {
    #[inline]
    #[must_use]
    pub fn is_image(self) -> bool {
        matches!(self, Self::Image)
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::StructuredReport => write!(f, "structured report"),
            Self::NonImage => write!(f, "non-image document"),
        }
    }
}

#[must_use]
pub fn is_structured_report(sop_class_uid: &str) -> bool {
    sop_class_uid.starts_with(STRUCTURED_REPORT_PREFIX)
}

#[must_use]
pub fn classify(dataset: &ParsedDataset) -> DocumentKind {
    if dataset
        .sop_class_uid()
        .is_some_and(|uid| is_structured_report(&uid))
    {
        DocumentKind::StructuredReport
    } else if dataset.contains(tags::PIXEL_DATA) {
        DocumentKind::Image
    } else {
        DocumentKind::NonImage
    }
}
