//! Typed image attributes read off a parsed dataset

use super::error::DicomError;
use super::parser::ParsedDataset;
use super::photometric::PhotometricInterpretation;
use super::validation;
use crate::types::{BitDepth, Dimensions, RescaleParams, SOPClass, WindowLevel};
use dicom::core::Tag;
use dicom::core::dictionary::UidDictionary;
use dicom::dictionary_std::sop_class;
use dicom::dictionary_std::tags;

/// Partial metadata for error message context
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub modality: Option<String>,
    pub sop_class: Option<SOPClass>,
}

impl ErrorContext {
    /// Suffix appended to missing-attribute errors, empty without context
    #[must_use]
    pub fn hint(&self) -> String {
        let mut parts = Vec::new();

        if let Some(modality) = &self.modality {
            parts.push(format!("Modality: {modality}"));
        }

        if let Some(sc) = &self.sop_class {
            parts.push(format!("SOP Class: {sc}"));
        }

        if parts.is_empty() {
            String::new()
        } else {
            format!(
                " - this may be a non-image DICOM file ({})",
                parts.join(", ")
            )
        }
    }

    fn missing(&self, tag: Tag, name: &'static str) -> DicomError {
        DicomError::MissingAttribute {
            tag,
            name,
            context: self.hint(),
        }
    }
}

impl From<&ParsedDataset> for ErrorContext {
    fn from(dataset: &ParsedDataset) -> Self {
        ErrorContext {
            modality: dataset.string(tags::MODALITY).filter(|m| !m.is_empty()),
            sop_class: extract_sop_class(dataset),
        }
    }
}

/// Sample signedness, (0028,0103)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelRepresentation {
    #[default]
    Unsigned,
    Signed,
}

/// Everything the reconstructor needs to know about the pixel grid
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAttributes {
    pub dimensions: Dimensions,
    pub bit_depth: BitDepth,
    pub pixel_representation: PixelRepresentation,
    pub rescale: RescaleParams,
    /// Window stored in the dataset, if both values are present
    pub window: Option<WindowLevel>,
    pub photometric_interpretation: PhotometricInterpretation,
    pub samples_per_pixel: u16,
    pub number_of_frames: u32,
}

impl ImageAttributes {
    /// Reads and validates image attributes
    ///
    /// # Errors
    ///
    /// [`DicomError::MissingAttribute`] when Rows or Columns is absent or zero,
    /// [`DicomError::UnsupportedPixelLayout`] for anything other than
    /// single-sample monochrome 8/16-bit images.
    pub fn from_dataset(dataset: &ParsedDataset) -> Result<Self, DicomError> {
        let error_context = ErrorContext::from(dataset);
        let dimensions = extract_dimensions(dataset, &error_context)?;

        let attributes = Self {
            dimensions,
            bit_depth: extract_bit_depth(dataset),
            pixel_representation: extract_pixel_representation(dataset),
            rescale: extract_rescale_params(dataset),
            window: extract_window(dataset),
            photometric_interpretation: extract_photometric_interpretation(dataset),
            samples_per_pixel: extract_samples_per_pixel(dataset),
            number_of_frames: extract_number_of_frames(dataset),
        };

        validation::validate_attributes(&attributes)?;
        Ok(attributes)
    }

    #[inline(always)]
    #[must_use]
    pub fn rows(&self) -> u16 {
        self.dimensions.rows
    }

    #[inline(always)]
    #[must_use]
    pub fn cols(&self) -> u16 {
        self.dimensions.cols
    }
}

pub fn extract_dimensions(dataset: &ParsedDataset, error_context: &ErrorContext) -> Result<Dimensions, DicomError> {
    let rows = dataset
        .uint16(tags::ROWS)
        .filter(|&r| r > 0)
        .ok_or_else(|| error_context.missing(tags::ROWS, "Rows"))?;

    let cols = dataset
        .uint16(tags::COLUMNS)
        .filter(|&c| c > 0)
        .ok_or_else(|| error_context.missing(tags::COLUMNS, "Columns"))?;

    Ok(Dimensions::new(rows, cols))
}

pub fn extract_rescale_params(dataset: &ParsedDataset) -> RescaleParams {
    // Optional; mostly present for CT and PET
    let slope = dataset.float_string(tags::RESCALE_SLOPE).unwrap_or(1.0);
    let intercept = dataset.float_string(tags::RESCALE_INTERCEPT).unwrap_or(0.0);

    RescaleParams::new(slope, intercept)
}

/// Defaults to 16 bits allocated; bits stored defaults to bits allocated
pub fn extract_bit_depth(dataset: &ParsedDataset) -> BitDepth {
    let allocated = dataset.uint16(tags::BITS_ALLOCATED).unwrap_or(16);
    let stored = dataset.uint16(tags::BITS_STORED).unwrap_or(allocated);
    BitDepth::new(allocated, stored)
}

#[inline]
pub fn extract_pixel_representation(dataset: &ParsedDataset) -> PixelRepresentation {
    match dataset.uint16(tags::PIXEL_REPRESENTATION) {
        Some(1) => PixelRepresentation::Signed,
        _ => PixelRepresentation::Unsigned,
    }
}

/// First window of (0028,1050)/(0028,1051), only when both are present
pub fn extract_window(dataset: &ParsedDataset) -> Option<WindowLevel> {
    let center = dataset.float_string(tags::WINDOW_CENTER)?;
    let width = dataset.float_string(tags::WINDOW_WIDTH)?;
    Some(WindowLevel::new(center, width))
}

pub fn extract_photometric_interpretation(dataset: &ParsedDataset) -> PhotometricInterpretation {
    dataset
        .string(tags::PHOTOMETRIC_INTERPRETATION)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}

#[inline]
pub fn extract_samples_per_pixel(dataset: &ParsedDataset) -> u16 {
    dataset.uint16(tags::SAMPLES_PER_PIXEL).unwrap_or(1)
}

#[inline]
pub fn extract_number_of_frames(dataset: &ParsedDataset) -> u32 {
    dataset
        .float_string(tags::NUMBER_OF_FRAMES)
        .filter(|n| (1.0..=f64::from(u32::MAX)).contains(n))
        .map_or(1, |n| n as u32)
}

pub fn extract_sop_class(dataset: &ParsedDataset) -> Option<SOPClass> {
    dataset.sop_class_uid().map(|uid| {
        let name = sop_class::StandardSopClassDictionary
            .by_uid(&uid)
            .map_or_else(|| "Unknown".to_string(), |entry| entry.name.to_string());
        SOPClass::new(uid, name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dicom::parse;
    use crate::dicom::testing::{CT_IMAGE_STORAGE, DatasetBuilder};
    use approx::assert_relative_eq;
    use assert_matches::assert_matches;
    use dicom::core::VR;

    #[test]
    fn test_image_attributes_defaults() {
        let dataset = parse(
            DatasetBuilder::explicit_le()
                .u16(tags::ROWS, 4)
                .u16(tags::COLUMNS, 3)
                .build(),
        )
        .unwrap();
        let attributes = ImageAttributes::from_dataset(&dataset).unwrap();

        assert_eq!(attributes.dimensions, Dimensions::new(4, 3));
        assert_eq!(attributes.bit_depth, BitDepth::new(16, 16));
        assert_eq!(attributes.pixel_representation, PixelRepresentation::Unsigned);
        assert_eq!(attributes.rescale, RescaleParams::default());
        assert_eq!(attributes.window, None);
        assert_eq!(attributes.photometric_interpretation, PhotometricInterpretation::Monochrome2);
        assert_eq!(attributes.number_of_frames, 1);
    }

    #[test]
    fn test_rescale_and_window_read_from_strings() {
        let dataset = parse(
            DatasetBuilder::explicit_le()
                .u16(tags::ROWS, 1)
                .u16(tags::COLUMNS, 1)
                .string(tags::RESCALE_SLOPE, VR::DS, "2.5")
                .string(tags::RESCALE_INTERCEPT, VR::DS, "-1024")
                .string(tags::WINDOW_CENTER, VR::DS, "40\\400")
                .string(tags::WINDOW_WIDTH, VR::DS, "350\\1500")
                .build(),
        )
        .unwrap();
        let attributes = ImageAttributes::from_dataset(&dataset).unwrap();

        assert_relative_eq!(attributes.rescale.slope, 2.5);
        assert_relative_eq!(attributes.rescale.intercept, -1024.0);
        let window = attributes.window.unwrap();
        assert_relative_eq!(window.center, 40.0);
        assert_relative_eq!(window.width, 350.0);
    }

    #[test]
    fn test_window_needs_both_values() {
        let dataset = parse(
            DatasetBuilder::explicit_le()
                .string(tags::WINDOW_CENTER, VR::DS, "40")
                .build(),
        )
        .unwrap();
        assert_eq!(extract_window(&dataset), None);
    }

    #[test]
    fn test_missing_rows_names_the_document() {
        let dataset = parse(
            DatasetBuilder::explicit_le()
                .string(tags::MODALITY, VR::CS, "SR")
                .u16(tags::COLUMNS, 3)
                .build(),
        )
        .unwrap();
        let err = ImageAttributes::from_dataset(&dataset).unwrap_err();
        assert_matches!(err, DicomError::MissingAttribute { tag, name: "Rows", .. } if tag == tags::ROWS);
        let msg = err.to_string();
        assert!(msg.contains("Modality: SR"), "{msg}");
        assert!(msg.contains("CT Image Storage"), "{msg}");
    }

    #[test]
    fn test_sop_class_name_from_dictionary() {
        let dataset = parse(
            DatasetBuilder::explicit_le()
                .string(tags::SOP_CLASS_UID, VR::UI, CT_IMAGE_STORAGE)
                .build(),
        )
        .unwrap();
        let sop_class = extract_sop_class(&dataset).unwrap();
        assert_eq!(sop_class.uid, CT_IMAGE_STORAGE);
        assert_eq!(sop_class.name, "CT Image Storage");
    }

    #[test]
    fn test_color_image_is_rejected() {
        let dataset = parse(
            DatasetBuilder::explicit_le()
                .u16(tags::ROWS, 2)
                .u16(tags::COLUMNS, 2)
                .u16(tags::SAMPLES_PER_PIXEL, 3)
                .string(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "RGB")
                .build(),
        )
        .unwrap();
        assert_matches!(
            ImageAttributes::from_dataset(&dataset),
            Err(DicomError::UnsupportedPixelLayout(_))
        );
    }
}
