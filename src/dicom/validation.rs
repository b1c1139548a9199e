use super::attributes::ImageAttributes;
use super::error::DicomError;
use super::photometric::PhotometricInterpretation;
use crate::types::BitDepth;

#[inline]
pub fn validate_photometric_samples(
    photometric_interpretation: &PhotometricInterpretation,
    samples_per_pixel: u16,
) -> Result<(), DicomError> {
    if !photometric_interpretation.is_grayscale() {
        return Err(DicomError::UnsupportedPixelLayout(format!(
            "photometric interpretation {photometric_interpretation} (only MONOCHROME1/MONOCHROME2 are rendered)"
        )));
    }

    if samples_per_pixel != 1 {
        return Err(DicomError::UnsupportedPixelLayout(format!(
            "{samples_per_pixel} samples per pixel with {photometric_interpretation} (expected 1)"
        )));
    }

    Ok(())
}

#[inline]
pub fn validate_bit_depth(bit_depth: BitDepth) -> Result<(), DicomError> {
    if !bit_depth.is_valid() {
        return Err(DicomError::UnsupportedPixelLayout(format!(
            "bit depth {bit_depth} (expected 8 or 16 bits allocated)"
        )));
    }

    Ok(())
}

pub fn validate_attributes(attributes: &ImageAttributes) -> Result<(), DicomError> {
    validate_photometric_samples(&attributes.photometric_interpretation, attributes.samples_per_pixel)?;
    validate_bit_depth(attributes.bit_depth)?;
    Ok(())
}
