//! Grayscale sample conversion
//!
//! Turns decoded monochrome samples into rescaled modality values and maps
//! those through a VOI window to 8-bit intensities, inverting MONOCHROME1.

use super::normalization::auto_window;
use crate::dicom::{DecodedSamples, DicomError, ImageAttributes, PixelRepresentation};
use crate::types::WindowLevel;
use tracing::{debug, warn};

/// Reads the first frame of `samples` and applies the rescale transform
///
/// Sample width comes from the decoded buffer; signedness and rescale from
/// the dataset.
///
/// # Errors
///
/// [`DicomError::InsufficientPixelData`] when the buffer holds fewer bytes
/// than rows x columns samples need, [`DicomError::UnsupportedPixelLayout`]
/// for sample widths other than 8 or 16 bits.
pub fn rescaled_samples(samples: &DecodedSamples, attributes: &ImageAttributes) -> Result<Vec<f64>, DicomError> {
    let bytes_per_sample = match samples.bits_allocated {
        8 => 1,
        16 => 2,
        other => {
            return Err(DicomError::UnsupportedPixelLayout(format!(
                "{other}-bit decoded samples (expected 8 or 16)"
            )));
        }
    };

    let required = attributes.dimensions.pixel_count() * bytes_per_sample;
    if samples.data.len() < required {
        return Err(DicomError::InsufficientPixelData {
            rows: attributes.rows(),
            cols: attributes.cols(),
            bits_allocated: samples.bits_allocated,
            required,
            available: samples.data.len(),
        });
    }
    if samples.data.len() > required {
        debug!(
            required,
            available = samples.data.len(),
            frames = attributes.number_of_frames,
            "using first frame only"
        );
    }

    let frame = &samples.data[..required];
    let signed = attributes.pixel_representation == PixelRepresentation::Signed;
    let rescale = attributes.rescale;

    let values = if bytes_per_sample == 1 {
        frame
            .iter()
            .map(|&b| {
                let raw = if signed { f64::from(b as i8) } else { f64::from(b) };
                rescale.apply(raw)
            })
            .collect()
    } else {
        let order = samples.byte_order;
        frame
            .chunks_exact(2)
            .map(|pair| {
                let word = order.read_u16([pair[0], pair[1]]);
                let raw = if signed { f64::from(word as i16) } else { f64::from(word) };
                rescale.apply(raw)
            })
            .collect()
    };

    Ok(values)
}

/// Picks the window to render with
///
/// An explicit override wins, then the dataset's window; a missing or
/// degenerate window falls back to the full sample range.
#[must_use]
pub fn select_window(
    attributes: &ImageAttributes,
    window_override: Option<WindowLevel>,
    values: &[f64],
) -> WindowLevel {
    for (source, candidate) in [("override", window_override), ("dataset", attributes.window)] {
        match candidate {
            Some(window) if !window.is_degenerate() => {
                debug!(source, %window, "using window");
                return window;
            }
            Some(window) => warn!(source, %window, "degenerate window, ignoring"),
            None => {}
        }
    }

    let window = auto_window(values);
    debug!(%window, "using automatic window");
    window
}

/// Maps rescaled values to 8-bit intensities
#[must_use]
pub fn render_grayscale(values: &[f64], window: WindowLevel, invert: bool) -> Vec<u8> {
    values
        .iter()
        .map(|&v| {
            let gray = window.map(v);
            // MONOCHROME1: minimum is white
            if invert { 255 - gray } else { gray }
        })
        .collect()
}
