//! Raster reconstruction
//!
//! Decoded samples plus the dataset's image attributes become an 8-bit
//! grayscale raster and its PNG encoding.

mod grayscale;
mod normalization;
mod png;

pub use grayscale::{render_grayscale, rescaled_samples, select_window};
pub use normalization::{auto_window, find_min_max};
pub use png::{ChunkType, PNG_SIGNATURE, RawChunk, RawChunkIter, crc32, encode_grayscale};

use crate::dicom::{DecodedSamples, DicomError, ImageAttributes, ParsedDataset};
use crate::types::WindowLevel;
use image::GrayImage;
use tracing::debug;

/// An 8-bit grayscale raster and its PNG file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    png: Vec<u8>,
}

impl RasterImage {
    #[inline(always)]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline(always)]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major intensities, `width * height` bytes
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Complete PNG file
    #[must_use]
    pub fn png(&self) -> &[u8] {
        &self.png
    }

    #[must_use]
    pub fn into_png(self) -> Vec<u8> {
        self.png
    }

    /// Copy of the raster as an `image` buffer
    #[must_use]
    pub fn to_gray_image(&self) -> Option<GrayImage> {
        GrayImage::from_raw(self.width, self.height, self.pixels.clone())
    }
}

/// Reconstructs a raster from decoded samples
///
/// `window_override` takes precedence over the dataset's window when it is
/// usable; otherwise a degenerate or missing window falls back to the
/// sample range.
///
/// # Errors
///
/// [`DicomError::MissingAttribute`] without Rows/Columns,
/// [`DicomError::UnsupportedPixelLayout`] for non-monochrome layouts,
/// [`DicomError::InsufficientPixelData`] when `samples` is too short.
pub fn reconstruct(
    samples: &DecodedSamples,
    dataset: &ParsedDataset,
    window_override: Option<WindowLevel>,
) -> Result<RasterImage, DicomError> {
    let attributes = ImageAttributes::from_dataset(dataset)?;
    reconstruct_with_attributes(samples, &attributes, window_override)
}

/// [`reconstruct`] with attributes already read off the dataset
///
/// # Errors
///
/// See [`reconstruct`].
pub fn reconstruct_with_attributes(
    samples: &DecodedSamples,
    attributes: &ImageAttributes,
    window_override: Option<WindowLevel>,
) -> Result<RasterImage, DicomError> {
    let values = rescaled_samples(samples, attributes)?;
    let window = select_window(attributes, window_override, &values);
    let invert = attributes.photometric_interpretation.should_invert();
    let pixels = render_grayscale(&values, window, invert);

    let width = u32::from(attributes.cols());
    let height = u32::from(attributes.rows());
    let png = encode_grayscale(width, height, &pixels)?;
    debug!(width, height, %window, invert, png_bytes = png.len(), "reconstructed raster");

    Ok(RasterImage {
        width,
        height,
        pixels,
        png,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dicom::testing::DatasetBuilder;
    use crate::dicom::{PixelPayload, TransferSyntax, extract_pixel_data, parse};
    use crate::types::ByteOrder;
    use assert_matches::assert_matches;
    use dicom::core::VR;
    use dicom::dictionary_std::tags;

    fn native_samples(dataset: &ParsedDataset, syntax: TransferSyntax) -> DecodedSamples {
        match extract_pixel_data(dataset, syntax).unwrap() {
            PixelPayload::Native(samples) => samples,
            other => panic!("expected native samples, got {other:?}"),
        }
    }

    fn ihdr_dimensions(png: &[u8]) -> (u32, u32) {
        let ihdr = RawChunkIter::new(png).next().unwrap();
        assert_eq!(ihdr.kind, ChunkType::IHDR);
        (
            u32::from_be_bytes(ihdr.data[0..4].try_into().unwrap()),
            u32::from_be_bytes(ihdr.data[4..8].try_into().unwrap()),
        )
    }

    #[test]
    fn test_ihdr_matches_columns_and_rows() {
        for (rows, cols) in [(1u16, 1u16), (3, 7), (16, 5), (64, 64)] {
            let pixels: Vec<u16> = (0..u32::from(rows) * u32::from(cols)).map(|v| v as u16).collect();
            let dataset = parse(DatasetBuilder::explicit_le().monochrome_image(rows, cols, &pixels).build()).unwrap();
            let samples = native_samples(&dataset, TransferSyntax::ExplicitVrLittleEndian);

            let raster = reconstruct(&samples, &dataset, None).unwrap();
            assert_eq!((raster.width(), raster.height()), (u32::from(cols), u32::from(rows)));
            assert_eq!(ihdr_dimensions(raster.png()), (u32::from(cols), u32::from(rows)));
        }
    }

    #[test]
    fn test_reconstruction_is_idempotent() {
        let pixels: Vec<u16> = (0..48).map(|v| v * 97).collect();
        let dataset = parse(DatasetBuilder::explicit_le().monochrome_image(6, 8, &pixels).build()).unwrap();
        let samples = native_samples(&dataset, TransferSyntax::ExplicitVrLittleEndian);

        let first = reconstruct(&samples, &dataset, None).unwrap();
        let second = reconstruct(&samples, &dataset, None).unwrap();
        assert_eq!(first.png(), second.png());
    }

    #[test]
    fn test_auto_window_end_to_end() {
        let pixels = [100u16, 1000, 2050, 4000];
        let dataset = parse(DatasetBuilder::explicit_le().monochrome_image(2, 2, &pixels).build()).unwrap();
        let samples = native_samples(&dataset, TransferSyntax::ExplicitVrLittleEndian);

        let raster = reconstruct(&samples, &dataset, None).unwrap();
        assert_eq!(raster.pixels()[0], 0);
        assert_eq!(raster.pixels()[2], 128);
        assert_eq!(raster.pixels()[3], 255);
    }

    #[test]
    fn test_dataset_window_clamps() {
        let pixels = [0u16, 39, 40, 41, 1000];
        let dataset = parse(
            DatasetBuilder::explicit_le()
                .monochrome_image(1, 5, &pixels)
                .string(tags::WINDOW_CENTER, VR::DS, "40")
                .string(tags::WINDOW_WIDTH, VR::DS, "2")
                .build(),
        )
        .unwrap();
        let samples = native_samples(&dataset, TransferSyntax::ExplicitVrLittleEndian);

        let raster = reconstruct(&samples, &dataset, None).unwrap();
        assert_eq!(raster.pixels(), &[0, 0, 128, 255, 255]);
    }

    #[test]
    fn test_zero_width_window_does_not_divide_by_zero() {
        let pixels = [100u16, 4000];
        let dataset = parse(
            DatasetBuilder::explicit_le()
                .monochrome_image(1, 2, &pixels)
                .string(tags::WINDOW_CENTER, VR::DS, "40")
                .string(tags::WINDOW_WIDTH, VR::DS, "0")
                .build(),
        )
        .unwrap();
        let samples = native_samples(&dataset, TransferSyntax::ExplicitVrLittleEndian);

        let raster = reconstruct(&samples, &dataset, None).unwrap();
        assert_eq!(raster.pixels(), &[0, 255]);
    }

    #[test]
    fn test_big_endian_dataset_reads_258() {
        let dataset = parse(
            DatasetBuilder::explicit_be()
                .monochrome_image(1, 2, &[0x0102, 0x0000])
                .build(),
        )
        .unwrap();
        let samples = native_samples(&dataset, TransferSyntax::ExplicitVrBigEndian);
        let attributes = ImageAttributes::from_dataset(&dataset).unwrap();

        let values = rescaled_samples(&samples, &attributes).unwrap();
        assert_eq!(values, vec![258.0, 0.0]);
        assert_eq!(samples.byte_order, ByteOrder::Little);
    }

    #[test]
    fn test_monochrome1_is_inverted() {
        let dataset = parse(
            DatasetBuilder::explicit_le()
                .monochrome_image(1, 2, &[0, 10])
                .string(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME1")
                .build(),
        )
        .unwrap();
        let samples = native_samples(&dataset, TransferSyntax::ExplicitVrLittleEndian);

        let raster = reconstruct(&samples, &dataset, None).unwrap();
        assert_eq!(raster.pixels(), &[255, 0]);
    }

    #[test]
    fn test_signed_samples_end_to_end() {
        let dataset = parse(
            DatasetBuilder::explicit_le()
                .monochrome_image(1, 3, &[0, 0, 0])
                .u16(tags::PIXEL_REPRESENTATION, 1)
                .pixel_data_i16(&[-100, 0, 100])
                .build(),
        )
        .unwrap();
        let samples = native_samples(&dataset, TransferSyntax::ExplicitVrLittleEndian);

        let raster = reconstruct(&samples, &dataset, None).unwrap();
        assert_eq!(raster.pixels(), &[0, 128, 255]);
    }

    #[test]
    fn test_window_override() {
        let dataset = parse(DatasetBuilder::explicit_le().monochrome_image(1, 3, &[0, 50, 100]).build()).unwrap();
        let samples = native_samples(&dataset, TransferSyntax::ExplicitVrLittleEndian);

        let raster = reconstruct(&samples, &dataset, Some(WindowLevel::new(50.0, 50.0))).unwrap();
        assert_eq!(raster.pixels(), &[0, 128, 255]);
    }

    #[test]
    fn test_insufficient_pixel_data_is_reported() {
        let dataset = parse(DatasetBuilder::explicit_le().monochrome_image(4, 4, &[1, 2, 3]).build()).unwrap();
        let samples = native_samples(&dataset, TransferSyntax::ExplicitVrLittleEndian);

        assert_matches!(
            reconstruct(&samples, &dataset, None),
            Err(DicomError::InsufficientPixelData { required: 32, available: 6, .. })
        );
    }

    #[test]
    fn test_png_opens_in_image_crate() {
        let pixels: Vec<u16> = (0..20).map(|v| v * 100).collect();
        let dataset = parse(DatasetBuilder::explicit_le().monochrome_image(4, 5, &pixels).build()).unwrap();
        let samples = native_samples(&dataset, TransferSyntax::ExplicitVrLittleEndian);
        let raster = reconstruct(&samples, &dataset, None).unwrap();

        let decoded = image::load_from_memory(raster.png()).unwrap().into_luma8();
        assert_eq!(decoded.dimensions(), (5, 4));
        assert_eq!(decoded.as_raw(), raster.pixels());
        assert_eq!(raster.to_gray_image().unwrap(), decoded);
    }
}
