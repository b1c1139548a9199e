//! Decoding of compressed pixel data by external codecs
//!
//! The core never links a JPEG 2000 or JPEG Lossless codec. It hands the
//! isolated bitstream to an [`ExternalDecoder`] and gets samples back.

mod command;

pub use command::CommandDecoder;

use crate::dicom::{DecodedSamples, DicomError, PixelPayload, TransferSyntax};
use crate::types::ByteOrder;
use image::{DynamicImage, ImageFormat};

/// Synchronous decode round-trip for codecs the core cannot decode itself
///
/// Implementations must report failures as [`DicomError::ExternalDecode`]
/// with the tool's own diagnostic text. Callers needing a timeout wrap the
/// decoder themselves; nothing here retries.
pub trait ExternalDecoder {
    fn decode_jpeg2000(&self, codestream: &[u8]) -> Result<DecodedSamples, DicomError>;

    fn decode_jpeg_lossless(&self, frame: &[u8]) -> Result<DecodedSamples, DicomError>;
}

/// Routes a payload through `decoder` when it is compressed
///
/// # Errors
///
/// Whatever the decoder reports, or [`DicomError::UnsupportedTransferSyntax`]
/// for a compressed frame tagged with a native syntax.
pub fn decode_payload(payload: PixelPayload, decoder: &dyn ExternalDecoder) -> Result<DecodedSamples, DicomError> {
    match payload {
        PixelPayload::Native(samples) => Ok(samples),
        PixelPayload::Compressed(frame) => match frame.syntax {
            TransferSyntax::Jpeg2000 => decoder.decode_jpeg2000(&frame.bitstream),
            TransferSyntax::JpegLossless => decoder.decode_jpeg_lossless(&frame.bitstream),
            other => Err(DicomError::UnsupportedTransferSyntax {
                uid: other.uid().to_string(),
                name: other.name().to_string(),
            }),
        },
    }
}

/// Reads a portable graymap produced by a decoder into samples
///
/// 8-bit maps become one byte per sample; deeper maps become 16-bit little
/// endian samples.
///
/// # Errors
///
/// [`DicomError::ExternalDecode`] naming `tool` if the output is not a
/// readable single-channel PNM.
pub fn samples_from_pgm(tool: &str, bytes: &[u8]) -> Result<DecodedSamples, DicomError> {
    let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Pnm).map_err(|e| {
        DicomError::ExternalDecode {
            tool: tool.to_string(),
            diagnostic: format!("unreadable graymap output: {e}"),
        }
    })?;

    match decoded {
        DynamicImage::ImageLuma8(gray) => Ok(DecodedSamples {
            data: gray.into_raw(),
            bits_allocated: 8,
            byte_order: ByteOrder::Little,
        }),
        DynamicImage::ImageLuma16(gray) => Ok(DecodedSamples {
            data: gray.into_raw().iter().flat_map(|s| s.to_le_bytes()).collect(),
            bits_allocated: 16,
            byte_order: ByteOrder::Little,
        }),
        other => Err(DicomError::ExternalDecode {
            tool: tool.to_string(),
            diagnostic: format!("expected a grayscale map, got {:?}", other.color()),
        }),
    }
}
