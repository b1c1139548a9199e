//! DICOM pixel data extraction
//!
//! Locates (7FE0,0010) and turns it into either ready-to-read samples or an
//! isolated compressed bitstream, according to the transfer syntax.

use super::error::DicomError;
use super::parser::{Element, ITEM, ParsedDataset, SEQUENCE_DELIMITATION};
use super::transfer_syntax::TransferSyntax;
use crate::types::ByteOrder;
use dicom::core::Tag;
use dicom::dictionary_std::tags;
use std::ops::Range;
use tracing::debug;

const ITEM_MARKER: [u8; 4] = [0xFE, 0xFF, 0x00, 0xE0];
const ITEM_HEADER_LEN: usize = 8;

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];
const J2K_SOC_SIZ: [u8; 4] = [0xFF, 0x4F, 0xFF, 0x51];
const JP2_SIGNATURE: [u8; 8] = [0x00, 0x00, 0x00, 0x0C, 0x6A, 0x50, 0x20, 0x20];

/// Uncompressed samples ready for reconstruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSamples {
    pub data: Vec<u8>,
    pub bits_allocated: u16,
    pub byte_order: ByteOrder,
}

/// A compressed bitstream isolated from its encapsulation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedFrame {
    pub syntax: TransferSyntax,
    pub bitstream: Vec<u8>,
}

/// Result of pixel data extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PixelPayload {
    Native(DecodedSamples),
    Compressed(CompressedFrame),
}

impl PixelPayload {
    /// Whether the payload must go through an external decoder first
    #[inline]
    #[must_use]
    pub fn needs_external_decode(&self) -> bool {
        matches!(self, Self::Compressed(_))
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Native(samples) => &samples.data,
            Self::Compressed(frame) => &frame.bitstream,
        }
    }
}

/// Extract pixel data from a parsed dataset according to `syntax`
///
/// # Errors
///
/// [`DicomError::NoPixelData`] if the dataset has no pixel data element,
/// [`DicomError::MalformedEncapsulatedStream`] if a compressed payload cannot
/// be isolated, and [`DicomError::Malformed`] for encapsulated data under a
/// native transfer syntax.
pub fn extract_pixel_data(dataset: &ParsedDataset, syntax: TransferSyntax) -> Result<PixelPayload, DicomError> {
    let element = dataset
        .element(tags::PIXEL_DATA)
        .ok_or(DicomError::NoPixelData)?;
    let value = dataset.value(element);

    debug!(
        %syntax,
        offset = element.offset,
        length = element.length,
        undefined_length = element.undefined_length,
        "extracting pixel data"
    );

    match syntax {
        TransferSyntax::ExplicitVrLittleEndian | TransferSyntax::ImplicitVrLittleEndian => {
            let bits_allocated = native_bits_allocated(dataset, element)?;
            Ok(PixelPayload::Native(DecodedSamples {
                data: value.to_vec(),
                bits_allocated,
                byte_order: ByteOrder::Little,
            }))
        }
        TransferSyntax::ExplicitVrBigEndian => {
            let bits_allocated = native_bits_allocated(dataset, element)?;
            let data = if bits_allocated == 16 {
                swap_16bit_pairs(value)
            } else {
                value.to_vec()
            };
            Ok(PixelPayload::Native(DecodedSamples {
                data,
                bits_allocated,
                byte_order: ByteOrder::Little,
            }))
        }
        TransferSyntax::Jpeg2000 => {
            let bitstream = extract_jpeg2000_codestream(value, element.offset, syntax)?;
            Ok(PixelPayload::Compressed(CompressedFrame { syntax, bitstream }))
        }
        TransferSyntax::JpegLossless => {
            let bitstream = extract_jpeg_frame(value, element.offset, syntax)?;
            Ok(PixelPayload::Compressed(CompressedFrame { syntax, bitstream }))
        }
    }
}

fn native_bits_allocated(dataset: &ParsedDataset, element: &Element) -> Result<u16, DicomError> {
    if element.undefined_length {
        return Err(DicomError::malformed(
            element.offset,
            Some(element.tag),
            "encapsulated pixel data under a native transfer syntax",
        ));
    }
    Ok(dataset.uint16(tags::BITS_ALLOCATED).unwrap_or(16))
}

/// Convert big-endian 16-bit samples to little-endian
fn swap_16bit_pairs(bytes: &[u8]) -> Vec<u8> {
    let chunks = bytes.chunks_exact(2);
    let remainder = chunks.remainder();
    chunks
        .flat_map(|pair| [pair[1], pair[0]])
        .chain(remainder.iter().copied())
        .collect()
}

fn encapsulation_error(syntax: TransferSyntax, offset: usize, reason: impl Into<String>) -> DicomError {
    DicomError::MalformedEncapsulatedStream {
        syntax: syntax.name().to_string(),
        offset,
        reason: reason.into(),
    }
}

/// Splits an encapsulated value into its fragments (ranges into `value`)
///
/// Parsing starts at the first item marker; anything before it is ignored.
/// Stops at the sequence delimiter or the end of the value.
fn encapsulated_fragments(
    value: &[u8],
    base_offset: usize,
    syntax: TransferSyntax,
) -> Result<Vec<Range<usize>>, DicomError> {
    let start = value
        .windows(ITEM_MARKER.len())
        .position(|w| w == ITEM_MARKER)
        .ok_or_else(|| encapsulation_error(syntax, base_offset, "no fragment item marker found"))?;
    if start > 0 {
        debug!(skipped = start, "pixel data does not start with an item marker");
    }

    let mut fragments = Vec::new();
    let mut pos = start;
    while pos + ITEM_HEADER_LEN <= value.len() {
        let tag = Tag(
            u16::from_le_bytes([value[pos], value[pos + 1]]),
            u16::from_le_bytes([value[pos + 2], value[pos + 3]]),
        );
        let length = u32::from_le_bytes([value[pos + 4], value[pos + 5], value[pos + 6], value[pos + 7]]) as usize;
        match tag {
            SEQUENCE_DELIMITATION => break,
            ITEM => {
                let data_start = pos + ITEM_HEADER_LEN;
                let data_end = data_start
                    .checked_add(length)
                    .filter(|&end| end <= value.len())
                    .ok_or_else(|| {
                        encapsulation_error(
                            syntax,
                            base_offset + pos,
                            format!("fragment length {length} runs past end of pixel data"),
                        )
                    })?;
                fragments.push(data_start..data_end);
                pos = data_end;
            }
            other => {
                return Err(encapsulation_error(
                    syntax,
                    base_offset + pos,
                    format!("expected fragment item, found {other}"),
                ));
            }
        }
    }

    if fragments.is_empty() {
        return Err(encapsulation_error(syntax, base_offset + start, "no complete fragment found"));
    }
    Ok(fragments)
}

#[inline]
fn is_jpeg2000_start(bytes: &[u8]) -> bool {
    bytes.starts_with(&J2K_SOC_SIZ) || bytes.starts_with(&JP2_SIGNATURE)
}

/// Reads Basic Offset Table entries
fn offset_table(bytes: &[u8]) -> Vec<usize> {
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]) as usize)
        .collect()
}

/// Isolates the first frame's JPEG 2000 codestream
///
/// The first fragment is the Basic Offset Table unless it already begins
/// with a codestream signature, in which case the table is absent.
fn extract_jpeg2000_codestream(
    value: &[u8],
    base_offset: usize,
    syntax: TransferSyntax,
) -> Result<Vec<u8>, DicomError> {
    let fragments = encapsulated_fragments(value, base_offset, syntax)?;

    let (table, data_fragments) = if is_jpeg2000_start(&value[fragments[0].clone()]) {
        (Vec::new(), &fragments[..])
    } else {
        (offset_table(&value[fragments[0].clone()]), &fragments[1..])
    };

    let Some(first) = data_fragments.first() else {
        return Err(encapsulation_error(
            syntax,
            base_offset + fragments[0].end,
            "no codestream fragment after basic offset table",
        ));
    };

    // Offsets in the table are relative to the first data fragment's item header.
    // Without a second offset, the next frame starts at the next codestream signature.
    let frame_end = table.get(1).copied();
    let items_origin = first.start - ITEM_HEADER_LEN;
    let mut codestream = Vec::with_capacity(first.len());
    for (idx, fragment) in data_fragments.iter().enumerate() {
        let bytes = &value[fragment.clone()];
        let next_frame = match frame_end {
            Some(end) => fragment.start - ITEM_HEADER_LEN - items_origin >= end,
            None => idx > 0 && is_jpeg2000_start(bytes),
        };
        if next_frame {
            break;
        }
        codestream.extend_from_slice(bytes);
    }

    if !is_jpeg2000_start(&codestream) {
        debug!("codestream does not start with a JPEG 2000 signature");
    }
    debug!(
        fragments = data_fragments.len(),
        table_entries = table.len(),
        bytes = codestream.len(),
        "isolated JPEG 2000 codestream"
    );
    Ok(codestream)
}

/// Isolates the first complete SOI..=EOI JPEG frame
///
/// Fragment data after the Basic Offset Table is joined first, so item
/// headers never reach the scan.
fn extract_jpeg_frame(value: &[u8], base_offset: usize, syntax: TransferSyntax) -> Result<Vec<u8>, DicomError> {
    let fragments = encapsulated_fragments(value, base_offset, syntax)?;
    let data_fragments = if value[fragments[0].clone()].starts_with(&JPEG_SOI) {
        &fragments[..]
    } else {
        &fragments[1..]
    };
    let data_offset = base_offset + data_fragments.first().map_or(fragments[0].end, |f| f.start);

    let joined: Vec<u8> = data_fragments
        .iter()
        .flat_map(|fragment| value[fragment.clone()].iter().copied())
        .collect();

    let soi = find_marker(&joined, JPEG_SOI, 0)
        .ok_or_else(|| encapsulation_error(syntax, data_offset, "no JPEG start-of-image marker"))?;
    let eoi = find_marker(&joined, JPEG_EOI, soi + JPEG_SOI.len()).ok_or_else(|| {
        encapsulation_error(
            syntax,
            data_offset,
            "JPEG start-of-image without end-of-image marker",
        )
    })?;
    let frame = joined[soi..eoi + JPEG_EOI.len()].to_vec();
    debug!(
        fragments = data_fragments.len(),
        soi,
        bytes = frame.len(),
        "isolated JPEG frame"
    );
    Ok(frame)
}

fn find_marker(haystack: &[u8], marker: [u8; 2], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(2)
        .position(|w| w == marker)
        .map(|idx| idx + from)
}
