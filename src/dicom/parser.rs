//! DICOM element stream parser
//!
//! Walks the file meta group and the main dataset once and records, for each
//! top-level element, its tag, VR and the byte range of its value inside the
//! shared backing buffer. Values are never copied at parse time.

use super::dictionary;
use super::error::DicomError;
use super::transfer_syntax::uids;
use crate::types::ByteOrder;
use dicom::core::{Tag, VR};
use dicom::dictionary_std::tags;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const PREAMBLE_LEN: usize = 128;
const MAGIC: &[u8; 4] = b"DICM";
const UNDEFINED_LENGTH: u32 = 0xFFFF_FFFF;

/// Nesting limit for sequences inside sequences
const MAX_DEPTH: usize = 64;

pub(crate) const ITEM: Tag = Tag(0xFFFE, 0xE000);
pub(crate) const ITEM_DELIMITATION: Tag = Tag(0xFFFE, 0xE00D);
pub(crate) const SEQUENCE_DELIMITATION: Tag = Tag(0xFFFE, 0xE0DD);

/// One top-level attribute, as a view into the dataset buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element {
    pub tag: Tag,
    pub vr: VR,
    /// Offset of the value's first byte in the backing buffer
    pub offset: usize,
    /// Length of the value in bytes; for undefined-length values this spans
    /// the items but not the sequence delimiter
    pub length: usize,
    pub undefined_length: bool,
}

impl Element {
    #[inline]
    #[must_use]
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.length
    }
}

/// Character repertoire used to decode string values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CharacterSet {
    /// Default repertoire and ISO_IR 100, decoded as Latin-1
    #[default]
    Latin1,
    Utf8,
    Gb18030,
    Gbk,
}

impl CharacterSet {
    /// Resolves a Specific Character Set value, using the last defined term
    #[must_use]
    pub fn from_term(term: &str) -> Self {
        let term = term.split('\\').rfind(|t| !t.trim().is_empty()).unwrap_or("");
        match term.trim() {
            "ISO_IR 192" => Self::Utf8,
            "GB18030" => Self::Gb18030,
            "GBK" => Self::Gbk,
            _ => Self::Latin1,
        }
    }

    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> String {
        let encoding = match self {
            Self::Latin1 => encoding_rs::WINDOWS_1252,
            Self::Utf8 => encoding_rs::UTF_8,
            Self::Gb18030 => encoding_rs::GB18030,
            Self::Gbk => encoding_rs::GBK,
        };
        encoding.decode_without_bom_handling(bytes).0.into_owned()
    }
}

/// Parsed DICOM dataset: the owned buffer plus element ranges into it
///
/// Immutable after construction. Cloning shares the buffer.
#[derive(Debug, Clone)]
pub struct ParsedDataset {
    buffer: Arc<[u8]>,
    elements: Vec<Element>,
    index: HashMap<Tag, usize>,
    byte_order: ByteOrder,
    explicit_vr: bool,
    character_set: CharacterSet,
    /// The body is a deflate stream and was not parsed
    deflated: bool,
}

/// Parses a complete DICOM file (or bare dataset) held in memory
///
/// # Errors
///
/// Returns [`DicomError::Malformed`] if an element header is truncated, a VR
/// is not recognised, or a declared length runs past the end of the buffer.
pub fn parse(buffer: impl Into<Arc<[u8]>>) -> Result<ParsedDataset, DicomError> {
    let buffer: Arc<[u8]> = buffer.into();
    let buf: &[u8] = &buffer;

    let has_preamble = buf.len() >= PREAMBLE_LEN + MAGIC.len()
        && &buf[PREAMBLE_LEN..PREAMBLE_LEN + MAGIC.len()] == MAGIC;
    let mut pos = if has_preamble {
        PREAMBLE_LEN + MAGIC.len()
    } else {
        0
    };

    let mut elements = Vec::new();

    // File meta group is always explicit VR little endian
    let meta_reader = ElementReader {
        buf,
        byte_order: ByteOrder::Little,
        explicit_vr: true,
    };
    while pos + 2 <= buf.len() && meta_reader.u16_at(pos) == 0x0002 {
        let (element, next) = meta_reader.read_element(pos, 0)?;
        elements.push(element);
        pos = next;
    }

    let transfer_syntax_uid = elements
        .iter()
        .find(|e| e.tag == tags::TRANSFER_SYNTAX_UID)
        .map(|e| decode_trimmed(CharacterSet::Latin1, &buf[e.range()]));

    let deflated = transfer_syntax_uid.as_deref().is_some_and(uids::is_deflated);
    let (byte_order, explicit_vr) = match transfer_syntax_uid.as_deref() {
        Some(uids::IMPLICIT_VR_LITTLE_ENDIAN) => (ByteOrder::Little, false),
        Some(uids::EXPLICIT_VR_BIG_ENDIAN) => (ByteOrder::Big, true),
        Some(_) => (ByteOrder::Little, true),
        None => (ByteOrder::Little, looks_explicit(buf, pos)),
    };
    debug!(
        ?transfer_syntax_uid,
        %byte_order,
        explicit_vr,
        dataset_offset = pos,
        "parsing dataset"
    );

    if deflated {
        debug!(body_bytes = buf.len() - pos, "deflated dataset body left unparsed");
        pos = buf.len();
    }

    let reader = ElementReader {
        buf,
        byte_order,
        explicit_vr,
    };
    while pos < buf.len() {
        let (element, next) = reader.read_element(pos, 0)?;
        elements.push(element);
        pos = next;
    }

    let mut index = HashMap::with_capacity(elements.len());
    for (idx, element) in elements.iter().enumerate() {
        index.entry(element.tag).or_insert(idx);
    }

    let character_set = index
        .get(&tags::SPECIFIC_CHARACTER_SET)
        .map(|&idx| CharacterSet::from_term(&decode_trimmed(CharacterSet::Latin1, &buf[elements[idx].range()])))
        .unwrap_or_default();

    Ok(ParsedDataset {
        buffer,
        elements,
        index,
        byte_order,
        explicit_vr,
        character_set,
        deflated,
    })
}

/// Guesses the VR mode of a dataset without a transfer syntax
fn looks_explicit(buf: &[u8], pos: usize) -> bool {
    buf.get(pos + 4..pos + 6)
        .and_then(|vr| VR::from_binary([vr[0], vr[1]]))
        .is_some()
}

fn decode_trimmed(charset: CharacterSet, bytes: &[u8]) -> String {
    charset
        .decode(bytes)
        .trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string()
}

/// VRs whose explicit header carries 2 reserved bytes and a 4-byte length
#[inline]
pub(crate) fn has_long_length(vr: VR) -> bool {
    matches!(
        vr,
        VR::OB
            | VR::OD
            | VR::OF
            | VR::OL
            | VR::OV
            | VR::OW
            | VR::SQ
            | VR::SV
            | VR::UC
            | VR::UN
            | VR::UR
            | VR::UT
            | VR::UV
    )
}

struct ElementReader<'a> {
    buf: &'a [u8],
    byte_order: ByteOrder,
    explicit_vr: bool,
}

impl ElementReader<'_> {
    fn u16_at(&self, pos: usize) -> u16 {
        self.byte_order.read_u16([self.buf[pos], self.buf[pos + 1]])
    }

    fn u32_at(&self, pos: usize) -> u32 {
        self.byte_order.read_u32([
            self.buf[pos],
            self.buf[pos + 1],
            self.buf[pos + 2],
            self.buf[pos + 3],
        ])
    }

    fn require(&self, pos: usize, len: usize, tag: Option<Tag>, what: &str) -> Result<(), DicomError> {
        if pos + len > self.buf.len() {
            return Err(DicomError::malformed(
                pos,
                tag,
                format!(
                    "truncated {what}: need {len} bytes, {} remain",
                    self.buf.len().saturating_sub(pos)
                ),
            ));
        }
        Ok(())
    }

    fn read_tag(&self, pos: usize) -> Tag {
        Tag(self.u16_at(pos), self.u16_at(pos + 2))
    }

    /// Reads the element starting at `pos`; returns it and the offset after it
    fn read_element(&self, pos: usize, depth: usize) -> Result<(Element, usize), DicomError> {
        self.require(pos, 8, None, "element header")?;
        let tag = self.read_tag(pos);
        if tag.0 == 0xFFFE {
            return Err(DicomError::malformed(
                pos,
                Some(tag),
                "item or delimiter outside of a sequence",
            ));
        }

        let (mut vr, length, header_len) = if self.explicit_vr {
            let vr = VR::from_binary([self.buf[pos + 4], self.buf[pos + 5]]).ok_or_else(|| {
                DicomError::malformed(
                    pos + 4,
                    Some(tag),
                    format!(
                        "invalid value representation {:02X} {:02X}",
                        self.buf[pos + 4],
                        self.buf[pos + 5]
                    ),
                )
            })?;
            if has_long_length(vr) {
                self.require(pos, 12, Some(tag), "element header")?;
                (vr, self.u32_at(pos + 8), 12)
            } else {
                (vr, u32::from(self.u16_at(pos + 6)), 8)
            }
        } else {
            (dictionary::expected_vr(tag), self.u32_at(pos + 4), 8)
        };

        let value_offset = pos + header_len;

        if length == UNDEFINED_LENGTH {
            if !self.explicit_vr || vr == VR::UN {
                vr = if tag == tags::PIXEL_DATA { VR::OB } else { VR::SQ };
            }
            let (content_end, next) = self.skip_undefined_length(value_offset, tag, depth)?;
            let element = Element {
                tag,
                vr,
                offset: value_offset,
                length: content_end - value_offset,
                undefined_length: true,
            };
            return Ok((element, next));
        }

        let length = length as usize;
        if value_offset + length > self.buf.len() {
            return Err(DicomError::malformed(
                value_offset,
                Some(tag),
                format!(
                    "declared length {length} runs past end of buffer ({} bytes)",
                    self.buf.len()
                ),
            ));
        }

        let element = Element {
            tag,
            vr,
            offset: value_offset,
            length,
            undefined_length: false,
        };
        Ok((element, value_offset + length))
    }

    /// Walks the items of an undefined-length value up to its sequence
    /// delimiter. Returns the delimiter's offset and the offset after it.
    fn skip_undefined_length(
        &self,
        start: usize,
        owner: Tag,
        depth: usize,
    ) -> Result<(usize, usize), DicomError> {
        if depth >= MAX_DEPTH {
            return Err(DicomError::malformed(start, Some(owner), "sequences nested too deeply"));
        }

        let mut pos = start;
        loop {
            self.require(pos, 8, Some(owner), "item header (unterminated sequence)")?;
            let tag = self.read_tag(pos);
            let length = self.u32_at(pos + 4);
            match tag {
                SEQUENCE_DELIMITATION => return Ok((pos, pos + 8)),
                ITEM if length == UNDEFINED_LENGTH => {
                    pos = self.skip_item_contents(pos + 8, owner, depth + 1)?;
                }
                ITEM => {
                    let end = pos + 8 + length as usize;
                    if end > self.buf.len() {
                        return Err(DicomError::malformed(
                            pos,
                            Some(owner),
                            format!("item length {length} runs past end of buffer"),
                        ));
                    }
                    pos = end;
                }
                other => {
                    return Err(DicomError::malformed(
                        pos,
                        Some(owner),
                        format!("unexpected {other} inside undefined-length value"),
                    ));
                }
            }
        }
    }

    /// Reads nested elements of an undefined-length item up to and including
    /// its item delimiter
    fn skip_item_contents(&self, start: usize, owner: Tag, depth: usize) -> Result<usize, DicomError> {
        let mut pos = start;
        loop {
            self.require(pos, 8, Some(owner), "item contents (missing item delimiter)")?;
            if self.read_tag(pos) == ITEM_DELIMITATION {
                return Ok(pos + 8);
            }
            let (_, next) = self.read_element(pos, depth)?;
            pos = next;
        }
    }
}

impl ParsedDataset {
    #[must_use]
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    #[must_use]
    pub fn element(&self, tag: Tag) -> Option<&Element> {
        self.index.get(&tag).map(|&idx| &self.elements[idx])
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, tag: Tag) -> bool {
        self.index.contains_key(&tag)
    }

    #[must_use]
    pub fn buffer(&self) -> &Arc<[u8]> {
        &self.buffer
    }

    /// Byte order of the main dataset (the meta group is always little endian)
    #[must_use]
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    #[must_use]
    pub fn is_explicit_vr(&self) -> bool {
        self.explicit_vr
    }

    #[must_use]
    pub fn character_set(&self) -> CharacterSet {
        self.character_set
    }

    /// Raw value bytes of an element
    #[must_use]
    pub fn value(&self, element: &Element) -> &[u8] {
        &self.buffer[element.range()]
    }

    #[must_use]
    pub fn bytes(&self, tag: Tag) -> Option<&[u8]> {
        self.element(tag).map(|e| self.value(e))
    }

    fn byte_order_of(&self, tag: Tag) -> ByteOrder {
        if tag.0 == 0x0002 {
            ByteOrder::Little
        } else {
            self.byte_order
        }
    }

    /// Decoded string value with padding trimmed
    #[must_use]
    pub fn string(&self, tag: Tag) -> Option<String> {
        let element = self.element(tag)?;
        let charset = if tag.0 == 0x0002 {
            CharacterSet::Latin1
        } else {
            self.character_set
        };
        Some(decode_trimmed(charset, self.value(element)))
    }

    /// First 16-bit value of an element; later values of a multi-valued
    /// element are ignored
    #[must_use]
    pub fn uint16(&self, tag: Tag) -> Option<u16> {
        let bytes = self.bytes(tag)?;
        let first: [u8; 2] = bytes.get(..2)?.try_into().ok()?;
        Some(self.byte_order_of(tag).read_u16(first))
    }

    #[must_use]
    pub fn int16(&self, tag: Tag) -> Option<i16> {
        self.uint16(tag).map(|v| v as i16)
    }

    /// First 32-bit value of an element
    #[must_use]
    pub fn uint32(&self, tag: Tag) -> Option<u32> {
        let bytes = self.bytes(tag)?;
        let first: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
        Some(self.byte_order_of(tag).read_u32(first))
    }

    /// First 64-bit value of an element
    #[must_use]
    pub fn uint64(&self, tag: Tag) -> Option<u64> {
        let bytes = self.bytes(tag)?;
        let first: [u8; 8] = bytes.get(..8)?.try_into().ok()?;
        Some(self.byte_order_of(tag).read_u64(first))
    }

    /// First value of a decimal/integer string as a float; `None` when the
    /// element is missing or the value does not parse to a finite number
    #[must_use]
    pub fn float_string(&self, tag: Tag) -> Option<f64> {
        let value = self.string(tag)?;
        let first = value.split('\\').next()?.trim();
        first.parse::<f64>().ok().filter(|v| v.is_finite())
    }

    #[must_use]
    pub fn transfer_syntax_uid(&self) -> Option<String> {
        self.string(tags::TRANSFER_SYNTAX_UID)
    }

    /// Transfer syntax UID when the body is deflated and only the file meta
    /// group was read
    #[must_use]
    pub fn deflated_syntax(&self) -> Option<String> {
        if self.deflated {
            self.transfer_syntax_uid()
        } else {
            None
        }
    }

    /// SOP Class UID from the dataset, else from the file meta group
    #[must_use]
    pub fn sop_class_uid(&self) -> Option<String> {
        self.string(tags::SOP_CLASS_UID)
            .or_else(|| self.string(tags::MEDIA_STORAGE_SOP_CLASS_UID))
            .filter(|uid| !uid.is_empty())
    }
}
