//! In-memory DICOM fixtures for unit tests

use super::parser::has_long_length;
use super::transfer_syntax::uids;
use crate::types::ByteOrder;
use dicom::core::{Tag, VR};
use dicom::dictionary_std::tags;

pub const CT_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.2";
pub const BASIC_TEXT_SR_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.88.11";

enum Value {
    Defined(Vec<u8>),
    /// Items only; the sequence delimiter is appended on build
    Undefined(Vec<u8>),
}

/// Builds DICOM files element by element
pub struct DatasetBuilder {
    transfer_syntax: Option<&'static str>,
    byte_order: ByteOrder,
    explicit_vr: bool,
    sop_class: &'static str,
    elements: Vec<(Tag, VR, Value)>,
    /// Appended verbatim after the encoded elements
    raw_body: Vec<u8>,
}

impl DatasetBuilder {
    pub fn explicit_le() -> Self {
        Self::with_transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
    }

    pub fn implicit_le() -> Self {
        Self::with_transfer_syntax(uids::IMPLICIT_VR_LITTLE_ENDIAN)
    }

    pub fn explicit_be() -> Self {
        Self::with_transfer_syntax(uids::EXPLICIT_VR_BIG_ENDIAN)
    }

    /// Any other syntax is encoded as explicit VR little endian
    pub fn with_transfer_syntax(uid: &'static str) -> Self {
        let (byte_order, explicit_vr) = match uid {
            uids::IMPLICIT_VR_LITTLE_ENDIAN => (ByteOrder::Little, false),
            uids::EXPLICIT_VR_BIG_ENDIAN => (ByteOrder::Big, true),
            _ => (ByteOrder::Little, true),
        };
        Self {
            transfer_syntax: Some(uid),
            byte_order,
            explicit_vr,
            sop_class: CT_IMAGE_STORAGE,
            elements: Vec::new(),
            raw_body: Vec::new(),
        }
    }

    /// Drops the preamble and file meta group
    pub fn without_file_meta(mut self) -> Self {
        self.transfer_syntax = None;
        self
    }

    pub fn sop_class(mut self, uid: &'static str) -> Self {
        self.sop_class = uid;
        self
    }

    /// Adds an element, replacing any earlier one with the same tag
    pub fn bytes(mut self, tag: Tag, vr: VR, data: Vec<u8>) -> Self {
        self.elements.retain(|(t, _, _)| *t != tag);
        self.elements.push((tag, vr, Value::Defined(data)));
        self
    }

    pub fn string(self, tag: Tag, vr: VR, value: &str) -> Self {
        let mut data = value.as_bytes().to_vec();
        if data.len() % 2 == 1 {
            data.push(if vr == VR::UI { 0 } else { b' ' });
        }
        self.bytes(tag, vr, data)
    }

    pub fn u16(self, tag: Tag, value: u16) -> Self {
        let data = match self.byte_order {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        };
        self.bytes(tag, VR::US, data.to_vec())
    }

    /// 16-bit samples encoded in the dataset's byte order
    pub fn pixel_data_u16(self, samples: &[u16]) -> Self {
        let order = self.byte_order;
        let data = samples
            .iter()
            .flat_map(|&s| match order {
                ByteOrder::Little => s.to_le_bytes(),
                ByteOrder::Big => s.to_be_bytes(),
            })
            .collect();
        self.bytes(tags::PIXEL_DATA, VR::OW, data)
    }

    pub fn pixel_data_i16(self, samples: &[i16]) -> Self {
        let as_unsigned: Vec<u16> = samples.iter().map(|&s| s as u16).collect();
        self.pixel_data_u16(&as_unsigned)
    }

    /// Dataset bytes that are not element-encoded, such as a deflate stream
    pub fn raw_body(mut self, bytes: &[u8]) -> Self {
        self.raw_body.extend_from_slice(bytes);
        self
    }

    pub fn undefined_length(mut self, tag: Tag, vr: VR, items: Vec<u8>) -> Self {
        self.elements.retain(|(t, _, _)| *t != tag);
        self.elements.push((tag, vr, Value::Undefined(items)));
        self
    }

    /// Monochrome image attributes plus 16-bit pixel data
    pub fn monochrome_image(self, rows: u16, cols: u16, samples: &[u16]) -> Self {
        self.string(tags::SOP_CLASS_UID, VR::UI, CT_IMAGE_STORAGE)
            .u16(tags::SAMPLES_PER_PIXEL, 1)
            .string(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2")
            .u16(tags::ROWS, rows)
            .u16(tags::COLUMNS, cols)
            .u16(tags::BITS_ALLOCATED, 16)
            .u16(tags::BITS_STORED, 16)
            .u16(tags::HIGH_BIT, 15)
            .u16(tags::PIXEL_REPRESENTATION, 0)
            .pixel_data_u16(samples)
    }

    /// An undefined-length item holding explicit VR little endian elements
    pub fn item_with_undefined_length(elements: &[(Tag, VR, Vec<u8>)]) -> Vec<u8> {
        let mut out = item_header(0xE000, 0xFFFF_FFFF);
        for (tag, vr, data) in elements {
            encode_element(&mut out, *tag, *vr, data, ByteOrder::Little, true, false);
        }
        out.extend(item_header(0xE00D, 0));
        out
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();

        if let Some(uid) = self.transfer_syntax {
            out.extend(std::iter::repeat_n(0u8, 128));
            out.extend_from_slice(b"DICM");

            let mut meta = Vec::new();
            let ts = padded_uid(uid);
            let sop = padded_uid(self.sop_class);
            encode_element(&mut meta, tags::FILE_META_INFORMATION_VERSION, VR::OB, &[0, 1], ByteOrder::Little, true, false);
            encode_element(&mut meta, tags::MEDIA_STORAGE_SOP_CLASS_UID, VR::UI, &sop, ByteOrder::Little, true, false);
            encode_element(&mut meta, tags::TRANSFER_SYNTAX_UID, VR::UI, &ts, ByteOrder::Little, true, false);

            let group_length = (meta.len() as u32).to_le_bytes();
            encode_element(&mut out, tags::FILE_META_INFORMATION_GROUP_LENGTH, VR::UL, &group_length, ByteOrder::Little, true, false);
            out.extend(meta);
        }

        let mut elements: Vec<&(Tag, VR, Value)> = self.elements.iter().collect();
        elements.sort_by_key(|(tag, _, _)| *tag);
        for (tag, vr, value) in elements {
            match value {
                Value::Defined(data) => {
                    encode_element(&mut out, *tag, *vr, data, self.byte_order, self.explicit_vr, false);
                }
                Value::Undefined(items) => {
                    encode_element(&mut out, *tag, *vr, items, self.byte_order, self.explicit_vr, true);
                    out.extend(item_header(0xE0DD, 0));
                }
            }
        }
        out.extend_from_slice(&self.raw_body);
        out
    }
}

/// Encapsulated pixel data items (little endian) for the given fragments
pub fn encapsulated(fragments: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for fragment in fragments {
        out.extend(item_header(0xE000, fragment.len() as u32));
        out.extend_from_slice(fragment);
    }
    out
}

fn item_header(element: u16, length: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(8);
    out.extend_from_slice(&0xFFFEu16.to_le_bytes());
    out.extend_from_slice(&element.to_le_bytes());
    out.extend_from_slice(&length.to_le_bytes());
    out
}

fn padded_uid(uid: &str) -> Vec<u8> {
    let mut data = uid.as_bytes().to_vec();
    if data.len() % 2 == 1 {
        data.push(0);
    }
    data
}

fn encode_element(
    out: &mut Vec<u8>,
    tag: Tag,
    vr: VR,
    data: &[u8],
    order: ByteOrder,
    explicit_vr: bool,
    undefined_length: bool,
) {
    let u16_bytes = |v: u16| match order {
        ByteOrder::Little => v.to_le_bytes(),
        ByteOrder::Big => v.to_be_bytes(),
    };
    let u32_bytes = |v: u32| match order {
        ByteOrder::Little => v.to_le_bytes(),
        ByteOrder::Big => v.to_be_bytes(),
    };
    let length = if undefined_length {
        0xFFFF_FFFF
    } else {
        data.len() as u32
    };

    out.extend_from_slice(&u16_bytes(tag.0));
    out.extend_from_slice(&u16_bytes(tag.1));
    if explicit_vr {
        out.extend_from_slice(format!("{vr:?}").as_bytes());
        if has_long_length(vr) {
            out.extend_from_slice(&[0, 0]);
            out.extend_from_slice(&u32_bytes(length));
        } else {
            out.extend_from_slice(&u16_bytes(length as u16));
        }
    } else {
        out.extend_from_slice(&u32_bytes(length));
    }
    out.extend_from_slice(data);
}
