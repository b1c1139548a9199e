//! Flat metadata map for document generation
//!
//! Every top-level element becomes one entry keyed by its dictionary keyword
//! (or `x` + tag hex for tags the dictionaries do not know). Binary blobs,
//! sequences and values that only look like text are left out.

use super::attributes::extract_sop_class;
use super::dictionary;
use super::parser::{Element, ParsedDataset};
use super::transfer_syntax::standard_name;
use dicom::core::{Tag, VR};
use dicom::dictionary_std::tags;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::debug;

/// Share of non-printable characters above which a value is treated as binary
const NON_PRINTABLE_RATIO: f64 = 0.15;
/// Longer values without any whitespace are treated as binary
const MAX_UNBROKEN_LEN: usize = 100;

pub const SOP_CLASS_NAME_KEY: &str = "SOPClassName";
pub const TRANSFER_SYNTAX_NAME_KEY: &str = "TransferSyntaxName";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// Trimmed text with double quotes escaped; serialized unescaped
    Text(#[serde(serialize_with = "serialize_unescaped")] String),
    Number(f64),
    Bool(bool),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

pub type MetadataMap = BTreeMap<String, MetadataValue>;

/// Tags never worth putting in a document
#[must_use]
pub fn default_skip_tags() -> HashSet<Tag> {
    HashSet::from([
        tags::PIXEL_DATA,
        tags::FLOAT_PIXEL_DATA,
        tags::DOUBLE_FLOAT_PIXEL_DATA,
        tags::ENCAPSULATED_DOCUMENT,
        tags::ICON_IMAGE_SEQUENCE,
        tags::WAVEFORM_DATA,
        Tag(0x6000, 0x3000), // Overlay Data
    ])
}

/// Extracts a flat keyword → value map, leaving out `skip` and any binary data
#[must_use]
pub fn extract_metadata(dataset: &ParsedDataset, skip: &HashSet<Tag>) -> MetadataMap {
    let mut metadata = MetadataMap::new();

    for element in dataset.elements() {
        if skip.contains(&element.tag) || is_always_skipped(element) {
            continue;
        }
        let Some(value) = decode_value(dataset, element) else {
            debug!(tag = %element.tag, vr = ?element.vr, "dropping metadata element");
            continue;
        };
        metadata
            .entry(dictionary::keyword(element.tag).into_owned())
            .or_insert(value);
    }

    if let Some(sop_class) = extract_sop_class(dataset) {
        metadata.insert(SOP_CLASS_NAME_KEY.to_string(), MetadataValue::Text(sop_class.name));
    }
    if let Some(uid) = dataset.transfer_syntax_uid() {
        metadata.insert(
            TRANSFER_SYNTAX_NAME_KEY.to_string(),
            MetadataValue::Text(standard_name(&uid)),
        );
    }

    metadata
}

fn is_always_skipped(element: &Element) -> bool {
    element.tag == tags::PIXEL_DATA
        || element.tag.1 == 0x0000 // group length
        || element.undefined_length
        || dictionary::is_binary_vr(element.vr)
}

fn decode_value(dataset: &ParsedDataset, element: &Element) -> Option<MetadataValue> {
    let tag = element.tag;
    if element.length == 0 {
        return None;
    }

    let number = match element.vr {
        VR::US => dataset.uint16(tag).map(f64::from),
        VR::SS => dataset.int16(tag).map(f64::from),
        VR::UL => dataset.uint32(tag).map(f64::from),
        VR::SL => dataset.uint32(tag).map(|v| f64::from(v as i32)),
        VR::FL => dataset.uint32(tag).map(|v| f64::from(f32::from_bits(v))),
        VR::FD => dataset.uint64(tag).map(f64::from_bits),
        VR::UV => dataset.uint64(tag).map(|v| v as f64),
        VR::SV => dataset.uint64(tag).map(|v| v as i64 as f64),
        VR::DS | VR::IS => return decode_numeric_string(dataset, tag),
        VR::AT => return decode_attribute_tag(dataset, element),
        _ => return decode_text(dataset, element),
    };

    number.filter(|n| n.is_finite()).map(MetadataValue::Number)
}

/// Single numeric strings become numbers; multi-valued ones stay text
fn decode_numeric_string(dataset: &ParsedDataset, tag: Tag) -> Option<MetadataValue> {
    let value = dataset.string(tag)?;
    if value.contains('\\') {
        return Some(MetadataValue::Text(escape_text(&value)));
    }
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .map(MetadataValue::Number)
}

fn decode_attribute_tag(dataset: &ParsedDataset, element: &Element) -> Option<MetadataValue> {
    let bytes = dataset.value(element);
    let order = dataset.byte_order();
    let group = order.read_u16(bytes.get(..2)?.try_into().ok()?);
    let elem = order.read_u16(bytes.get(2..4)?.try_into().ok()?);
    Some(MetadataValue::Text(Tag(group, elem).to_string()))
}

fn decode_text(dataset: &ParsedDataset, element: &Element) -> Option<MetadataValue> {
    let value = dataset.string(element.tag)?;
    if value.is_empty() || looks_like_binary(&value) {
        return None;
    }

    if element.vr == VR::CS {
        match value.as_str() {
            "YES" => return Some(MetadataValue::Bool(true)),
            "NO" => return Some(MetadataValue::Bool(false)),
            _ => {}
        }
    }

    Some(MetadataValue::Text(escape_text(&value)))
}

/// More than 15% non-printable characters, or a long value with no whitespace
#[must_use]
pub fn looks_like_binary(value: &str) -> bool {
    let total = value.chars().count();
    if total == 0 {
        return false;
    }

    let non_printable = value
        .chars()
        .filter(|&c| (c.is_control() && !matches!(c, '\n' | '\r' | '\t')) || c == char::REPLACEMENT_CHARACTER)
        .count();

    non_printable as f64 / total as f64 > NON_PRINTABLE_RATIO
        || (total > MAX_UNBROKEN_LEN && !value.chars().any(char::is_whitespace))
}

/// JSON has its own quoting, so escaped quotes are written back as plain quotes
fn serialize_unescaped<S: Serializer>(value: &str, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&unescape_text(value))
}

/// Reverses the quote escaping of [`escape_text`]
#[must_use]
pub fn unescape_text(value: &str) -> String {
    value.replace("\\\"", "\"")
}

/// Trims, folds line breaks into spaces and escapes double quotes
#[must_use]
pub fn escape_text(value: &str) -> String {
    value
        .trim()
        .replace("\r\n", " ")
        .replace(['\r', '\n'], " ")
        .replace('"', "\\\"")
}
