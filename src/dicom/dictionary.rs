//! Tag dictionary
//!
//! A compile-time table of the attributes this crate reads or reports, with
//! the value representation each is expected to carry. Implicit VR datasets
//! take their VRs from here. Names for tags outside the table come from the
//! standard data dictionary.

use dicom::core::dictionary::{DataDictionary, DataDictionaryEntry};
use dicom::core::{Tag, VR};
use dicom::object::StandardDataDictionary;
use std::borrow::Cow;

/// Dictionary entry: tag, keyword and expected VR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagInfo {
    pub tag: Tag,
    pub keyword: &'static str,
    pub vr: VR,
}

const fn entry(group: u16, element: u16, keyword: &'static str, vr: VR) -> TagInfo {
    TagInfo {
        tag: Tag(group, element),
        keyword,
        vr,
    }
}

// Sorted by (group, element) for binary search.
static TAGS: &[TagInfo] = &[
    entry(0x0002, 0x0000, "FileMetaInformationGroupLength", VR::UL),
    entry(0x0002, 0x0001, "FileMetaInformationVersion", VR::OB),
    entry(0x0002, 0x0002, "MediaStorageSOPClassUID", VR::UI),
    entry(0x0002, 0x0003, "MediaStorageSOPInstanceUID", VR::UI),
    entry(0x0002, 0x0010, "TransferSyntaxUID", VR::UI),
    entry(0x0002, 0x0012, "ImplementationClassUID", VR::UI),
    entry(0x0002, 0x0013, "ImplementationVersionName", VR::SH),
    entry(0x0002, 0x0016, "SourceApplicationEntityTitle", VR::AE),
    entry(0x0008, 0x0005, "SpecificCharacterSet", VR::CS),
    entry(0x0008, 0x0008, "ImageType", VR::CS),
    entry(0x0008, 0x0012, "InstanceCreationDate", VR::DA),
    entry(0x0008, 0x0013, "InstanceCreationTime", VR::TM),
    entry(0x0008, 0x0016, "SOPClassUID", VR::UI),
    entry(0x0008, 0x0018, "SOPInstanceUID", VR::UI),
    entry(0x0008, 0x0020, "StudyDate", VR::DA),
    entry(0x0008, 0x0021, "SeriesDate", VR::DA),
    entry(0x0008, 0x0022, "AcquisitionDate", VR::DA),
    entry(0x0008, 0x0023, "ContentDate", VR::DA),
    entry(0x0008, 0x0030, "StudyTime", VR::TM),
    entry(0x0008, 0x0031, "SeriesTime", VR::TM),
    entry(0x0008, 0x0032, "AcquisitionTime", VR::TM),
    entry(0x0008, 0x0033, "ContentTime", VR::TM),
    entry(0x0008, 0x0050, "AccessionNumber", VR::SH),
    entry(0x0008, 0x0060, "Modality", VR::CS),
    entry(0x0008, 0x0070, "Manufacturer", VR::LO),
    entry(0x0008, 0x0080, "InstitutionName", VR::LO),
    entry(0x0008, 0x0090, "ReferringPhysicianName", VR::PN),
    entry(0x0008, 0x1010, "StationName", VR::SH),
    entry(0x0008, 0x1030, "StudyDescription", VR::LO),
    entry(0x0008, 0x103E, "SeriesDescription", VR::LO),
    entry(0x0008, 0x1090, "ManufacturerModelName", VR::LO),
    entry(0x0010, 0x0010, "PatientName", VR::PN),
    entry(0x0010, 0x0020, "PatientID", VR::LO),
    entry(0x0010, 0x0030, "PatientBirthDate", VR::DA),
    entry(0x0010, 0x0040, "PatientSex", VR::CS),
    entry(0x0010, 0x1010, "PatientAge", VR::AS),
    entry(0x0010, 0x1020, "PatientSize", VR::DS),
    entry(0x0010, 0x1030, "PatientWeight", VR::DS),
    entry(0x0018, 0x0015, "BodyPartExamined", VR::CS),
    entry(0x0018, 0x0050, "SliceThickness", VR::DS),
    entry(0x0018, 0x0060, "KVP", VR::DS),
    entry(0x0018, 0x0088, "SpacingBetweenSlices", VR::DS),
    entry(0x0018, 0x1020, "SoftwareVersions", VR::LO),
    entry(0x0018, 0x1030, "ProtocolName", VR::LO),
    entry(0x0018, 0x1150, "ExposureTime", VR::IS),
    entry(0x0018, 0x1151, "XRayTubeCurrent", VR::IS),
    entry(0x0018, 0x1152, "Exposure", VR::IS),
    entry(0x0018, 0x5101, "ViewPosition", VR::CS),
    entry(0x0020, 0x000D, "StudyInstanceUID", VR::UI),
    entry(0x0020, 0x000E, "SeriesInstanceUID", VR::UI),
    entry(0x0020, 0x0010, "StudyID", VR::SH),
    entry(0x0020, 0x0011, "SeriesNumber", VR::IS),
    entry(0x0020, 0x0012, "AcquisitionNumber", VR::IS),
    entry(0x0020, 0x0013, "InstanceNumber", VR::IS),
    entry(0x0020, 0x0020, "PatientOrientation", VR::CS),
    entry(0x0020, 0x0032, "ImagePositionPatient", VR::DS),
    entry(0x0020, 0x0037, "ImageOrientationPatient", VR::DS),
    entry(0x0020, 0x0052, "FrameOfReferenceUID", VR::UI),
    entry(0x0020, 0x1041, "SliceLocation", VR::DS),
    entry(0x0020, 0x4000, "ImageComments", VR::LT),
    entry(0x0028, 0x0002, "SamplesPerPixel", VR::US),
    entry(0x0028, 0x0004, "PhotometricInterpretation", VR::CS),
    entry(0x0028, 0x0006, "PlanarConfiguration", VR::US),
    entry(0x0028, 0x0008, "NumberOfFrames", VR::IS),
    entry(0x0028, 0x0010, "Rows", VR::US),
    entry(0x0028, 0x0011, "Columns", VR::US),
    entry(0x0028, 0x0030, "PixelSpacing", VR::DS),
    entry(0x0028, 0x0034, "PixelAspectRatio", VR::IS),
    entry(0x0028, 0x0100, "BitsAllocated", VR::US),
    entry(0x0028, 0x0101, "BitsStored", VR::US),
    entry(0x0028, 0x0102, "HighBit", VR::US),
    entry(0x0028, 0x0103, "PixelRepresentation", VR::US),
    entry(0x0028, 0x0301, "BurnedInAnnotation", VR::CS),
    entry(0x0028, 0x1050, "WindowCenter", VR::DS),
    entry(0x0028, 0x1051, "WindowWidth", VR::DS),
    entry(0x0028, 0x1052, "RescaleIntercept", VR::DS),
    entry(0x0028, 0x1053, "RescaleSlope", VR::DS),
    entry(0x0028, 0x1054, "RescaleType", VR::LO),
    entry(0x0028, 0x1055, "WindowCenterWidthExplanation", VR::LO),
    entry(0x0028, 0x2110, "LossyImageCompression", VR::CS),
    entry(0x0040, 0xA040, "ValueType", VR::CS),
    entry(0x0040, 0xA043, "ConceptNameCodeSequence", VR::SQ),
    entry(0x0040, 0xA160, "TextValue", VR::UT),
    entry(0x0040, 0xA491, "CompletionFlag", VR::CS),
    entry(0x0040, 0xA493, "VerificationFlag", VR::CS),
    entry(0x0040, 0xA730, "ContentSequence", VR::SQ),
    entry(0x7FE0, 0x0010, "PixelData", VR::OW),
];

/// Looks up a tag in the local table
#[must_use]
pub fn lookup(tag: Tag) -> Option<&'static TagInfo> {
    TAGS.binary_search_by(|info| info.tag.cmp(&tag))
        .ok()
        .map(|idx| &TAGS[idx])
}

/// VR a tag is expected to carry when the stream does not say (implicit VR)
#[must_use]
pub fn expected_vr(tag: Tag) -> VR {
    if let Some(info) = lookup(tag) {
        return info.vr;
    }
    match tag {
        // group lengths
        Tag(_, 0x0000) => VR::UL,
        _ => VR::UN,
    }
}

/// Descriptive keyword for a tag, falling back to its canonical key
#[must_use]
pub fn keyword(tag: Tag) -> Cow<'static, str> {
    if let Some(info) = lookup(tag) {
        return Cow::Borrowed(info.keyword);
    }
    match StandardDataDictionary.by_tag(tag) {
        Some(entry) if !entry.alias().is_empty() => Cow::Owned(entry.alias().to_string()),
        _ => Cow::Owned(tag_key(tag)),
    }
}

/// Canonical string form of a tag: `x` followed by 8 lowercase hex digits
#[must_use]
pub fn tag_key(tag: Tag) -> String {
    format!("x{:04x}{:04x}", tag.0, tag.1)
}

/// Parses `x00280010`, `00280010`, `0028,0010` or `(0028,0010)`
#[must_use]
pub fn parse_tag_key(s: &str) -> Option<Tag> {
    let s = s.trim();
    let s = s.strip_prefix('x').unwrap_or(s);
    let s = s
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(s);
    let (group, element) = match s.split_once(',') {
        Some((group, element)) => (group, element),
        None if s.len() == 8 => s.split_at(4),
        None => return None,
    };
    if group.len() != 4 || element.len() != 4 {
        return None;
    }
    let group = u16::from_str_radix(group, 16).ok()?;
    let element = u16::from_str_radix(element, 16).ok()?;
    Some(Tag(group, element))
}

/// VRs whose values are opaque binary blobs or nested structures
#[inline]
#[must_use]
pub fn is_binary_vr(vr: VR) -> bool {
    matches!(
        vr,
        VR::OB | VR::OD | VR::OF | VR::OL | VR::OV | VR::OW | VR::SQ
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom::dictionary_std::tags;

    #[test]
    fn test_table_is_sorted() {
        assert!(TAGS.windows(2).all(|pair| pair[0].tag < pair[1].tag));
    }

    #[test]
    fn test_lookup_known_tags() {
        let rows = lookup(tags::ROWS).expect("rows in table");
        assert_eq!(rows.keyword, "Rows");
        assert_eq!(rows.vr, VR::US);
        assert_eq!(expected_vr(tags::WINDOW_CENTER), VR::DS);
        assert_eq!(expected_vr(tags::PIXEL_DATA), VR::OW);
    }

    #[test]
    fn test_unknown_tags_fall_back() {
        assert_eq!(expected_vr(Tag(0x0009, 0x0000)), VR::UL);
        assert_eq!(expected_vr(Tag(0x0009, 0x1001)), VR::UN);
        assert_eq!(keyword(Tag(0x0009, 0x1001)), "x00091001");
    }

    #[test]
    fn test_keyword_from_standard_dictionary() {
        // not in the local table
        assert_eq!(keyword(tags::OPERATORS_NAME), "OperatorsName");
    }

    #[test]
    fn test_tag_key_round_trip_forms() {
        assert_eq!(tag_key(tags::ROWS), "x00280010");
        assert_eq!(tag_key(tags::PIXEL_DATA), "x7fe00010");
        for form in ["x00280010", "00280010", "0028,0010", "(0028,0010)"] {
            assert_eq!(parse_tag_key(form), Some(tags::ROWS), "{form}");
        }
        assert_eq!(parse_tag_key("x0028001"), None);
        assert_eq!(parse_tag_key("zz280010"), None);
    }
}
