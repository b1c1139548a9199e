use crate::dicom::{MetadataMap, SOP_CLASS_NAME_KEY, TRANSFER_SYNTAX_NAME_KEY};

/// Shown first, in this order, when present
const SUMMARY_KEYS: &[&str] = &[
    "PatientName",
    "PatientID",
    "PatientBirthDate",
    "AccessionNumber",
    "StudyDate",
    "StudyDescription",
    "Modality",
    "SeriesDescription",
    "Rows",
    "Columns",
    "PhotometricInterpretation",
    SOP_CLASS_NAME_KEY,
    TRANSFER_SYNTAX_NAME_KEY,
];

pub fn print_metadata(metadata: &MetadataMap) {
    print!("{}", format_metadata(metadata));
}

/// Summary fields first, then every other key alphabetically
#[must_use]
pub fn format_metadata(metadata: &MetadataMap) -> String {
    let mut out = String::new();
    for key in SUMMARY_KEYS {
        if let Some(value) = metadata.get(*key) {
            out.push_str(&format!("{key:26}: {value}\n"));
        }
    }
    for (key, value) in metadata {
        if !SUMMARY_KEYS.contains(&key.as_str()) {
            out.push_str(&format!("{key:26}: {value}\n"));
        }
    }
    out.push('\n');
    out
}
