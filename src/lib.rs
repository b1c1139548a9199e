pub mod cli;
pub mod convert;
pub mod dicom;
pub mod display;
pub mod display_metadata;
pub mod external;
pub mod image;
pub mod output;
pub mod types;

// Re-export commonly used functions
pub use convert::{Conversion, ConvertOptions, convert, convert_file};
pub use display_metadata::print_metadata;
pub use external::{CommandDecoder, ExternalDecoder};
