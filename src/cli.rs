use crate::convert::ConvertOptions;
use crate::dicom::UnknownSyntaxPolicy;
use crate::dicom::dictionary::parse_tag_key;
use crate::external::CommandDecoder;
use crate::types::WindowLevel;
use clap::{Parser, ValueEnum};
use dicom::core::Tag;
use std::path::PathBuf;

/// Convert monochrome DICOM images to PNG and their metadata to JSON
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// DICOM file path(s) to convert
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Directory for the PNG and JSON outputs (default: next to each input)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Do not write the metadata JSON
    #[arg(long)]
    pub no_metadata: bool,

    /// Leave a tag out of the metadata, e.g. 00100010 (repeatable)
    #[arg(long = "skip-tag", value_name = "TAG", value_parser = parse_tag)]
    pub skip_tags: Vec<Tag>,

    /// Window center, overrides the dataset's window
    #[arg(long, requires = "window_width", allow_negative_numbers = true)]
    pub window_center: Option<f64>,

    /// Window width, overrides the dataset's window
    #[arg(long, requires = "window_center")]
    pub window_width: Option<f64>,

    /// What to do with transfer syntaxes that are not recognized
    #[arg(long, value_enum, default_value_t = UnknownSyntax::Fail)]
    pub unknown_transfer_syntax: UnknownSyntax,

    /// OpenJPEG decompressor used for JPEG 2000
    #[arg(long, value_name = "PATH", default_value = "opj_decompress")]
    pub opj_decompress: PathBuf,

    /// ImageMagick binary used for JPEG Lossless
    #[arg(long, value_name = "PATH", default_value = "magick")]
    pub magick: PathBuf,

    /// Show the converted image in the terminal
    #[arg(short, long)]
    pub preview: bool,

    /// Preview width in terminal columns
    #[arg(short = 'W', long)]
    pub width: Option<u32>,

    /// Preview height in terminal rows
    #[arg(short = 'H', long)]
    pub height: Option<u32>,

    /// Print metadata and log progress
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownSyntax {
    /// Report the file as unsupported
    Fail,
    /// Decode the pixel data as JPEG 2000
    Jpeg2000,
}

impl From<UnknownSyntax> for UnknownSyntaxPolicy {
    fn from(value: UnknownSyntax) -> Self {
        match value {
            UnknownSyntax::Fail => Self::Fail,
            UnknownSyntax::Jpeg2000 => Self::AssumeJpeg2000,
        }
    }
}

fn parse_tag(s: &str) -> Result<Tag, String> {
    parse_tag_key(s).ok_or_else(|| format!("'{s}' is not a tag (expected GGGGEEEE)"))
}

impl Args {
    #[must_use]
    pub fn window(&self) -> Option<WindowLevel> {
        match (self.window_center, self.window_width) {
            (Some(center), Some(width)) => Some(WindowLevel::new(center, width)),
            _ => None,
        }
    }

    #[must_use]
    pub fn convert_options(&self) -> ConvertOptions {
        let mut options = ConvertOptions {
            window: self.window(),
            unknown_syntax: self.unknown_transfer_syntax.into(),
            ..ConvertOptions::default()
        };
        options.skip_tags.extend(self.skip_tags.iter().copied());
        options
    }

    #[must_use]
    pub fn decoder(&self) -> CommandDecoder {
        CommandDecoder::new()
            .with_opj_decompress(&self.opj_decompress)
            .with_magick(&self.magick)
    }
}
