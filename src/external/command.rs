//! [`ExternalDecoder`] backed by command-line codecs
//!
//! JPEG 2000 goes through OpenJPEG's `opj_decompress`, JPEG Lossless through
//! ImageMagick's `magick`. Both write a PGM that is read back in memory.

use super::{ExternalDecoder, samples_from_pgm};
use crate::dicom::{DecodedSamples, DicomError, ExternalTool, TransferSyntax};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

const OUTPUT_FILE: &str = "decoded.pgm";

/// Runs the external codecs as blocking subprocesses, one temp dir per call
#[derive(Debug, Clone)]
pub struct CommandDecoder {
    opj_decompress: PathBuf,
    magick: PathBuf,
}

impl Default for CommandDecoder {
    fn default() -> Self {
        Self {
            opj_decompress: PathBuf::from(ExternalTool::OpenJpeg.to_string()),
            magick: PathBuf::from(ExternalTool::ImageMagick.to_string()),
        }
    }
}

impl CommandDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_opj_decompress(mut self, program: impl Into<PathBuf>) -> Self {
        self.opj_decompress = program.into();
        self
    }

    #[must_use]
    pub fn with_magick(mut self, program: impl Into<PathBuf>) -> Self {
        self.magick = program.into();
        self
    }

    fn program(&self, tool: ExternalTool) -> &Path {
        match tool {
            ExternalTool::OpenJpeg => &self.opj_decompress,
            ExternalTool::ImageMagick => &self.magick,
        }
    }

    fn run(&self, syntax: TransferSyntax, payload: &[u8]) -> Result<DecodedSamples, DicomError> {
        let strategy = syntax.strategy();
        let Some(tool) = strategy.utility else {
            return Err(DicomError::UnsupportedTransferSyntax {
                uid: syntax.uid().to_string(),
                name: syntax.name().to_string(),
            });
        };
        let program = self.program(tool);
        let failure = |diagnostic: String| DicomError::ExternalDecode {
            tool: tool.to_string(),
            diagnostic,
        };

        let workdir = tempfile::tempdir().map_err(|e| failure(format!("failed to create temp dir: {e}")))?;
        let input_path = workdir.path().join(format!("payload.{}", strategy.temp_extension));
        let output_path = workdir.path().join(OUTPUT_FILE);
        std::fs::write(&input_path, payload)
            .map_err(|e| failure(format!("failed to write {}: {e}", input_path.display())))?;

        let mut command = Command::new(program);
        match tool {
            ExternalTool::OpenJpeg => command.arg("-i").arg(&input_path).arg("-o").arg(&output_path),
            ExternalTool::ImageMagick => command.arg(&input_path).arg(&output_path),
        };
        debug!(?command, bytes = payload.len(), "running external decoder");

        let output = command
            .output()
            .map_err(|e| failure(format!("failed to execute {}: {e}", program.display())))?;
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            return Err(failure(format!("{}: {stderr}", output.status)));
        }

        let decoded = match std::fs::read(&output_path) {
            Ok(bytes) if !bytes.is_empty() => bytes,
            _ if stderr.is_empty() => return Err(failure("no output written".to_string())),
            _ => return Err(failure(format!("no output written: {stderr}"))),
        };

        samples_from_pgm(&tool.to_string(), &decoded)
    }
}

impl ExternalDecoder for CommandDecoder {
    fn decode_jpeg2000(&self, codestream: &[u8]) -> Result<DecodedSamples, DicomError> {
        self.run(TransferSyntax::Jpeg2000, codestream)
    }

    fn decode_jpeg_lossless(&self, frame: &[u8]) -> Result<DecodedSamples, DicomError> {
        self.run(TransferSyntax::JpegLossless, frame)
    }
}
