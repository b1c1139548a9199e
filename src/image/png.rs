//! Minimal PNG writer for 8-bit grayscale rasters
//!
//! Chunk layout: 4-byte big-endian length, 4-byte type, data, then the CRC-32
//! of type and data, big-endian.

use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::fmt;
use std::io::{self, Write};

pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

const BIT_DEPTH: u8 = 8;
const COLOR_TYPE_GRAYSCALE: u8 = 0;
const FILTER_NONE: u8 = 0;

/// Reflected CRC-32 polynomial used by PNG (and zlib, gzip, ...)
const CRC_POLYNOMIAL: u32 = 0xEDB8_8320;
const CRC_TABLE: [u32; 256] = crc_table();

const fn crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { CRC_POLYNOMIAL ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

fn update_crc(crc: u32, bytes: &[u8]) -> u32 {
    bytes.iter().fold(crc, |c, &b| {
        CRC_TABLE[((c ^ u32::from(b)) & 0xFF) as usize] ^ (c >> 8)
    })
}

/// CRC-32 over the concatenation of `parts`
#[must_use]
pub fn crc32(parts: &[&[u8]]) -> u32 {
    parts.iter().fold(0xFFFF_FFFF, |crc, part| update_crc(crc, part)) ^ 0xFFFF_FFFF
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ChunkType(pub [u8; 4]);

impl ChunkType {
    pub const IHDR: Self = Self(*b"IHDR");
    pub const IDAT: Self = Self(*b"IDAT");
    pub const IEND: Self = Self(*b"IEND");
}

impl fmt::Debug for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

fn write_chunk(out: &mut Vec<u8>, kind: ChunkType, data: &[u8]) {
    let len = u32::try_from(data.len()).unwrap_or(u32::MAX);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&kind.0);
    out.extend_from_slice(data);
    out.extend_from_slice(&crc32(&[kind.0.as_slice(), data]).to_be_bytes());
}

/// Encodes a row-major 8-bit grayscale raster as a PNG file
///
/// Every scanline uses filter type 0; the image data goes into one IDAT.
///
/// # Errors
///
/// Returns an I/O error if `pixels` does not hold `width * height` samples or
/// compression fails.
pub fn encode_grayscale(width: u32, height: u32, pixels: &[u8]) -> io::Result<Vec<u8>> {
    let row_len = width as usize;
    if row_len == 0 || height == 0 || pixels.len() != row_len * height as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} samples do not fill a {width}x{height} raster", pixels.len()),
        ));
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    for row in pixels.chunks_exact(row_len) {
        encoder.write_all(&[FILTER_NONE])?;
        encoder.write_all(row)?;
    }
    let idat = encoder.finish()?;

    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    // bit depth, color type, compression, filter method, interlace
    ihdr.extend_from_slice(&[BIT_DEPTH, COLOR_TYPE_GRAYSCALE, 0, 0, 0]);

    let mut png = Vec::with_capacity(PNG_SIGNATURE.len() + idat.len() + 3 * 12 + ihdr.len());
    png.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut png, ChunkType::IHDR, &ihdr);
    write_chunk(&mut png, ChunkType::IDAT, &idat);
    write_chunk(&mut png, ChunkType::IEND, &[]);
    Ok(png)
}

/// One chunk as stored, CRC not verified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawChunk<'b> {
    pub kind: ChunkType,
    pub data: &'b [u8],
    pub declared_crc: u32,
    /// Offset of the chunk's length field in the file
    pub offset: usize,
}

impl RawChunk<'_> {
    #[must_use]
    pub fn computed_crc(&self) -> u32 {
        crc32(&[self.kind.0.as_slice(), self.data])
    }
}

/// Successive chunks of a PNG file; stops at the first truncated chunk
#[derive(Debug, Clone)]
pub struct RawChunkIter<'b> {
    bytes: &'b [u8],
    pos: usize,
}

impl<'b> RawChunkIter<'b> {
    /// Takes the full file; the signature is skipped
    #[must_use]
    pub fn new(png: &'b [u8]) -> Self {
        Self {
            bytes: png,
            pos: PNG_SIGNATURE.len().min(png.len()),
        }
    }
}

impl<'b> Iterator for RawChunkIter<'b> {
    type Item = RawChunk<'b>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.pos;
        let rest = self.bytes.get(offset..)?;
        let len = u32::from_be_bytes(rest.get(..4)?.try_into().ok()?) as usize;
        let kind = ChunkType(rest.get(4..8)?.try_into().ok()?);
        let data = rest.get(8..8 + len)?;
        let declared_crc = u32::from_be_bytes(rest.get(8 + len..12 + len)?.try_into().ok()?);
        self.pos = offset + 12 + len;
        Some(RawChunk {
            kind,
            data,
            declared_crc,
            offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    fn oracle_crc(kind: ChunkType, data: &[u8]) -> u32 {
        let mut crc = flate2::Crc::new();
        crc.update(&kind.0);
        crc.update(data);
        crc.sum()
    }

    #[test]
    fn test_crc_known_values() {
        assert_eq!(crc32(&[b"IEND".as_slice()]), 0xAE42_6082);
        assert_eq!(crc32(&[b"123456789".as_slice()]), 0xCBF4_3926);
        assert_eq!(crc32(&[b"1234".as_slice(), b"56789".as_slice()]), 0xCBF4_3926);
    }

    #[test]
    fn test_layout_and_ihdr() {
        let png = encode_grayscale(3, 2, &[0, 1, 2, 3, 4, 5]).unwrap();
        assert_eq!(png[..8], PNG_SIGNATURE);

        let chunks: Vec<_> = RawChunkIter::new(&png).collect();
        let kinds: Vec<_> = chunks.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![ChunkType::IHDR, ChunkType::IDAT, ChunkType::IEND]);

        let ihdr = chunks[0].data;
        assert_eq!(ihdr.len(), 13);
        assert_eq!(u32::from_be_bytes(ihdr[0..4].try_into().unwrap()), 3);
        assert_eq!(u32::from_be_bytes(ihdr[4..8].try_into().unwrap()), 2);
        assert_eq!(&ihdr[8..], &[8, 0, 0, 0, 0]);
        assert!(chunks[2].data.is_empty());
    }

    #[test]
    fn test_every_chunk_crc_matches_independent_crc() {
        let pixels: Vec<u8> = (0..=255).cycle().take(64 * 16).collect();
        let png = encode_grayscale(64, 16, &pixels).unwrap();
        for chunk in RawChunkIter::new(&png) {
            assert_eq!(chunk.declared_crc, oracle_crc(chunk.kind, chunk.data), "{:?}", chunk.kind);
            assert_eq!(chunk.declared_crc, chunk.computed_crc());
        }
    }

    #[test]
    fn test_corrupted_idat_fails_crc() {
        let png = encode_grayscale(4, 4, &[7u8; 16]).unwrap();
        let idat = RawChunkIter::new(&png)
            .find(|c| c.kind == ChunkType::IDAT)
            .unwrap();
        let data_start = idat.offset + 8;

        let mut corrupted = png.clone();
        corrupted[data_start] ^= 0x01;

        let broken = RawChunkIter::new(&corrupted)
            .find(|c| c.kind == ChunkType::IDAT)
            .unwrap();
        assert_ne!(broken.computed_crc(), broken.declared_crc);
        assert_ne!(oracle_crc(broken.kind, broken.data), broken.declared_crc);
    }

    #[test]
    fn test_scanlines_use_filter_zero() {
        let png = encode_grayscale(2, 2, &[10, 20, 30, 40]).unwrap();
        let idat = RawChunkIter::new(&png)
            .find(|c| c.kind == ChunkType::IDAT)
            .unwrap();
        let mut raw = Vec::new();
        ZlibDecoder::new(idat.data).read_to_end(&mut raw).unwrap();
        assert_eq!(raw, vec![0, 10, 20, 0, 30, 40]);
    }

    #[test]
    fn test_decodes_with_independent_viewer() {
        let pixels = [0u8, 64, 128, 255, 1, 2];
        let png = encode_grayscale(3, 2, &pixels).unwrap();
        let decoded = image::load_from_memory_with_format(&png, image::ImageFormat::Png)
            .unwrap()
            .into_luma8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.into_raw(), pixels.to_vec());
    }

    #[test]
    fn test_rejects_mismatched_raster() {
        assert!(encode_grayscale(3, 2, &[0; 5]).is_err());
        assert!(encode_grayscale(0, 0, &[]).is_err());
    }
}
