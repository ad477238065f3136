//! FITS image codec.
//!
//! Reads and writes the primary HDU of FITS files:
//! - 2880-byte blocks
//! - Header with 80-character cards terminated by `END`
//! - Big-endian data, BITPIX 8/16/32/-32/-64 with BSCALE/BZERO
//!
//! Files ending in `.gz` are decompressed on the fly. Windowed reads seek past
//! unused rows on plain files and stream past them on compressed ones.

use crate::error::{RasterError, Result};
use crate::raster::Raster;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

/// Size of a FITS block in bytes.
pub const BLOCK_SIZE: usize = 2880;

const CARD_SIZE: usize = 80;

/// Largest image plane accepted from a header, in pixels.
pub const MAX_IMAGE_PIXELS: usize = 1 << 28;

/// A header card value.
#[derive(Debug, Clone, PartialEq)]
pub enum FitsValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl FitsValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FitsValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FitsValue::Int(i) => Some(*i),
            FitsValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FitsValue::Float(f) => Some(*f),
            FitsValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    fn format(&self) -> String {
        match self {
            FitsValue::Bool(b) => format!("{:>20}", if *b { "T" } else { "F" }),
            FitsValue::Int(i) => format!("{:>20}", i),
            FitsValue::Float(f) => format!("{:>20}", format_float(*f)),
            FitsValue::Str(s) => format!("'{:<8}'", s.replace('\'', "''")),
        }
    }
}

impl From<&str> for FitsValue {
    fn from(s: &str) -> Self {
        FitsValue::Str(s.to_string())
    }
}

impl From<String> for FitsValue {
    fn from(s: String) -> Self {
        FitsValue::Str(s)
    }
}

impl From<i64> for FitsValue {
    fn from(v: i64) -> Self {
        FitsValue::Int(v)
    }
}

impl From<f64> for FitsValue {
    fn from(v: f64) -> Self {
        FitsValue::Float(v)
    }
}

fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{:.1}", f)
    } else {
        format!("{:.13E}", f)
    }
}

/// Ordered header cards of one HDU.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitsHeader {
    cards: Vec<(String, FitsValue)>,
}

impl FitsHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a card, replacing an existing one with the same keyword.
    pub fn set(&mut self, key: &str, value: impl Into<FitsValue>) {
        let key = key.to_uppercase();
        let value = value.into();
        match self.cards.iter_mut().find(|(k, _)| *k == key) {
            Some(card) => card.1 = value,
            None => self.cards.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FitsValue> {
        self.cards
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(FitsValue::as_i64)
    }

    pub fn get_float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(FitsValue::as_f64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FitsValue::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FitsValue)> {
        self.cards.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Append every card of `other`, replacing duplicates.
    pub fn extend(&mut self, other: &FitsHeader) {
        for (k, v) in other.iter() {
            self.set(k, v.clone());
        }
    }
}

// ============================================================================
// Reading
// ============================================================================

/// Byte stream over a plain or gzip-compressed file.
enum ByteSource {
    Plain(BufReader<File>),
    Gzip(BufReader<GzDecoder<File>>),
}

impl Read for ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ByteSource::Plain(r) => r.read(buf),
            ByteSource::Gzip(r) => r.read(buf),
        }
    }
}

impl ByteSource {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => RasterError::NotFound(path.display().to_string()),
            _ => RasterError::read_failed(path.display().to_string(), e.to_string()),
        })?;
        let gzipped = path.extension().map_or(false, |ext| ext == "gz");
        Ok(if gzipped {
            ByteSource::Gzip(BufReader::new(GzDecoder::new(file)))
        } else {
            ByteSource::Plain(BufReader::new(file))
        })
    }

    /// Advance `n` bytes without decoding them.
    fn skip(&mut self, n: u64) -> io::Result<()> {
        if n == 0 {
            return Ok(());
        }
        match self {
            ByteSource::Plain(r) => r.seek_relative(n as i64),
            ByteSource::Gzip(r) => {
                let copied = io::copy(&mut r.by_ref().take(n), &mut io::sink())?;
                if copied < n {
                    return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated data"));
                }
                Ok(())
            }
        }
    }
}

/// Image geometry and scaling taken from a header.
#[derive(Debug, Clone, Copy)]
struct Layout {
    bitpix: i64,
    width: usize,
    height: usize,
    bscale: f64,
    bzero: f64,
    /// Bytes of one image plane.
    data_len: usize,
}

impl Layout {
    fn from_header(header: &FitsHeader, path: &str) -> Result<Self> {
        let require = |key: &str| {
            header
                .get_int(key)
                .ok_or_else(|| RasterError::invalid_header(path, format!("missing {}", key)))
        };
        let bitpix = require("BITPIX")?;
        if !matches!(bitpix, 8 | 16 | 32 | -32 | -64) {
            return Err(RasterError::invalid_header(path, format!("unsupported BITPIX {}", bitpix)));
        }
        let naxis = require("NAXIS")?;
        if naxis < 2 {
            return Err(RasterError::invalid_header(path, format!("NAXIS = {}, need an image", naxis)));
        }
        let dim = |key: &str| -> Result<usize> {
            let v = require(key)?;
            usize::try_from(v).map_err(|_| RasterError::invalid_header(path, format!("negative {}", key)))
        };
        let width = dim("NAXIS1")?;
        let height = dim("NAXIS2")?;
        let pixels = width
            .checked_mul(height)
            .filter(|&n| n <= MAX_IMAGE_PIXELS)
            .ok_or_else(|| {
                RasterError::invalid_header(path, format!("image of {}x{} pixels is too large", width, height))
            })?;
        Ok(Self {
            bitpix,
            width,
            height,
            bscale: header.get_float("BSCALE").unwrap_or(1.0),
            bzero: header.get_float("BZERO").unwrap_or(0.0),
            data_len: pixels * (bitpix.unsigned_abs() / 8) as usize,
        })
    }

    fn bytes_per_pixel(&self) -> usize {
        (self.bitpix.unsigned_abs() / 8) as usize
    }

    fn decode_into(&self, bytes: &[u8], out: &mut Vec<f32>) {
        let scaled = self.bscale != 1.0 || self.bzero != 0.0;
        let bpp = self.bytes_per_pixel();
        out.extend(bytes.chunks_exact(bpp).map(|b| {
            let v = match self.bitpix {
                8 => b[0] as f64,
                16 => i16::from_be_bytes([b[0], b[1]]) as f64,
                32 => i32::from_be_bytes([b[0], b[1], b[2], b[3]]) as f64,
                -32 => f32::from_be_bytes([b[0], b[1], b[2], b[3]]) as f64,
                _ => f64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
            };
            if scaled {
                (v * self.bscale + self.bzero) as f32
            } else {
                v as f32
            }
        }));
    }
}

fn parse_value(text: &str) -> Option<FitsValue> {
    let text = text.trim_start();
    if let Some(rest) = text.strip_prefix('\'') {
        let mut value = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    value.push('\'');
                    chars.next();
                } else {
                    return Some(FitsValue::Str(value.trim_end().to_string()));
                }
            } else {
                value.push(c);
            }
        }
        return None;
    }

    let token = text.split('/').next().unwrap_or("").trim();
    match token {
        "" => None,
        "T" => Some(FitsValue::Bool(true)),
        "F" => Some(FitsValue::Bool(false)),
        _ => token
            .parse::<i64>()
            .map(FitsValue::Int)
            .or_else(|_| token.replace(['D', 'd'], "E").parse::<f64>().map(FitsValue::Float))
            .ok()
            .or_else(|| Some(FitsValue::Str(token.to_string()))),
    }
}

/// Read header blocks up to and including the one holding `END`.
fn read_header_from<R: Read>(reader: &mut R, path: &str) -> Result<FitsHeader> {
    let mut header = FitsHeader::new();
    let mut block = [0u8; BLOCK_SIZE];
    let mut first = true;

    loop {
        reader
            .read_exact(&mut block)
            .map_err(|e| RasterError::invalid_header(path, format!("reading header: {}", e)))?;

        for raw in block.chunks_exact(CARD_SIZE) {
            if first {
                if !raw.starts_with(b"SIMPLE") {
                    return Err(RasterError::invalid_header(path, "not a FITS file"));
                }
                first = false;
            }
            // Cards are ASCII; anything else is skipped
            let card = match std::str::from_utf8(raw) {
                Ok(card) if raw.is_ascii() => card,
                _ => continue,
            };
            let keyword = card[..8].trim_end();
            if keyword == "END" {
                return Ok(header);
            }
            if keyword.is_empty() || &card[8..10] != "= " {
                continue;
            }
            if let Some(value) = parse_value(&card[10..]) {
                header.cards.push((keyword.to_string(), value));
            }
        }
    }
}

/// Read only the header of a FITS file.
pub fn read_header(path: &Path) -> Result<FitsHeader> {
    let mut source = ByteSource::open(path)?;
    read_header_from(&mut source, &path.display().to_string())
}

/// Read the header and the first image plane.
pub fn read_image(path: &Path) -> Result<(FitsHeader, Raster)> {
    let name = path.display().to_string();
    let mut source = ByteSource::open(path)?;
    let header = read_header_from(&mut source, &name)?;
    let layout = Layout::from_header(&header, &name)?;

    // Grows with the data actually present, so a truncated file fails
    // without allocating the size its header claims.
    let mut bytes = Vec::new();
    source
        .by_ref()
        .take(layout.data_len as u64)
        .read_to_end(&mut bytes)
        .map_err(|e| RasterError::read_failed(&name, format!("reading data: {}", e)))?;
    if bytes.len() < layout.data_len {
        return Err(RasterError::read_failed(
            &name,
            format!("data truncated: {} of {} bytes", bytes.len(), layout.data_len),
        ));
    }

    let mut data = Vec::with_capacity(layout.width * layout.height);
    layout.decode_into(&bytes, &mut data);
    Ok((header, Raster::new(data, layout.width, layout.height)))
}

/// Read the `w` x `h` window at `(x0, y0)` of the first image plane.
///
/// Rows outside the window are never decoded.
pub fn read_window(path: &Path, x0: usize, y0: usize, w: usize, h: usize) -> Result<(FitsHeader, Raster)> {
    let name = path.display().to_string();
    let mut source = ByteSource::open(path)?;
    let header = read_header_from(&mut source, &name)?;
    let layout = Layout::from_header(&header, &name)?;

    if x0 + w > layout.width || y0 + h > layout.height {
        return Err(RasterError::OutOfBounds {
            requested: format!("[{}+{}, {}+{}]", x0, w, y0, h),
            raster: format!("{} ({}x{})", name, layout.width, layout.height),
        });
    }

    let bpp = layout.bytes_per_pixel() as u64;
    let row_bytes = layout.width as u64 * bpp;
    let read_err = |e: io::Error| RasterError::read_failed(&name, format!("reading data: {}", e));

    source.skip(y0 as u64 * row_bytes).map_err(read_err)?;
    let mut row = vec![0u8; w * bpp as usize];
    let mut data = Vec::with_capacity(w * h);
    for i in 0..h {
        source.skip(x0 as u64 * bpp).map_err(read_err)?;
        source.read_exact(&mut row).map_err(read_err)?;
        layout.decode_into(&row, &mut data);
        if i + 1 < h {
            source
                .skip((layout.width - x0 - w) as u64 * bpp)
                .map_err(read_err)?;
        }
    }
    Ok((header, Raster::new(data, w, h)))
}

// ============================================================================
// Writing
// ============================================================================

fn write_card<W: Write>(out: &mut W, key: &str, value: &FitsValue) -> io::Result<()> {
    let mut card = format!("{:<8}= {}", key, value.format());
    card.truncate(CARD_SIZE);
    write!(out, "{:<80}", card)
}

fn write_hdu<W: Write>(out: W, dims: &[usize], extra: &FitsHeader, planes: &[&[f32]]) -> io::Result<()> {
    let mut out = BufWriter::new(out);
    let mut base = FitsHeader::new();
    base.set("SIMPLE", FitsValue::Bool(true));
    base.set("BITPIX", -32i64);
    base.set("NAXIS", dims.len() as i64);
    for (i, d) in dims.iter().enumerate() {
        base.set(&format!("NAXIS{}", i + 1), *d as i64);
    }
    let reserved = ["SIMPLE", "BITPIX", "NAXIS", "NAXIS1", "NAXIS2", "NAXIS3", "BSCALE", "BZERO", "END"];

    let mut ncards = 0usize;
    for (k, v) in base.iter() {
        write_card(&mut out, k, v)?;
        ncards += 1;
    }
    for (k, v) in extra.iter().filter(|(k, _)| !reserved.contains(k)) {
        write_card(&mut out, k, v)?;
        ncards += 1;
    }
    write!(out, "{:<80}", "END")?;
    ncards += 1;

    let header_bytes = ncards * CARD_SIZE;
    let pad = (BLOCK_SIZE - header_bytes % BLOCK_SIZE) % BLOCK_SIZE;
    out.write_all(&vec![b' '; pad])?;

    let mut data_bytes = 0usize;
    for plane in planes {
        for v in plane.iter() {
            out.write_all(&v.to_be_bytes())?;
        }
        data_bytes += plane.len() * 4;
    }
    let pad = (BLOCK_SIZE - data_bytes % BLOCK_SIZE) % BLOCK_SIZE;
    out.write_all(&vec![0u8; pad])?;
    out.flush()
}

/// Write a float32 image with the given extra cards.
pub fn write_image<W: Write>(out: W, extra: &FitsHeader, raster: &Raster) -> io::Result<()> {
    write_hdu(out, &[raster.width, raster.height], extra, &[&raster.data])
}

/// Write equally sized planes as a float32 cube (NAXIS3 = planes).
pub fn write_cube<W: Write>(out: W, extra: &FitsHeader, planes: &[Raster]) -> io::Result<()> {
    let (w, h) = planes.first().map_or((0, 0), |p| (p.width, p.height));
    if planes.iter().any(|p| p.width != w || p.height != h) {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "cube planes differ in size"));
    }
    let slices: Vec<&[f32]> = planes.iter().map(|p| p.data.as_slice()).collect();
    write_hdu(out, &[w, h, planes.len()], extra, &slices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn header_with_cards(n: usize) -> FitsHeader {
        let mut h = FitsHeader::new();
        for i in 0..n {
            h.set(&format!("KEY{}", i), i as i64);
        }
        h
    }

    #[test]
    fn test_parse_values() {
        assert_eq!(parse_value("                   T / flag"), Some(FitsValue::Bool(true)));
        assert_eq!(parse_value("                 -32"), Some(FitsValue::Int(-32)));
        assert_eq!(parse_value("  2.5E-05 / scale"), Some(FitsValue::Float(2.5e-5)));
        assert_eq!(parse_value(" 1.0D+02"), Some(FitsValue::Float(100.0)));
        assert_eq!(
            parse_value("'RA---TAN'           / projection"),
            Some(FitsValue::Str("RA---TAN".into()))
        );
        assert_eq!(parse_value("'it''s'"), Some(FitsValue::Str("it's".into())));
    }

    #[test]
    fn test_header_padding_counts_all_cards() {
        // 36 cards fill exactly one block; the writer must not emit a
        // spurious extra block or leave the data misaligned.
        for extra_cards in [0, 30, 31, 32, 60] {
            let raster = Raster::new(vec![1.5; 6], 3, 2);
            let mut buf = Vec::new();
            write_image(&mut buf, &header_with_cards(extra_cards), &raster).unwrap();
            assert_eq!(buf.len() % BLOCK_SIZE, 0);

            let mut cursor = Cursor::new(&buf);
            let header = read_header_from(&mut cursor, "mem").unwrap();
            assert_eq!(header.get_int("NAXIS1"), Some(3));
            let offset = cursor.position() as usize;
            assert_eq!(offset % BLOCK_SIZE, 0);
            assert_eq!(&buf[offset..offset + 4], &1.5f32.to_be_bytes());
        }
    }

    #[test]
    fn test_string_card_roundtrip() {
        let mut h = FitsHeader::new();
        h.set("SURVEY", "Legacy Surveys DR1");
        h.set("BAND0", "g");
        let mut buf = Vec::new();
        write_image(&mut buf, &h, &Raster::zeros(1, 1)).unwrap();
        let parsed = read_header_from(&mut Cursor::new(&buf), "mem").unwrap();
        assert_eq!(parsed.get_str("SURVEY"), Some("Legacy Surveys DR1"));
        assert_eq!(parsed.get_str("BAND0"), Some("g"));
    }

    #[test]
    fn test_float_card_precision() {
        let mut h = FitsHeader::new();
        h.set("CD1_1", -7.277_777_777_777_78e-5);
        let mut buf = Vec::new();
        write_image(&mut buf, &h, &Raster::zeros(1, 1)).unwrap();
        let parsed = read_header_from(&mut Cursor::new(&buf), "mem").unwrap();
        let v = parsed.get_float("CD1_1").unwrap();
        assert!((v + 7.277_777_777_777_78e-5).abs() < 1e-17);
    }

    /// Primary header with integer cards, padded to a block.
    fn raw_header(cards: &[(&str, i64)]) -> Vec<u8> {
        let mut buf = format!("{:<80}", format!("{:<8}= {:>20}", "SIMPLE", "T")).into_bytes();
        for (key, value) in cards {
            buf.extend(format!("{:<80}", format!("{:<8}= {:>20}", key, value)).bytes());
        }
        buf.extend(format!("{:<80}", "END").bytes());
        buf.resize(BLOCK_SIZE, b' ');
        buf
    }

    #[test]
    fn test_oversized_image_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for (w, h) in [(1i64 << 33, 1i64 << 33), (100_000, 100_000)] {
            let path = dir.path().join("huge.fits");
            std::fs::write(&path, raw_header(&[("BITPIX", 8), ("NAXIS", 2), ("NAXIS1", w), ("NAXIS2", h)])).unwrap();
            assert!(matches!(read_image(&path), Err(RasterError::InvalidHeader { .. })));
            assert!(matches!(read_window(&path, 0, 0, 1, 1), Err(RasterError::InvalidHeader { .. })));
        }
    }

    #[test]
    fn test_truncated_data_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.fits");
        let mut buf = raw_header(&[("BITPIX", -32), ("NAXIS", 2), ("NAXIS1", 100), ("NAXIS2", 100)]);
        buf.extend([0u8; 64]);
        std::fs::write(&path, buf).unwrap();
        assert!(matches!(read_image(&path), Err(RasterError::ReadFailed { .. })));
    }

    #[test]
    fn test_not_fits_rejected() {
        let buf = vec![b'x'; BLOCK_SIZE];
        assert!(read_header_from(&mut Cursor::new(&buf), "mem").is_err());
    }

    #[test]
    fn test_decode_scaled_int16() {
        let layout = Layout {
            bitpix: 16,
            width: 2,
            height: 1,
            bscale: 2.0,
            bzero: 10.0,
            data_len: 4,
        };
        let mut out = Vec::new();
        layout.decode_into(&[0x00, 0x03, 0xFF, 0xFF], &mut out);
        assert_eq!(out, vec![16.0, 8.0]);
    }
}
