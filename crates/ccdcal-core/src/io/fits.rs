use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use memmap2::Mmap;
use ndarray::Array2;
use tracing::debug;

use crate::consts::{FITS_BLOCK_SIZE, FITS_CARD_SIZE, MASK_EXTNAME};
use crate::error::{CcdError, Result};
use crate::frame::{DefectMask, Frame, FrameMetadata, HeaderValue, ImageType};

/// Keywords that describe the data layout or are mapped onto `FrameMetadata`.
/// They are regenerated on write and never kept in `FrameMetadata::extra`.
const RESERVED_KEYWORDS: &[&str] = &[
    "SIMPLE", "XTENSION", "BITPIX", "NAXIS", "NAXIS1", "NAXIS2", "NAXIS3", "EXTEND", "PCOUNT",
    "GCOUNT", "BZERO", "BSCALE", "BLANK", "EXTNAME", "IMAGETYP", "EXPTIME", "EXPOSURE", "GAIN",
    "COMBINED", "END",
];

/// Ordered FITS header of one HDU.
#[derive(Clone, Debug, Default)]
pub struct FitsHeader {
    cards: Vec<(String, HeaderValue)>,
}

impl FitsHeader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        let key = key.to_ascii_uppercase();
        self.cards.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(HeaderValue::as_f64)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            HeaderValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(HeaderValue::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(HeaderValue::as_bool)
    }

    /// Insert or replace a card, keeping the original position on replace.
    pub fn set(&mut self, key: &str, value: HeaderValue) {
        let key = key.to_ascii_uppercase();
        match self.cards.iter_mut().find(|(k, _)| *k == key) {
            Some(card) => card.1 = value,
            None => self.cards.push((key, value)),
        }
    }

    pub fn cards(&self) -> &[(String, HeaderValue)] {
        &self.cards
    }

    /// Interpret the calibration keywords of this header.
    ///
    /// An unrecognised `IMAGETYP` leaves the image type unset.
    pub fn frame_metadata(&self) -> FrameMetadata {
        let image_type = self
            .get_str("IMAGETYP")
            .and_then(|s| s.parse::<ImageType>().ok());
        let exposure_time = self
            .get_f64("EXPTIME")
            .or_else(|| self.get_f64("EXPOSURE"));
        let extra = self
            .cards
            .iter()
            .filter(|(k, _)| !RESERVED_KEYWORDS.contains(&k.as_str()))
            .cloned()
            .collect();

        FrameMetadata {
            image_type,
            exposure_time,
            gain: self.get_f64("GAIN"),
            combined: self.get_bool("COMBINED").unwrap_or(false),
            extra,
        }
    }

    fn image_axes(&self) -> Result<(usize, usize)> {
        let naxis = self.get_i64("NAXIS").unwrap_or(0);
        match naxis {
            0 => Ok((0, 0)),
            2 => {
                let cols = self.axis_len("NAXIS1")?;
                let rows = self.axis_len("NAXIS2")?;
                Ok((rows, cols))
            }
            n => Err(CcdError::InvalidFits(format!(
                "only 2-D images are supported, NAXIS = {n}"
            ))),
        }
    }

    fn axis_len(&self, key: &str) -> Result<usize> {
        self.get_i64(key)
            .filter(|&v| v >= 0)
            .map(|v| v as usize)
            .ok_or_else(|| CcdError::InvalidFits(format!("missing or invalid {key}")))
    }

    fn bitpix(&self) -> Result<i64> {
        self.get_i64("BITPIX")
            .ok_or_else(|| CcdError::InvalidFits("missing BITPIX".into()))
    }
}

/// One header-data unit located inside a file buffer.
struct Hdu {
    header: FitsHeader,
    data_offset: usize,
    /// Unpadded data length in bytes.
    data_len: usize,
    shape: (usize, usize),
}

impl Hdu {
    fn is_mask_extension(&self) -> bool {
        self.header
            .get_str("EXTNAME")
            .is_some_and(|name| name.eq_ignore_ascii_case(MASK_EXTNAME))
    }

    fn has_image(&self) -> bool {
        self.shape.0 > 0 && self.shape.1 > 0
    }

    fn data<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.data_offset..self.data_offset + self.data_len]
    }
}

/// Memory-mapped FITS image that decodes pixel rows on demand.
///
/// Only the header is parsed on open; `read_rows` touches just the bytes of
/// the requested band, so a stack of large frames can be combined a few rows
/// at a time.
pub struct FitsImage {
    mmap: Mmap,
    image: Hdu,
    mask: Option<Hdu>,
    metadata: FrameMetadata,
}

impl FitsImage {
    /// Open the primary image (or first image extension when the primary HDU
    /// is empty) and the `MASK` extension if present. Calibration metadata
    /// comes from the primary header.
    pub fn open(path: &Path) -> Result<Self> {
        let mmap = map_file(path)?;
        let mut hdus = parse_hdus(&mmap, path)?.into_iter();
        let primary = hdus
            .next()
            .ok_or_else(|| CcdError::InvalidFits("no HDU found".into()))?;
        let metadata = primary.header.frame_metadata();

        let mut image = primary.has_image().then_some(primary);
        let mut mask = None;
        for hdu in hdus {
            if hdu.is_mask_extension() {
                if mask.is_none() {
                    mask = Some(hdu);
                }
            } else if image.is_none() && hdu.has_image() {
                image = Some(hdu);
            }
        }
        let image =
            image.ok_or_else(|| CcdError::InvalidFits("no image data found".into()))?;
        if let Some(ref mask) = mask {
            if mask.shape != image.shape {
                return Err(CcdError::ShapeMismatch {
                    expected: image.shape,
                    found: mask.shape,
                });
            }
        }

        Ok(Self {
            mmap,
            image,
            mask,
            metadata,
        })
    }

    /// `(rows, cols)` of the image.
    pub fn shape(&self) -> (usize, usize) {
        self.image.shape
    }

    pub fn metadata(&self) -> &FrameMetadata {
        &self.metadata
    }

    pub fn has_mask(&self) -> bool {
        self.mask.is_some()
    }

    /// Decode rows `start..end` of the image.
    pub fn read_rows(&self, start: usize, end: usize) -> Result<Array2<f64>> {
        decode_rows(&self.image, &self.mmap, start, end)
    }

    /// Decode rows `start..end` of the `MASK` extension, if the file has one.
    pub fn read_mask_rows(&self, start: usize, end: usize) -> Result<Option<Array2<bool>>> {
        self.mask
            .as_ref()
            .map(|hdu| decode_rows(hdu, &self.mmap, start, end).map(mask_values))
            .transpose()
    }

    /// Decode the whole file into an owned `Frame`.
    pub fn into_frame(self) -> Result<Frame> {
        let rows = self.image.shape.0;
        let mut frame = Frame::new(self.read_rows(0, rows)?);
        if let Some(mask) = self.read_mask_rows(0, rows)? {
            frame = frame.with_mask(DefectMask::new(mask))?;
        }
        frame.metadata = self.metadata;
        Ok(frame)
    }
}

/// Read only the primary header of a FITS file.
pub fn read_header(path: &Path) -> Result<FitsHeader> {
    let mmap = map_file(path)?;
    let (keywords, _) = scan_header(&mmap, 0)?;
    let fits = fitrs::Fits::open(path)?;
    header_values(&fits, 0, &keywords)
}

/// Load a frame: primary image (or first image extension when the primary
/// HDU is empty), calibration metadata from the primary header, and the
/// `MASK` extension if present.
pub fn load_frame(path: &Path) -> Result<Frame> {
    let frame = FitsImage::open(path)?.into_frame()?;
    debug!(
        path = %path.display(),
        rows = frame.height(),
        cols = frame.width(),
        masked = frame.mask.is_some(),
        "Loaded FITS frame"
    );
    Ok(frame)
}

/// Load a defect mask stored as an integer image (non-zero = True).
pub fn load_mask(path: &Path) -> Result<DefectMask> {
    let mmap = map_file(path)?;
    let hdus = parse_hdus(&mmap, path)?;
    let hdu = hdus
        .iter()
        .find(|h| h.has_image())
        .ok_or_else(|| CcdError::InvalidFits("no mask data found".into()))?;
    let values = decode_rows(hdu, &mmap, 0, hdu.shape.0)?;
    Ok(DefectMask::new(mask_values(values)))
}

/// Write a frame as BITPIX -64 with its mask, if any, as an 8-bit `MASK`
/// image extension.
pub fn save_frame(frame: &Frame, path: &Path) -> Result<()> {
    let (rows, cols) = frame.shape();
    let mut header = FitsHeader::new();
    header.set("SIMPLE", HeaderValue::Logical(true));
    header.set("BITPIX", HeaderValue::Integer(-64));
    header.set("NAXIS", HeaderValue::Integer(2));
    header.set("NAXIS1", HeaderValue::Integer(cols as i64));
    header.set("NAXIS2", HeaderValue::Integer(rows as i64));
    if frame.mask.is_some() {
        header.set("EXTEND", HeaderValue::Logical(true));
    }
    write_metadata(&mut header, &frame.metadata);

    let mut bytes = vec![0u8; rows * cols * 8];
    let pixels: Vec<f64> = frame.data.iter().copied().collect();
    BigEndian::write_f64_into(&pixels, &mut bytes);

    let mut writer = BufWriter::new(File::create(path)?);
    write_hdu(&mut writer, &header, &bytes)?;

    if let Some(ref mask) = frame.mask {
        let mut ext = mask_header(mask, false);
        ext.set("EXTNAME", HeaderValue::Text(MASK_EXTNAME.into()));
        write_hdu(&mut writer, &ext, &mask_bytes(mask))?;
    }

    writer.flush()?;
    debug!(path = %path.display(), rows, cols, "Saved FITS frame");
    Ok(())
}

/// Write a defect mask as an 8-bit (0/1) primary image.
pub fn save_mask(mask: &DefectMask, path: &Path) -> Result<()> {
    let header = mask_header(mask, true);
    let mut writer = BufWriter::new(File::create(path)?);
    write_hdu(&mut writer, &header, &mask_bytes(mask))?;
    writer.flush()?;
    debug!(path = %path.display(), flagged = mask.count(), "Saved FITS mask");
    Ok(())
}

fn map_file(path: &Path) -> Result<Mmap> {
    let file = File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };
    if mmap.len() < FITS_BLOCK_SIZE {
        return Err(CcdError::InvalidFits(format!(
            "{}: file too small for a FITS header",
            path.display()
        )));
    }
    if !mmap.starts_with(b"SIMPLE  ") {
        return Err(CcdError::InvalidFits(format!(
            "{}: missing SIMPLE keyword",
            path.display()
        )));
    }
    Ok(mmap)
}

/// Locate every HDU in the mapped file. Header values come from `fitrs`;
/// the byte layout is walked here so pixel data can be sliced from the map.
fn parse_hdus(buf: &[u8], path: &Path) -> Result<Vec<Hdu>> {
    let fits = fitrs::Fits::open(path)?;
    let mut hdus = Vec::new();
    let mut offset = 0;

    while offset + FITS_BLOCK_SIZE <= buf.len() {
        // Anything after the last extension that is not another HDU is ignored.
        if offset > 0 && !buf[offset..].starts_with(b"XTENSION") {
            break;
        }
        let (keywords, header_len) = scan_header(buf, offset)?;
        let header = header_values(&fits, hdus.len(), &keywords)?;
        let shape = header.image_axes()?;
        let bytes_per_pixel = bytes_per_pixel(header.bitpix()?)?;
        let data_len = shape.0 * shape.1 * bytes_per_pixel;
        let data_offset = offset + header_len;

        if data_offset + data_len > buf.len() {
            return Err(CcdError::InvalidFits(format!(
                "data truncated: expected {} bytes at offset {}, file has {}",
                data_len,
                data_offset,
                buf.len()
            )));
        }

        hdus.push(Hdu {
            header,
            data_offset,
            data_len,
            shape,
        });
        offset = data_offset + padded_len(data_len);
    }

    if hdus.is_empty() {
        return Err(CcdError::InvalidFits("no HDU found".into()));
    }
    Ok(hdus)
}

/// Collect the value-card keywords from `offset` up to `END`, in card order.
/// Returns the keywords and the padded header length in bytes.
fn scan_header(buf: &[u8], offset: usize) -> Result<(Vec<String>, usize)> {
    let mut keywords = Vec::new();
    let mut pos = offset;

    loop {
        if pos + FITS_CARD_SIZE > buf.len() {
            return Err(CcdError::InvalidFits("header has no END card".into()));
        }
        let card = &buf[pos..pos + FITS_CARD_SIZE];
        pos += FITS_CARD_SIZE;

        let keyword = String::from_utf8_lossy(&card[..8]).trim_end().to_string();
        if keyword == "END" {
            break;
        }
        // COMMENT/HISTORY and blank cards carry no value.
        if keyword.is_empty() || &card[8..10] != b"= " || keywords.contains(&keyword) {
            continue;
        }
        keywords.push(keyword);
    }

    Ok((keywords, padded_len(pos - offset)))
}

/// Build the header of HDU `index` from `fitrs` values. Cards whose value
/// has no `HeaderValue` counterpart (complex numbers, malformed text) are
/// skipped rather than failing the file.
fn header_values(fits: &fitrs::Fits, index: usize, keywords: &[String]) -> Result<FitsHeader> {
    let hdu = fits
        .get(index)
        .ok_or_else(|| CcdError::InvalidFits(format!("HDU {index} could not be read")))?;

    let mut header = FitsHeader::new();
    for keyword in keywords {
        match hdu.value(keyword.as_str()).and_then(convert_value) {
            Some(value) => header.cards.push((keyword.clone(), value)),
            None => debug!(keyword = %keyword, "Skipping unsupported header value"),
        }
    }
    Ok(header)
}

fn convert_value(value: &fitrs::HeaderValue) -> Option<HeaderValue> {
    match value {
        fitrs::HeaderValue::CharacterString(s) => {
            Some(HeaderValue::Text(s.trim_end().to_string()))
        }
        fitrs::HeaderValue::Logical(b) => Some(HeaderValue::Logical(*b)),
        fitrs::HeaderValue::IntegerNumber(v) => Some(HeaderValue::Integer(i64::from(*v))),
        fitrs::HeaderValue::RealFloatingNumber(v) => Some(HeaderValue::Float(*v)),
        _ => None,
    }
}

fn bytes_per_pixel(bitpix: i64) -> Result<usize> {
    match bitpix {
        8 => Ok(1),
        16 => Ok(2),
        32 | -32 => Ok(4),
        64 | -64 => Ok(8),
        other => Err(CcdError::InvalidFits(format!("unsupported BITPIX {other}"))),
    }
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(FITS_BLOCK_SIZE) * FITS_BLOCK_SIZE
}

/// Decode rows `start..end` of raw big-endian pixels to f64, applying
/// BZERO/BSCALE and BLANK.
fn decode_rows(hdu: &Hdu, buf: &[u8], start: usize, end: usize) -> Result<Array2<f64>> {
    let (rows, cols) = hdu.shape;
    if start > end || end > rows {
        return Err(CcdError::InvalidParameter(format!(
            "row range {start}..{end} outside image of {rows} rows"
        )));
    }
    let bitpix = hdu.header.bitpix()?;
    let row_bytes = cols * bytes_per_pixel(bitpix)?;
    let raw = &hdu.data(buf)[start * row_bytes..end * row_bytes];
    let n = (end - start) * cols;

    let bzero = hdu.header.get_f64("BZERO").unwrap_or(0.0);
    let bscale = hdu.header.get_f64("BSCALE").unwrap_or(1.0);
    let blank = hdu.header.get_i64("BLANK");

    let scale_int = |v: i64| -> f64 {
        if blank == Some(v) {
            f64::NAN
        } else {
            bzero + bscale * v as f64
        }
    };

    let pixels: Vec<f64> = match bitpix {
        8 => raw.iter().map(|&v| scale_int(v as i64)).collect(),
        16 => {
            let mut values = vec![0i16; n];
            BigEndian::read_i16_into(raw, &mut values);
            values.into_iter().map(|v| scale_int(v as i64)).collect()
        }
        32 => {
            let mut values = vec![0i32; n];
            BigEndian::read_i32_into(raw, &mut values);
            values.into_iter().map(|v| scale_int(v as i64)).collect()
        }
        64 => {
            let mut values = vec![0i64; n];
            BigEndian::read_i64_into(raw, &mut values);
            values.into_iter().map(scale_int).collect()
        }
        -32 => {
            let mut values = vec![0f32; n];
            BigEndian::read_f32_into(raw, &mut values);
            values
                .into_iter()
                .map(|v| bzero + bscale * v as f64)
                .collect()
        }
        -64 => {
            let mut values = vec![0f64; n];
            BigEndian::read_f64_into(raw, &mut values);
            values.into_iter().map(|v| bzero + bscale * v).collect()
        }
        other => {
            return Err(CcdError::InvalidFits(format!("unsupported BITPIX {other}")));
        }
    };

    Array2::from_shape_vec((end - start, cols), pixels)
        .map_err(|e| CcdError::InvalidFits(format!("pixel data does not match NAXIS: {e}")))
}

fn mask_values(values: Array2<f64>) -> Array2<bool> {
    values.mapv(|v| v != 0.0 && !v.is_nan())
}


fn mask_header(mask: &DefectMask, primary: bool) -> FitsHeader {
    let (rows, cols) = mask.shape();
    let mut header = FitsHeader::new();
    if primary {
        header.set("SIMPLE", HeaderValue::Logical(true));
    } else {
        header.set("XTENSION", HeaderValue::Text("IMAGE".into()));
    }
    header.set("BITPIX", HeaderValue::Integer(8));
    header.set("NAXIS", HeaderValue::Integer(2));
    header.set("NAXIS1", HeaderValue::Integer(cols as i64));
    header.set("NAXIS2", HeaderValue::Integer(rows as i64));
    if !primary {
        header.set("PCOUNT", HeaderValue::Integer(0));
        header.set("GCOUNT", HeaderValue::Integer(1));
    }
    header
}

fn mask_bytes(mask: &DefectMask) -> Vec<u8> {
    mask.as_array().iter().map(|&v| u8::from(v)).collect()
}

fn write_metadata(header: &mut FitsHeader, metadata: &FrameMetadata) {
    if let Some(image_type) = metadata.image_type {
        header.set(
            "IMAGETYP",
            HeaderValue::Text(image_type.as_header_str().into()),
        );
    }
    if let Some(exposure) = metadata.exposure_time {
        header.set("EXPTIME", HeaderValue::Float(exposure));
    }
    if let Some(gain) = metadata.gain {
        header.set("GAIN", HeaderValue::Float(gain));
    }
    if metadata.combined {
        header.set("COMBINED", HeaderValue::Logical(true));
    }
    for (key, value) in &metadata.extra {
        if !RESERVED_KEYWORDS.contains(&key.as_str()) {
            header.set(key, value.clone());
        }
    }
}

fn write_hdu(w: &mut impl Write, header: &FitsHeader, data: &[u8]) -> Result<()> {
    let mut header_bytes = Vec::with_capacity(FITS_BLOCK_SIZE);
    for (key, value) in header.cards() {
        header_bytes.extend_from_slice(&format_card(key, value));
    }
    header_bytes.extend_from_slice(&pad_card("END"));
    header_bytes.resize(padded_len(header_bytes.len()), b' ');
    w.write_all(&header_bytes)?;

    w.write_all(data)?;
    let padding = padded_len(data.len()) - data.len();
    w.write_all(&vec![0u8; padding])?;
    Ok(())
}

fn format_card(key: &str, value: &HeaderValue) -> [u8; FITS_CARD_SIZE] {
    let value_field = match value {
        HeaderValue::Logical(b) => format!("{:>20}", if *b { "T" } else { "F" }),
        HeaderValue::Integer(v) => format!("{v:>20}"),
        HeaderValue::Float(v) => format!("{:>20}", format_float(*v)),
        HeaderValue::Text(s) => {
            let escaped = s.replace('\'', "''");
            format!("'{escaped:<8}'")
        }
    };
    let key: String = key.chars().take(8).collect();
    pad_card(&format!("{key:<8}= {value_field}"))
}

/// Floats always carry a decimal point or exponent so they read back as floats.
fn format_float(v: f64) -> String {
    let plain = format!("{v}");
    if plain.len() <= 20 && plain.contains(['.', 'e', 'E', 'N', 'n']) {
        plain
    } else if plain.len() <= 18 && !plain.contains(['e', 'E']) {
        format!("{plain}.0")
    } else {
        format!("{v:E}")
    }
}

fn pad_card(text: &str) -> [u8; FITS_CARD_SIZE] {
    let mut card = [b' '; FITS_CARD_SIZE];
    for (dst, src) in card.iter_mut().zip(text.bytes()) {
        *dst = src;
    }
    card
}
