//! The file decoder: a parsed DICOM file and its decoded state.

use crate::read::{self, PaletteLut};
use crate::source::{DataSource, MMAP_THRESHOLD};
use crate::{FileNotFoundSnafu, MapFileSnafu, OpenFileSnafu, ReadError};
use memmap2::Mmap;
use snafu::ResultExt;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use voxel_core::transfer_syntax::TransferSyntax;
use voxel_core::{ImageInfo, PixelBuffer, Tag};

/// A DICOM Part 10 file with a fully parsed header.
///
/// The decoder owns its bytes, either read into memory or memory-mapped
/// for large files. Construction performs the whole header walk; pixel
/// decoding is done on demand by the pixel data layer and cached here, so
/// all post-construction reads go through `&self` and all mutation through
/// `&mut self`.
#[derive(Debug)]
pub struct FileDecoder {
    source: DataSource,
    path: Option<PathBuf>,
    ts: TransferSyntax,
    info: ImageInfo,
    metadata: BTreeMap<Tag, String>,
    palette: PaletteLut,
    pixel_data_offset: Option<usize>,
    pixel_data_len: usize,
    pixels: Option<PixelBuffer>,
}

impl FileDecoder {
    /// Open and parse the header of the file at `path`.
    ///
    /// Files of at least 10 MiB are memory-mapped; smaller ones are read
    /// into a heap buffer.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ReadError> {
        let path = path.as_ref();
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return FileNotFoundSnafu {
                    filename: path.to_path_buf(),
                }
                .fail()
            }
            Err(e) => {
                return Err(e).context(OpenFileSnafu {
                    filename: path.to_path_buf(),
                })
            }
        };
        let len = file
            .metadata()
            .context(OpenFileSnafu {
                filename: path.to_path_buf(),
            })?
            .len();

        let source = if len >= MMAP_THRESHOLD {
            // SAFETY: the mapping is read-only and private to this
            // decoder; the file is expected to stay unmodified while open
            let map = unsafe { Mmap::map(&file) }.context(MapFileSnafu {
                filename: path.to_path_buf(),
            })?;
            DataSource::Mapped(map)
        } else {
            let mut buffer = Vec::with_capacity(len as usize);
            file.read_to_end(&mut buffer).context(OpenFileSnafu {
                filename: path.to_path_buf(),
            })?;
            DataSource::Buffer(buffer)
        };

        Self::parse(source, Some(path.to_path_buf()))
    }

    /// Parse a DICOM file already held in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ReadError> {
        Self::parse(DataSource::Buffer(bytes), None)
    }

    fn parse(source: DataSource, path: Option<PathBuf>) -> Result<Self, ReadError> {
        let parsed = read::walk_header(&source)?;
        Ok(FileDecoder {
            source,
            path,
            ts: parsed.ts,
            info: parsed.info,
            metadata: parsed.metadata,
            palette: parsed.palette,
            pixel_data_offset: parsed.pixel_data_offset,
            pixel_data_len: parsed.pixel_data_len,
            pixels: None,
        })
    }

    /// The path this decoder was opened from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The transfer syntax governing the data set.
    pub fn transfer_syntax(&self) -> &TransferSyntax {
        &self.ts
    }

    /// The image attributes collected from the header.
    pub fn image_info(&self) -> &ImageInfo {
        &self.info
    }

    /// The palette color lookup tables, when present.
    pub fn palette(&self) -> &PaletteLut {
        &self.palette
    }

    /// The formatted metadata entry for a tag
    /// (`"<description>: <value>"`).
    pub fn info(&self, tag: Tag) -> Option<&str> {
        self.metadata.get(&tag).map(String::as_str)
    }

    /// Iterate over all formatted metadata entries in tag order.
    pub fn metadata(&self) -> impl Iterator<Item = (Tag, &str)> {
        self.metadata.iter().map(|(t, s)| (*t, s.as_str()))
    }

    fn value_of(&self, tag: Tag) -> Option<&str> {
        let entry = self.info(tag)?.trim_start_matches('>');
        entry.splitn(2, ": ").nth(1)
    }

    /// The metadata value of a tag parsed as an integer.
    pub fn int(&self, tag: Tag) -> Option<i64> {
        self.value_of(tag)?.split_whitespace().next()?.parse().ok()
    }

    /// The metadata value of a tag parsed as a floating point number.
    pub fn float(&self, tag: Tag) -> Option<f64> {
        self.value_of(tag)?.split_whitespace().next()?.parse().ok()
    }

    /// The whole underlying byte slice.
    pub fn data(&self) -> &[u8] {
        &self.source
    }

    /// The raw pixel data bytes, if the header declared (or the tail
    /// heuristic recovered) their position.
    pub fn pixel_data(&self) -> Option<&[u8]> {
        let offset = self.pixel_data_offset?;
        let end = (offset + self.pixel_data_len).min(self.source.len());
        Some(&self.source[offset..end])
    }

    /// Whether the file carries pixel data at all.
    pub fn has_pixel_data(&self) -> bool {
        self.pixel_data_offset.is_some()
    }

    /// The decoded pixel buffer, if one was stored.
    pub fn pixels(&self) -> Option<&PixelBuffer> {
        self.pixels.as_ref()
    }

    /// Store the decoded pixel buffer. Used by the pixel data layer after
    /// a successful decode.
    pub fn store_pixels(&mut self, pixels: PixelBuffer) {
        self.pixels = Some(pixels);
    }

    /// Take ownership of the decoded pixel buffer, leaving none behind.
    pub fn take_pixels(&mut self) -> Option<PixelBuffer> {
        self.pixels.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxel_core::PhotometricInterpretation;
    use voxel_dictionary::tags;

    /// Build a minimal explicit-VR-LE file: preamble, magic, transfer
    /// syntax, and the given extra elements.
    fn synthetic_file(elements: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; 128];
        out.extend_from_slice(b"DICM");
        // (0002,0010) UI, "1.2.840.10008.1.2.1\0"
        out.extend_from_slice(&[0x02, 0x00, 0x10, 0x00, b'U', b'I', 20, 0]);
        out.extend_from_slice(b"1.2.840.10008.1.2.1\0");
        out.extend_from_slice(elements);
        out
    }

    fn us_element(group: u16, element: u16, value: u16) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&group.to_le_bytes());
        out.extend_from_slice(&element.to_le_bytes());
        out.extend_from_slice(b"US");
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&value.to_le_bytes());
        out
    }

    fn pixel_data_ob(bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&[0xE0, 0x7F, 0x10, 0x00, b'O', b'B', 0, 0]);
        out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(bytes);
        out
    }

    #[test]
    fn parses_minimal_8bit_file() {
        let mut body = Vec::new();
        body.extend(us_element(0x0028, 0x0010, 2));
        body.extend(us_element(0x0028, 0x0011, 2));
        body.extend(us_element(0x0028, 0x0100, 8));
        body.extend(us_element(0x0028, 0x0002, 1));
        body.extend(pixel_data_ob(&[0x10, 0x20, 0x30, 0x40]));

        let decoder = FileDecoder::from_bytes(synthetic_file(&body)).unwrap();
        let info = decoder.image_info();
        assert_eq!(info.width, 2);
        assert_eq!(info.height, 2);
        assert_eq!(info.bit_depth, 8);
        assert_eq!(info.samples_per_pixel, 1);
        assert_eq!(decoder.pixel_data(), Some(&[0x10, 0x20, 0x30, 0x40][..]));
    }

    #[test]
    fn metadata_dictionary_and_accessors() {
        let mut body = Vec::new();
        body.extend(us_element(0x0028, 0x0010, 512));
        // (0008,0060) CS "CT"
        body.extend_from_slice(&[0x08, 0x00, 0x60, 0x00, b'C', b'S', 2, 0]);
        body.extend_from_slice(b"CT");

        let decoder = FileDecoder::from_bytes(synthetic_file(&body)).unwrap();
        assert_eq!(decoder.info(tags::ROWS), Some("Rows: 512"));
        assert_eq!(decoder.int(tags::ROWS), Some(512));
        assert_eq!(decoder.info(tags::MODALITY), Some("Modality: CT"));
        assert_eq!(decoder.image_info().modality.as_deref(), Some("CT"));
    }

    #[test]
    fn rejects_non_dicom() {
        let err = FileDecoder::from_bytes(vec![0u8; 64]).unwrap_err();
        assert!(matches!(err, ReadError::NotDicom { .. }));

        let mut garbage = vec![0u8; 128];
        garbage.extend_from_slice(b"GIF8");
        let err = FileDecoder::from_bytes(garbage).unwrap_err();
        assert!(matches!(err, ReadError::NotDicom { .. }));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = FileDecoder::from_path("/no/such/file.dcm").unwrap_err();
        assert!(matches!(err, ReadError::FileNotFound { .. }));
    }

    #[test]
    fn photometric_and_window_attributes() {
        let mut body = Vec::new();
        body.extend(us_element(0x0028, 0x0010, 1));
        body.extend(us_element(0x0028, 0x0011, 1));
        // (0028,0004) CS "MONOCHROME1 "
        body.extend_from_slice(&[0x28, 0x00, 0x04, 0x00, b'C', b'S', 12, 0]);
        body.extend_from_slice(b"MONOCHROME1 ");
        // (0028,1050) DS "40\80" -> last value wins
        body.extend_from_slice(&[0x28, 0x00, 0x50, 0x10, b'D', b'S', 6, 0]);
        body.extend_from_slice(b"40\\80 ");

        let decoder = FileDecoder::from_bytes(synthetic_file(&body)).unwrap();
        assert_eq!(
            decoder.image_info().photometric,
            PhotometricInterpretation::Monochrome1
        );
        assert_eq!(decoder.image_info().window_center, Some(80.0));
    }

    #[test]
    fn trailing_pixels_are_recovered() {
        let mut body = Vec::new();
        body.extend(us_element(0x0028, 0x0010, 2));
        body.extend(us_element(0x0028, 0x0011, 2));
        body.extend(us_element(0x0028, 0x0100, 8));
        // no PixelData element; four bytes ride at the tail
        body.extend_from_slice(&[9, 8, 7, 6]);

        let decoder = FileDecoder::from_bytes(synthetic_file(&body)).unwrap();
        assert_eq!(decoder.pixel_data(), Some(&[9, 8, 7, 6][..]));
    }
}
