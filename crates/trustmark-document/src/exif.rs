// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Minimal EXIF reader for JPEG streams: finds the APP1 segment and reads the
// handful of ASCII tags the forensics checks need (capture dates, software,
// camera make/model).

use std::collections::BTreeMap;

const TAG_MAKE: u16 = 0x010F;
const TAG_MODEL: u16 = 0x0110;
const TAG_SOFTWARE: u16 = 0x0131;
const TAG_DATE_TIME: u16 = 0x0132;
const TAG_EXIF_IFD: u16 = 0x8769;
const TAG_DATE_TIME_ORIGINAL: u16 = 0x9003;
const TAG_DATE_TIME_DIGITIZED: u16 = 0x9004;

const TYPE_ASCII: u16 = 2;

/// Read EXIF tags from a JPEG file. Returns `None` when the image carries no
/// readable EXIF block or none of the tags of interest.
pub fn read_jpeg_exif(jpeg: &[u8]) -> Option<BTreeMap<String, String>> {
    let tiff = find_exif_segment(jpeg)?;
    let reader = TiffReader::new(tiff)?;

    let mut tags = BTreeMap::new();
    let ifd0 = reader.u32_at(4)? as usize;
    let mut exif_ifd = None;

    reader.read_ifd(ifd0, |tag, value| match tag {
        TAG_EXIF_IFD => exif_ifd = value.offset(),
        _ => {
            if let Some(text) = value.ascii() {
                insert_named(&mut tags, tag, text);
            }
        }
    });

    if let Some(offset) = exif_ifd {
        reader.read_ifd(offset as usize, |tag, value| {
            if let Some(text) = value.ascii() {
                insert_named(&mut tags, tag, text);
            }
        });
    }

    (!tags.is_empty()).then_some(tags)
}

fn insert_named(tags: &mut BTreeMap<String, String>, tag: u16, text: String) {
    let name = match tag {
        TAG_MAKE => "Make",
        TAG_MODEL => "Model",
        TAG_SOFTWARE => "Software",
        TAG_DATE_TIME => "DateTime",
        TAG_DATE_TIME_ORIGINAL => "DateTimeOriginal",
        TAG_DATE_TIME_DIGITIZED => "DateTimeDigitized",
        _ => return,
    };
    if !text.is_empty() {
        tags.insert(name.to_string(), text);
    }
}

/// Walk JPEG markers up to start-of-scan looking for `APP1 "Exif\0\0"`.
fn find_exif_segment(jpeg: &[u8]) -> Option<&[u8]> {
    if !jpeg.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut pos = 2;
    while pos + 4 <= jpeg.len() {
        if jpeg[pos] != 0xFF {
            return None;
        }
        let marker = jpeg[pos + 1];
        if marker == 0xDA || marker == 0xD9 {
            return None;
        }
        let length = u16::from_be_bytes([jpeg[pos + 2], jpeg[pos + 3]]) as usize;
        let segment = jpeg.get(pos + 4..pos + 2 + length)?;
        if marker == 0xE1
            && let Some(tiff) = segment.strip_prefix(b"Exif\0\0")
        {
            return Some(tiff);
        }
        pos += 2 + length;
    }
    None
}

struct TiffReader<'a> {
    data: &'a [u8],
    little_endian: bool,
}

/// One IFD entry's raw value.
struct EntryValue<'a> {
    reader: &'a TiffReader<'a>,
    kind: u16,
    count: u32,
    /// Position of the 4-byte value/offset field.
    field: usize,
}

impl EntryValue<'_> {
    fn offset(&self) -> Option<u32> {
        self.reader.u32_at(self.field)
    }

    fn ascii(&self) -> Option<String> {
        if self.kind != TYPE_ASCII {
            return None;
        }
        let count = self.count as usize;
        let start = if count <= 4 {
            self.field
        } else {
            self.reader.u32_at(self.field)? as usize
        };
        let bytes = self.reader.data.get(start..start + count)?;
        let text: String = bytes
            .iter()
            .take_while(|&&byte| byte != 0)
            .map(|&byte| byte as char)
            .collect();
        Some(text.trim().to_string())
    }
}

impl<'a> TiffReader<'a> {
    fn new(data: &'a [u8]) -> Option<Self> {
        let little_endian = match data.get(0..2)? {
            b"II" => true,
            b"MM" => false,
            _ => return None,
        };
        let reader = Self { data, little_endian };
        (reader.u16_at(2)? == 42).then_some(reader)
    }

    fn u16_at(&self, pos: usize) -> Option<u16> {
        let bytes: [u8; 2] = self.data.get(pos..pos + 2)?.try_into().ok()?;
        Some(if self.little_endian {
            u16::from_le_bytes(bytes)
        } else {
            u16::from_be_bytes(bytes)
        })
    }

    fn u32_at(&self, pos: usize) -> Option<u32> {
        let bytes: [u8; 4] = self.data.get(pos..pos + 4)?.try_into().ok()?;
        Some(if self.little_endian {
            u32::from_le_bytes(bytes)
        } else {
            u32::from_be_bytes(bytes)
        })
    }

    fn read_ifd(&self, offset: usize, mut visit: impl FnMut(u16, EntryValue<'_>)) {
        let Some(count) = self.u16_at(offset) else {
            return;
        };
        for index in 0..count as usize {
            let entry = offset + 2 + index * 12;
            let (Some(tag), Some(kind), Some(value_count)) = (
                self.u16_at(entry),
                self.u16_at(entry + 2),
                self.u32_at(entry + 4),
            ) else {
                return;
            };
            visit(
                tag,
                EntryValue {
                    reader: self,
                    kind,
                    count: value_count,
                    field: entry + 8,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a little-endian TIFF block with IFD0 {Software, ExifIFD} and
    /// an Exif IFD {DateTimeOriginal}, wrapped in a JPEG APP1 segment.
    fn jpeg_with_exif(software: &str, original: &str) -> Vec<u8> {
        let mut tiff = Vec::new();
        tiff.extend_from_slice(b"II");
        tiff.extend_from_slice(&42u16.to_le_bytes());
        tiff.extend_from_slice(&8u32.to_le_bytes());

        let software_bytes = format!("{software}\0").into_bytes();
        let original_bytes = format!("{original}\0").into_bytes();

        // IFD0 at 8: 2 entries -> 2 + 24 + 4 = 30 bytes, ends at 38.
        let exif_ifd_offset = 38u32;
        // Exif IFD: 1 entry -> 2 + 12 + 4 = 18 bytes, ends at 56.
        let software_offset = 56u32;
        let original_offset = software_offset + software_bytes.len() as u32;

        tiff.extend_from_slice(&2u16.to_le_bytes());
        tiff.extend_from_slice(&TAG_SOFTWARE.to_le_bytes());
        tiff.extend_from_slice(&TYPE_ASCII.to_le_bytes());
        tiff.extend_from_slice(&(software_bytes.len() as u32).to_le_bytes());
        tiff.extend_from_slice(&software_offset.to_le_bytes());
        tiff.extend_from_slice(&TAG_EXIF_IFD.to_le_bytes());
        tiff.extend_from_slice(&4u16.to_le_bytes());
        tiff.extend_from_slice(&1u32.to_le_bytes());
        tiff.extend_from_slice(&exif_ifd_offset.to_le_bytes());
        tiff.extend_from_slice(&0u32.to_le_bytes());

        tiff.extend_from_slice(&1u16.to_le_bytes());
        tiff.extend_from_slice(&TAG_DATE_TIME_ORIGINAL.to_le_bytes());
        tiff.extend_from_slice(&TYPE_ASCII.to_le_bytes());
        tiff.extend_from_slice(&(original_bytes.len() as u32).to_le_bytes());
        tiff.extend_from_slice(&original_offset.to_le_bytes());
        tiff.extend_from_slice(&0u32.to_le_bytes());

        assert_eq!(tiff.len(), software_offset as usize);
        tiff.extend_from_slice(&software_bytes);
        tiff.extend_from_slice(&original_bytes);

        let mut segment = b"Exif\0\0".to_vec();
        segment.extend_from_slice(&tiff);

        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
        jpeg.extend_from_slice(&((segment.len() + 2) as u16).to_be_bytes());
        jpeg.extend_from_slice(&segment);
        jpeg.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02, 0xFF, 0xD9]);
        jpeg
    }

    #[test]
    fn reads_software_and_capture_date() {
        let jpeg = jpeg_with_exif("Adobe Photoshop 25.0", "2019:06:01 10:15:00");
        let tags = read_jpeg_exif(&jpeg).expect("exif present");
        assert_eq!(tags.get("Software").map(String::as_str), Some("Adobe Photoshop 25.0"));
        assert_eq!(
            tags.get("DateTimeOriginal").map(String::as_str),
            Some("2019:06:01 10:15:00")
        );
    }

    #[test]
    fn jpeg_without_exif() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xDB, 0x00, 0x02, 0xFF, 0xDA, 0x00, 0x02];
        assert!(read_jpeg_exif(&jpeg).is_none());
    }

    #[test]
    fn not_a_jpeg() {
        assert!(read_jpeg_exif(b"\x89PNG\r\n").is_none());
        assert!(read_jpeg_exif(&[]).is_none());
    }

    #[test]
    fn truncated_segment_is_ignored() {
        let mut jpeg = jpeg_with_exif("GIMP 2.10", "2020:01:01 00:00:00");
        jpeg.truncate(30);
        assert!(read_jpeg_exif(&jpeg).is_none());
    }
}
