//! File information panel contents.

use std::fmt;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use chrono::{DateTime, Local};

use crate::error::Result;

/// EXIF tags whose names contain one of these make it into the panel.
const EXIF_TAG_FILTER: &[&str] = &["Date", "Dimension", "Comment", "Description", "Compression"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegQuality {
    NotJpeg,
    NoTables,
    Estimated(u8),
}

impl fmt::Display for JpegQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JpegQuality::NotJpeg => write!(f, "N/A (not JPEG)"),
            JpegQuality::NoTables => write!(f, "N/A (no qtables)"),
            JpegQuality::Estimated(q) => write!(f, "{}", q),
        }
    }
}

/// Rough quality from the quantisation tables: smaller divisors mean higher
/// quality. `100 - mean`, clamped.
pub fn estimate_jpeg_quality(bytes: &[u8]) -> JpegQuality {
    let Some(tables) = quantization_tables(bytes) else {
        return JpegQuality::NotJpeg;
    };
    if tables.is_empty() {
        return JpegQuality::NoTables;
    }
    let mean_of_means = tables
        .iter()
        .map(|t| t.iter().map(|&v| v as f64).sum::<f64>() / t.len() as f64)
        .sum::<f64>()
        / tables.len() as f64;
    JpegQuality::Estimated((100.0 - mean_of_means).clamp(0.0, 100.0) as u8)
}

/// `None` if the data is not a JPEG stream.
fn quantization_tables(bytes: &[u8]) -> Option<Vec<Vec<u16>>> {
    if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != 0xD8 {
        return None;
    }
    let mut tables = Vec::new();
    let mut i = 2;
    while i + 4 <= bytes.len() {
        if bytes[i] != 0xFF {
            break;
        }
        let marker = bytes[i + 1];
        match marker {
            // fill byte
            0xFF => {
                i += 1;
                continue;
            }
            // start of scan / end of image: no tables past here
            0xDA | 0xD9 => break,
            // standalone markers
            0x01 | 0xD0..=0xD7 => {
                i += 2;
                continue;
            }
            _ => {}
        }
        let len = u16::from_be_bytes([bytes[i + 2], bytes[i + 3]]) as usize;
        if len < 2 || i + 2 + len > bytes.len() {
            break;
        }
        if marker == 0xDB {
            parse_dqt(&bytes[i + 4..i + 2 + len], &mut tables);
        }
        i += 2 + len;
    }
    Some(tables)
}

fn parse_dqt(mut segment: &[u8], tables: &mut Vec<Vec<u16>>) {
    while let Some((&precision_and_id, rest)) = segment.split_first() {
        let wide = precision_and_id >> 4 != 0;
        let size = if wide { 128 } else { 64 };
        if rest.len() < size {
            return;
        }
        let table = if wide {
            rest[..size]
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect()
        } else {
            rest[..size].iter().map(|&v| v as u16).collect()
        };
        tables.push(table);
        segment = &rest[size..];
    }
}

fn human_size(bytes: u64) -> String {
    let kb = bytes as f64 / 1024.0;
    if kb < 1024.0 {
        format!("{:.1} kB", kb)
    } else {
        format!("{:.1} MB", kb / 1024.0)
    }
}

/// Ordered (label, value) rows describing `path`.
pub fn describe(path: &Path) -> Result<Vec<(String, String)>> {
    let bytes = fs::read(path)?;
    let mut rows: Vec<(String, String)> = Vec::new();

    let absolute = std::path::absolute(path)?;
    let directory = absolute
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".".to_string());
    rows.push(("Directory".into(), directory));
    rows.push((
        "Filename".into(),
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    ));
    rows.push(("Image Quality".into(), estimate_jpeg_quality(&bytes).to_string()));
    rows.push(("File Size".into(), human_size(bytes.len() as u64)));

    if let Ok(format) = image::guess_format(&bytes) {
        rows.push(("MIME Type".into(), format.to_mime_type().to_string()));
    }
    if let Ok((w, h)) = image::image_dimensions(path) {
        rows.push(("Image Size".into(), format!("{}x{}", w, h)));
        rows.push((
            "Megapixels".into(),
            format!("{:.1}", (w as f64 * h as f64) / 1_000_000.0),
        ));
    }
    if let Ok(modified) = fs::metadata(path).and_then(|m| m.modified()) {
        let modified: DateTime<Local> = modified.into();
        rows.push((
            "File Modification Date/Time".into(),
            modified.format("%Y:%m:%d %H:%M:%S%:z").to_string(),
        ));
    }

    match exif::Reader::new().read_from_container(&mut Cursor::new(&bytes)) {
        Ok(exif) => {
            for field in exif.fields().filter(|f| f.ifd_num == exif::In::PRIMARY) {
                let tag = field.tag.to_string();
                if EXIF_TAG_FILTER.iter().any(|k| tag.contains(k)) {
                    rows.push((tag, field.display_value().with_unit(&exif).to_string()));
                }
            }
        }
        Err(e) => log::debug!("No EXIF in {}: {}", path.display(), e),
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn jpeg_with_tables(tables: &[(u8, Vec<u8>)]) -> Vec<u8> {
        let mut out = vec![0xFF, 0xD8];
        // APP0 stub so the parser has to skip a segment first
        out.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x04, 0x00, 0x00]);
        for (id, values) in tables {
            let len = (2 + 1 + values.len()) as u16;
            out.extend_from_slice(&[0xFF, 0xDB]);
            out.extend_from_slice(&len.to_be_bytes());
            out.push(*id);
            out.extend_from_slice(values);
        }
        out.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02, 0xFF, 0xD9]);
        out
    }

    #[test]
    fn quality_from_uniform_tables() {
        let bytes = jpeg_with_tables(&[(0, vec![10; 64]), (1, vec![30; 64])]);
        assert_eq!(estimate_jpeg_quality(&bytes), JpegQuality::Estimated(80));
    }

    #[test]
    fn huge_divisors_clamp_to_zero() {
        let bytes = jpeg_with_tables(&[(0, vec![255; 64])]);
        assert_eq!(estimate_jpeg_quality(&bytes), JpegQuality::Estimated(0));
    }

    #[test]
    fn sixteen_bit_tables_are_read() {
        let mut wide = Vec::new();
        for _ in 0..64 {
            wide.extend_from_slice(&20u16.to_be_bytes());
        }
        let bytes = jpeg_with_tables(&[(0x10, wide)]);
        assert_eq!(estimate_jpeg_quality(&bytes), JpegQuality::Estimated(80));
    }

    #[test]
    fn non_jpeg_and_tableless() {
        assert_eq!(estimate_jpeg_quality(b"\x89PNG\r\n\x1a\n"), JpegQuality::NotJpeg);
        assert_eq!(estimate_jpeg_quality(&jpeg_with_tables(&[])), JpegQuality::NoTables);
        assert_eq!(JpegQuality::NotJpeg.to_string(), "N/A (not JPEG)");
    }

    #[test]
    fn describe_png() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shot.png");
        image::RgbaImage::new(2000, 1000).save(&path).unwrap();

        let rows = describe(&path).expect("describe failed");
        let get = |k: &str| rows.iter().find(|(key, _)| key == k).map(|(_, v)| v.clone());
        assert_eq!(rows[0].0, "Directory");
        assert_eq!(get("Filename").as_deref(), Some("shot.png"));
        assert_eq!(get("Image Quality").as_deref(), Some("N/A (not JPEG)"));
        assert_eq!(get("MIME Type").as_deref(), Some("image/png"));
        assert_eq!(get("Image Size").as_deref(), Some("2000x1000"));
        assert_eq!(get("Megapixels").as_deref(), Some("2.0"));
    }

    #[test]
    fn describe_missing_file_fails() {
        let dir = tempdir().unwrap();
        assert!(describe(&dir.path().join("gone.jpg")).is_err());
    }
}
