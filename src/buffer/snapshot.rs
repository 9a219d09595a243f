//! Buffer snapshots
//!
//! On-disk format: the magic `SB\n`, one line of compact JSON describing the
//! geometry, then the raw cell bytes. The header line keeps the format
//! self-describing without pulling the cell payload through a serializer.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cell::{CELL_SIZE, CELL_SIZE_HD};
use super::{ScreenBuffer, ScreenBufferHd};
use crate::error::SnapshotError;

const MAGIC: &[u8; 3] = b"SB\n";
const VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Header {
    version: u32,
    width: i32,
    height: i32,
    cell_size: usize,
}

fn write_snapshot<W: Write>(
    mut w: W,
    width: i32,
    height: i32,
    cell_size: usize,
    cells: &[u8],
) -> Result<(), SnapshotError> {
    w.write_all(MAGIC)?;
    let header = Header {
        version: VERSION,
        width,
        height,
        cell_size,
    };
    let mut line = serde_json::to_vec(&header)?;
    line.push(b'\n');
    w.write_all(&line)?;
    w.write_all(cells)?;
    debug!(width, height, cell_size, "snapshot written");
    Ok(())
}

fn read_snapshot<R: Read>(
    r: R,
    expected_cell_size: usize,
) -> Result<(i32, i32, Vec<u8>), SnapshotError> {
    let mut r = BufReader::new(r);

    let mut magic = [0u8; 3];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(SnapshotError::BadMagic);
    }

    let mut line = String::new();
    r.read_line(&mut line)?;
    let header: Header = serde_json::from_str(line.trim_end())?;

    if header.version != VERSION {
        return Err(SnapshotError::UnsupportedVersion(header.version));
    }
    if header.width <= 0 || header.height <= 0 {
        return Err(SnapshotError::BadGeometry {
            width: header.width,
            height: header.height,
        });
    }
    if header.cell_size != expected_cell_size {
        return Err(SnapshotError::CellSizeMismatch {
            expected: expected_cell_size,
            found: header.cell_size,
        });
    }

    let expected = header.width as usize * header.height as usize * header.cell_size;
    let mut cells = Vec::with_capacity(expected);
    r.read_to_end(&mut cells)?;
    if cells.len() != expected {
        return Err(SnapshotError::SizeMismatch {
            expected,
            found: cells.len(),
        });
    }
    debug!(
        width = header.width,
        height = header.height,
        "snapshot loaded"
    );
    Ok((header.width, header.height, cells))
}

impl ScreenBuffer {
    /// Write the buffer contents to a snapshot stream.
    pub fn save_snapshot<W: Write>(&self, w: W) -> Result<(), SnapshotError> {
        use super::CellBuffer;
        write_snapshot(w, self.width(), self.height(), CELL_SIZE, self.raw())
    }

    /// Load a buffer from a snapshot stream.
    pub fn load_snapshot<R: Read>(r: R) -> Result<Self, SnapshotError> {
        let (width, height, cells) = read_snapshot(r, CELL_SIZE)?;
        Ok(Self::from_raw(width, height, cells))
    }

    pub fn save_snapshot_path<P: AsRef<Path>>(&self, path: P) -> Result<(), SnapshotError> {
        self.save_snapshot(File::create(path)?)
    }

    pub fn load_snapshot_path<P: AsRef<Path>>(path: P) -> Result<Self, SnapshotError> {
        Self::load_snapshot(File::open(path)?)
    }
}

impl ScreenBufferHd {
    /// Write the buffer contents to a snapshot stream.
    pub fn save_snapshot<W: Write>(&self, w: W) -> Result<(), SnapshotError> {
        use super::CellBuffer;
        write_snapshot(w, self.width(), self.height(), CELL_SIZE_HD, self.raw())
    }

    /// Load a buffer from a snapshot stream.
    pub fn load_snapshot<R: Read>(r: R) -> Result<Self, SnapshotError> {
        let (width, height, cells) = read_snapshot(r, CELL_SIZE_HD)?;
        Ok(Self::from_raw(width, height, cells))
    }

    pub fn save_snapshot_path<P: AsRef<Path>>(&self, path: P) -> Result<(), SnapshotError> {
        self.save_snapshot(File::create(path)?)
    }

    pub fn load_snapshot_path<P: AsRef<Path>>(path: P) -> Result<Self, SnapshotError> {
        Self::load_snapshot(File::open(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{Attr, CellBuffer, PutOptions};

    #[test]
    fn roundtrip_preserves_cells() {
        let mut buf = ScreenBuffer::new(6, 3);
        buf.put(
            &PutOptions::at(1, 1),
            &Attr {
                fg: 3,
                bold: true,
                ..Attr::default()
            },
            "hi世",
        );
        let mut bytes = Vec::new();
        buf.save_snapshot(&mut bytes).unwrap();

        let loaded = ScreenBuffer::load_snapshot(&bytes[..]).unwrap();
        assert_eq!(loaded.width(), 6);
        assert_eq!(loaded.height(), 3);
        assert_eq!(loaded.raw(), buf.raw());
        assert_eq!(loaded.glyph_at(3, 1), '世');
    }

    #[test]
    fn header_is_one_json_line() {
        let buf = ScreenBuffer::new(2, 2);
        let mut bytes = Vec::new();
        buf.save_snapshot(&mut bytes).unwrap();
        assert_eq!(&bytes[..3], b"SB\n");
        let rest = &bytes[3..];
        let nl = rest.iter().position(|&b| b == b'\n').unwrap();
        let header = std::str::from_utf8(&rest[..nl]).unwrap();
        assert!(header.contains("\"version\":1"));
        assert!(header.contains("\"cellSize\":8"));
    }

    #[test]
    fn bad_magic_rejected() {
        let err = ScreenBuffer::load_snapshot(&b"XX\nrest"[..]).unwrap_err();
        assert!(matches!(err, SnapshotError::BadMagic));
    }

    #[test]
    fn malformed_header_rejected() {
        let err = ScreenBuffer::load_snapshot(&b"SB\nnot json\n"[..]).unwrap_err();
        assert!(matches!(err, SnapshotError::Header(_)));
    }

    #[test]
    fn wrong_version_rejected() {
        let data = b"SB\n{\"version\":9,\"width\":1,\"height\":1,\"cellSize\":8}\n";
        let err = ScreenBuffer::load_snapshot(&data[..]).unwrap_err();
        assert!(matches!(err, SnapshotError::UnsupportedVersion(9)));
    }

    #[test]
    fn truncated_payload_rejected() {
        let mut buf = Vec::new();
        ScreenBuffer::new(2, 2).save_snapshot(&mut buf).unwrap();
        buf.truncate(buf.len() - 1);
        let err = ScreenBuffer::load_snapshot(&buf[..]).unwrap_err();
        assert!(matches!(err, SnapshotError::SizeMismatch { .. }));
    }

    #[test]
    fn hd_snapshot_rejected_by_low_color_loader() {
        let mut bytes = Vec::new();
        ScreenBufferHd::new(2, 2).save_snapshot(&mut bytes).unwrap();
        let err = ScreenBuffer::load_snapshot(&bytes[..]).unwrap_err();
        assert!(matches!(err, SnapshotError::CellSizeMismatch { .. }));
    }

    #[test]
    fn file_helpers_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.sb");
        let mut buf = ScreenBufferHd::new(3, 2);
        buf.put(&PutOptions::at(0, 0), &crate::buffer::AttrHd::default(), "ab");
        buf.save_snapshot_path(&path).unwrap();
        let loaded = ScreenBufferHd::load_snapshot_path(&path).unwrap();
        assert_eq!(loaded.raw(), buf.raw());
    }
}
