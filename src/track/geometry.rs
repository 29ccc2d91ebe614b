// Reference geometry for a track: boundaries and the ideal raceline
//
// On disk each track is a `<track>.bin` file with three sections in order
// (inner boundary, outer boundary, raceline). A section is a little-endian
// u32 point count followed by that many little-endian (f32 x, f32 y) pairs.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::errors::LaplineError;
use crate::track::storage_file_name;

/// Represents a 2D coordinate point
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2D) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReferenceGeometry {
    pub inner: Vec<Point2D>,
    pub outer: Vec<Point2D>,
    pub raceline: Vec<Point2D>,
}

impl ReferenceGeometry {
    /// Reason the geometry cannot be used for comparison, if any.
    pub fn validate(&self) -> Result<(), String> {
        if self.inner.is_empty() || self.outer.is_empty() {
            return Err("track boundaries are empty".to_string());
        }
        if self.raceline.is_empty() {
            return Err("raceline is empty".to_string());
        }
        Ok(())
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for section in [&self.inner, &self.outer, &self.raceline] {
            bytes.extend_from_slice(&(section.len() as u32).to_le_bytes());
            for point in section {
                bytes.extend_from_slice(&point.x.to_le_bytes());
                bytes.extend_from_slice(&point.y.to_le_bytes());
            }
        }
        bytes
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, String> {
        let mut reader = SectionReader { bytes, offset: 0 };
        let inner = reader.section("inner")?;
        let outer = reader.section("outer")?;
        let raceline = reader.section("raceline")?;
        if reader.offset != bytes.len() {
            return Err(format!(
                "{} trailing bytes after raceline",
                bytes.len() - reader.offset
            ));
        }
        Ok(Self {
            inner,
            outer,
            raceline,
        })
    }
}

struct SectionReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl SectionReader<'_> {
    fn take<const N: usize>(&mut self, what: &str) -> Result<[u8; N], String> {
        let chunk: [u8; N] = self
            .bytes
            .get(self.offset..self.offset + N)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| format!("truncated {what} at byte {}", self.offset))?;
        self.offset += N;
        Ok(chunk)
    }

    fn section(&mut self, name: &str) -> Result<Vec<Point2D>, String> {
        let count = u32::from_le_bytes(self.take::<4>(name)?) as usize;
        let remaining = self.bytes.len().saturating_sub(self.offset);
        if count.saturating_mul(8) > remaining {
            return Err(format!(
                "{name} declares {count} points but only {remaining} bytes remain"
            ));
        }
        let mut points = Vec::with_capacity(count);
        for _ in 0..count {
            let x = f32::from_le_bytes(self.take::<4>(name)?);
            let y = f32::from_le_bytes(self.take::<4>(name)?);
            points.push(Point2D::new(x, y));
        }
        Ok(points)
    }
}

/// Source of reference geometry, keyed by track.
pub trait GeometryStore {
    /// Load geometry for a track, `None` when the store has no entry.
    fn load_geometry(&self, track_id: &str) -> Result<Option<ReferenceGeometry>, LaplineError>;
}

/// Geometry files produced by the track extraction pipeline.
pub struct FileGeometryStore {
    storage_path: PathBuf,
}

impl FileGeometryStore {
    pub fn new(storage_path: PathBuf) -> Self {
        Self { storage_path }
    }

    pub fn default_storage_path() -> Result<PathBuf, LaplineError> {
        let app_data_dir = dirs::data_dir().ok_or(LaplineError::NoConfigDir)?;
        Ok(app_data_dir.join("lapline").join("geometry"))
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    fn file_path_for_track(&self, track_id: &str) -> PathBuf {
        self.storage_path
            .join(format!("{}.bin", storage_file_name(track_id)))
    }
}

impl GeometryStore for FileGeometryStore {
    fn load_geometry(&self, track_id: &str) -> Result<Option<ReferenceGeometry>, LaplineError> {
        let file_path = self.file_path_for_track(track_id);
        if !file_path.exists() {
            debug!("Geometry file does not exist: {file_path:?}");
            return Ok(None);
        }

        let bytes = fs::read(&file_path).map_err(|e| LaplineError::GeometryIo { source: e })?;
        ReferenceGeometry::decode(&bytes).map(Some).map_err(|reason| {
            error!("Could not decode geometry file {file_path:?}: {reason}");
            LaplineError::GeometryInvalid {
                track_id: track_id.to_string(),
                reason,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn square(size: f32) -> Vec<Point2D> {
        vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(size, 0.0),
            Point2D::new(size, size),
            Point2D::new(0.0, size),
        ]
    }

    fn geometry() -> ReferenceGeometry {
        ReferenceGeometry {
            inner: square(10.0),
            outer: square(20.0),
            raceline: square(15.0),
        }
    }

    #[test]
    fn test_decode_reads_encoded_sections() {
        let decoded = ReferenceGeometry::decode(&geometry().encode()).unwrap();
        assert_eq!(decoded, geometry());
    }

    #[test]
    fn test_decode_rejects_truncated_data() {
        let bytes = geometry().encode();
        assert!(ReferenceGeometry::decode(&bytes[..bytes.len() - 3]).is_err());
        assert!(ReferenceGeometry::decode(&[]).is_err());

        let mut lying = bytes.clone();
        lying[0..4].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(ReferenceGeometry::decode(&lying).is_err());
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut bytes = geometry().encode();
        bytes.push(0);
        assert!(ReferenceGeometry::decode(&bytes).is_err());
    }

    #[test]
    fn test_validate_requires_all_sections() {
        assert!(geometry().validate().is_ok());
        let no_raceline = ReferenceGeometry {
            raceline: Vec::new(),
            ..geometry()
        };
        assert!(no_raceline.validate().is_err());
        assert!(ReferenceGeometry::default().validate().is_err());
    }

    #[test]
    fn test_file_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileGeometryStore::new(temp_dir.path().to_path_buf());
        assert!(store.load_geometry("Laguna Seca").unwrap().is_none());

        fs::write(temp_dir.path().join("laguna_seca.bin"), geometry().encode()).unwrap();
        assert_eq!(
            store.load_geometry("Laguna Seca").unwrap(),
            Some(geometry())
        );

        fs::write(temp_dir.path().join("broken.bin"), [1, 2, 3]).unwrap();
        assert!(matches!(
            store.load_geometry("broken"),
            Err(LaplineError::GeometryInvalid { .. })
        ));
    }
}
