//! Calibration document: point pairs and the solved transform.

use std::path::Path;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::projection::{CalibrationTransform, PointPair};
use crate::settings::{read_document, write_document, SettingsError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct PairDoc {
    sensor_x: f32,
    sensor_y: f32,
    sensor_z: f32,
    projector_x: f32,
    projector_y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct RowDoc {
    c0: f64,
    c1: f64,
    c2: f64,
    c3: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TransformDoc {
    row0: RowDoc,
    row1: RowDoc,
    row2: RowDoc,
    pair_count: usize,
    rms_error: f64,
}

/// On-disk form of a calibration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename = "Calibration")]
pub struct CalibrationDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transform: Option<TransformDoc>,
    #[serde(rename = "pair", default)]
    pairs: Vec<PairDoc>,
}

impl CalibrationDocument {
    pub fn new(pairs: &[PointPair], transform: Option<&CalibrationTransform>) -> Self {
        Self {
            transform: transform.map(|t| {
                let row = |r: &[f64; 4]| RowDoc {
                    c0: r[0],
                    c1: r[1],
                    c2: r[2],
                    c3: r[3],
                };
                TransformDoc {
                    row0: row(&t.rows[0]),
                    row1: row(&t.rows[1]),
                    row2: row(&t.rows[2]),
                    pair_count: t.pair_count,
                    rms_error: if t.rms_error.is_finite() { t.rms_error } else { -1.0 },
                }
            }),
            pairs: pairs
                .iter()
                .map(|p| PairDoc {
                    sensor_x: p.sensor.x,
                    sensor_y: p.sensor.y,
                    sensor_z: p.sensor.z,
                    projector_x: p.projector.x,
                    projector_y: p.projector.y,
                })
                .collect(),
        }
    }

    pub fn pairs(&self) -> Vec<PointPair> {
        self.pairs
            .iter()
            .map(|p| {
                PointPair::new(
                    Vec3::new(p.sensor_x, p.sensor_y, p.sensor_z),
                    Vec2::new(p.projector_x, p.projector_y),
                )
            })
            .collect()
    }

    pub fn transform(&self) -> Option<CalibrationTransform> {
        let t = self.transform.as_ref()?;
        let row = |r: &RowDoc| [r.c0, r.c1, r.c2, r.c3];
        Some(CalibrationTransform {
            rows: [row(&t.row0), row(&t.row1), row(&t.row2)],
            pair_count: t.pair_count,
            rms_error: t.rms_error,
        })
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        read_document(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        write_document(self, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Vec<PointPair>, CalibrationTransform) {
        let pairs = vec![
            PointPair::new(Vec3::new(-120.5, 33.0, 0.435), Vec2::new(160.0, 125.0)),
            PointPair::new(Vec3::new(80.25, -12.0, 0.44), Vec2::new(340.0, 275.0)),
        ];
        let transform = CalibrationTransform {
            rows: [
                [1.25, 0.5, 30.0, 400.0],
                [-0.125, 1.5, -20.0, 300.0],
                [0.0001, 0.0002, 0.3, 1.0],
            ],
            pair_count: 2,
            rms_error: 0.75,
        };
        (pairs, transform)
    }

    #[test]
    fn test_xml_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calibration.xml");
        let (pairs, transform) = sample();

        CalibrationDocument::new(&pairs, Some(&transform)).save(&path).unwrap();
        let loaded = CalibrationDocument::load(&path).unwrap();

        assert_eq!(loaded.pairs(), pairs);
        assert_eq!(loaded.transform(), Some(transform));
    }

    #[test]
    fn test_json_document_without_transform() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calibration.json");
        let (pairs, _) = sample();

        CalibrationDocument::new(&pairs, None).save(&path).unwrap();
        let loaded = CalibrationDocument::load(&path).unwrap();

        assert_eq!(loaded.pairs().len(), 2);
        assert!(loaded.transform().is_none());
    }

    #[test]
    fn test_garbage_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calibration.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(CalibrationDocument::load(&path).is_err());
    }
}
