//! Least-squares sensor-to-projector transform.
//!
//! The transform is a 3x4 projective matrix `P` with `P[2][3] = 1`:
//!
//! ```text
//! u = (p00 x + p01 y + p02 z + p03) / (p20 x + p21 y + p22 z + 1)
//! v = (p10 x + p11 y + p12 z + p13) / (p20 x + p21 y + p22 z + 1)
//! ```
//!
//! Both point sets are normalized before the 11 unknowns are solved
//! with an SVD pseudo-inverse, so the solve succeeds for any non-empty set of
//! pairs. A unique solution needs at least six pairs that are not coplanar.

use glam::{Mat4, Vec2, Vec3, Vec4};
use nalgebra::{DMatrix, DVector, Matrix3, Matrix3x4, Matrix4, Vector4};

use super::CalibrationError;

/// One sensor/projector correspondence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointPair {
    /// Sensor point: x, y in camera space, z normalized depth
    pub sensor: Vec3,
    /// Projector pixel
    pub projector: Vec2,
}

impl PointPair {
    pub fn new(sensor: Vec3, projector: Vec2) -> Self {
        Self { sensor, projector }
    }
}

/// Solved projector transform.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationTransform {
    /// Row-major 3x4 projection
    pub rows: [[f64; 4]; 3],
    /// Number of pairs the solve used
    pub pair_count: usize,
    /// RMS reprojection error over those pairs, in projector pixels
    pub rms_error: f64,
}

impl CalibrationTransform {
    /// 4x4 matrix whose first two rows give the numerators and whose third row
    /// gives the homogeneous denominator.
    pub fn matrix(&self) -> Mat4 {
        let r = &self.rows;
        Mat4::from_cols(
            Vec4::new(r[0][0] as f32, r[1][0] as f32, r[2][0] as f32, 0.0),
            Vec4::new(r[0][1] as f32, r[1][1] as f32, r[2][1] as f32, 0.0),
            Vec4::new(r[0][2] as f32, r[1][2] as f32, r[2][2] as f32, 0.0),
            Vec4::new(r[0][3] as f32, r[1][3] as f32, r[2][3] as f32, 1.0),
        )
    }

    /// Projector pixel for a sensor point, `None` on the plane at infinity.
    pub fn project(&self, sensor: Vec3) -> Option<Vec2> {
        let (u, v) = project_rows(&self.rows, sensor)?;
        Some(Vec2::new(u as f32, v as f32))
    }
}

fn project_rows(rows: &[[f64; 4]; 3], p: Vec3) -> Option<(f64, f64)> {
    let h = [p.x as f64, p.y as f64, p.z as f64, 1.0];
    let dot = |row: &[f64; 4]| row.iter().zip(&h).map(|(a, b)| a * b).sum::<f64>();
    let w = dot(&rows[2]);
    if w.abs() < 1e-12 {
        return None;
    }
    Some((dot(&rows[0]) / w, dot(&rows[1]) / w))
}

/// Solves the projector transform from point pairs.
#[derive(Debug, Clone)]
pub struct ProjectionSolver {
    /// Singular values below `tolerance * largest` are treated as zero
    pub tolerance: f64,
}

impl Default for ProjectionSolver {
    fn default() -> Self {
        Self { tolerance: 1e-10 }
    }
}

impl ProjectionSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn solve(&self, pairs: &[PointPair]) -> Result<CalibrationTransform, CalibrationError> {
        if pairs.is_empty() {
            return Err(CalibrationError::Unsolvable("no point pairs acquired".to_string()));
        }

        let (world, t_world) = normalize_world(pairs);
        let (proj, t_proj) = normalize_projector(pairs);

        // Build A (2N x 11) and b (2N)
        let n = pairs.len();
        let mut a = DMatrix::<f64>::zeros(2 * n, 11);
        let mut b = DVector::<f64>::zeros(2 * n);
        for k in 0..n {
            let [x, y, z] = world[k];
            let [u, v] = proj[k];

            // [ x y z 1  0 0 0 0  -ux -uy -uz ] = u
            a[(2 * k, 0)] = x;
            a[(2 * k, 1)] = y;
            a[(2 * k, 2)] = z;
            a[(2 * k, 3)] = 1.0;
            a[(2 * k, 8)] = -u * x;
            a[(2 * k, 9)] = -u * y;
            a[(2 * k, 10)] = -u * z;
            b[2 * k] = u;

            // [ 0 0 0 0  x y z 1  -vx -vy -vz ] = v
            a[(2 * k + 1, 4)] = x;
            a[(2 * k + 1, 5)] = y;
            a[(2 * k + 1, 6)] = z;
            a[(2 * k + 1, 7)] = 1.0;
            a[(2 * k + 1, 8)] = -v * x;
            a[(2 * k + 1, 9)] = -v * y;
            a[(2 * k + 1, 10)] = -v * z;
            b[2 * k + 1] = v;
        }

        let svd = a.svd(true, true);
        let largest = svd.singular_values.max();
        if !(largest.is_finite() && largest > 0.0) {
            return Err(CalibrationError::Unsolvable("degenerate point pairs".to_string()));
        }
        let p = svd
            .solve(&b, largest * self.tolerance)
            .map_err(|e| CalibrationError::Unsolvable(e.to_string()))?;

        let pn = Matrix3x4::new(
            p[0], p[1], p[2], p[3], //
            p[4], p[5], p[6], p[7], //
            p[8], p[9], p[10], 1.0,
        );

        // Denormalize: P = Tp^-1 * Pn * Tw
        let tp_inv = t_proj
            .try_inverse()
            .ok_or_else(|| CalibrationError::Unsolvable("singular normalization".to_string()))?;
        let full = tp_inv * pn * t_world;
        let scale = full[(2, 3)];
        if !scale.is_finite() || scale.abs() < 1e-12 {
            return Err(CalibrationError::Unsolvable(
                "transform maps the sensor origin to infinity".to_string(),
            ));
        }
        let full = full / scale;

        let mut rows = [[0.0; 4]; 3];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, value) in row.iter_mut().enumerate() {
                *value = full[(r, c)];
            }
        }
        if rows.iter().flatten().any(|v| !v.is_finite()) {
            return Err(CalibrationError::Unsolvable("non-finite solution".to_string()));
        }

        let rms_error = rms_error(&rows, pairs);
        log::info!(
            "Calibration solved from {} point pairs, RMS error {:.3} px",
            pairs.len(),
            rms_error
        );

        Ok(CalibrationTransform {
            rows,
            pair_count: pairs.len(),
            rms_error,
        })
    }
}

fn rms_error(rows: &[[f64; 4]; 3], pairs: &[PointPair]) -> f64 {
    let mut sum = 0.0;
    for pair in pairs {
        match project_rows(rows, pair.sensor) {
            Some((u, v)) => {
                let du = u - pair.projector.x as f64;
                let dv = v - pair.projector.y as f64;
                sum += du * du + dv * dv;
            }
            None => return f64::INFINITY,
        }
    }
    (sum / pairs.len() as f64).sqrt()
}

/// Translate 3D points to their centroid and scale each axis to unit mean
/// deviation. Depth spans far less than x and y, so axes are scaled separately.
fn normalize_world(pairs: &[PointPair]) -> (Vec<[f64; 3]>, Matrix4<f64>) {
    let n = pairs.len() as f64;
    let coords = |p: &PointPair| [p.sensor.x as f64, p.sensor.y as f64, p.sensor.z as f64];

    let mut c = [0.0; 3];
    for p in pairs {
        for (acc, v) in c.iter_mut().zip(coords(p)) {
            *acc += v;
        }
    }
    c.iter_mut().for_each(|v| *v /= n);

    let mut dev = [0.0; 3];
    for p in pairs {
        for ((acc, v), centre) in dev.iter_mut().zip(coords(p)).zip(c) {
            *acc += (v - centre).abs();
        }
    }
    let s = dev.map(|d| {
        let d = d / n;
        if d > 1e-12 {
            1.0 / d
        } else {
            1.0
        }
    });

    let t = Matrix4::new(
        s[0], 0.0, 0.0, -s[0] * c[0], //
        0.0, s[1], 0.0, -s[1] * c[1], //
        0.0, 0.0, s[2], -s[2] * c[2], //
        0.0, 0.0, 0.0, 1.0,
    );
    let out = pairs
        .iter()
        .map(|p| {
            let [x, y, z] = coords(p);
            let v = t * Vector4::new(x, y, z, 1.0);
            [v[0], v[1], v[2]]
        })
        .collect();
    (out, t)
}

/// Translate 2D points to their centroid and scale to mean distance sqrt(2).
fn normalize_projector(pairs: &[PointPair]) -> (Vec<[f64; 2]>, Matrix3<f64>) {
    let n = pairs.len() as f64;
    let (mut cx, mut cy) = (0.0, 0.0);
    for p in pairs {
        cx += p.projector.x as f64;
        cy += p.projector.y as f64;
    }
    cx /= n;
    cy /= n;

    let mut mean_dist = 0.0;
    for p in pairs {
        let dx = p.projector.x as f64 - cx;
        let dy = p.projector.y as f64 - cy;
        mean_dist += (dx * dx + dy * dy).sqrt();
    }
    mean_dist /= n;
    let s = if mean_dist > 1e-12 {
        2.0_f64.sqrt() / mean_dist
    } else {
        1.0
    };

    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let out = pairs
        .iter()
        .map(|p| {
            [
                s * (p.projector.x as f64 - cx),
                s * (p.projector.y as f64 - cy),
            ]
        })
        .collect();
    (out, t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> [[f64; 4]; 3] {
        [
            [1.2, 0.05, 30.0, 400.0],
            [-0.03, 1.1, -20.0, 300.0],
            [0.0001, 0.0002, 0.3, 1.0],
        ]
    }

    fn pairs_from(rows: &[[f64; 4]; 3]) -> Vec<PointPair> {
        let mut pairs = Vec::new();
        for &z in &[0.40_f32, 0.45, 0.52] {
            for j in 0..3 {
                for i in 0..4 {
                    let sensor = Vec3::new(-150.0 + 100.0 * i as f32, -100.0 + 90.0 * j as f32, z);
                    let (u, v) = project_rows(rows, sensor).unwrap();
                    pairs.push(PointPair::new(sensor, Vec2::new(u as f32, v as f32)));
                }
            }
        }
        pairs
    }

    #[test]
    fn test_zero_pairs_rejected() {
        let err = ProjectionSolver::new().solve(&[]).unwrap_err();
        assert!(matches!(err, CalibrationError::Unsolvable(_)));
    }

    #[test]
    fn test_recovers_known_projection() {
        let rows = reference();
        let pairs = pairs_from(&rows);
        let transform = ProjectionSolver::new().solve(&pairs).unwrap();

        assert_eq!(transform.pair_count, 36);
        assert!(transform.rms_error < 0.05, "rms {}", transform.rms_error);

        // Held-out point
        let probe = Vec3::new(12.0, -33.0, 0.47);
        let (u, v) = project_rows(&rows, probe).unwrap();
        let projected = transform.project(probe).unwrap();
        assert!((projected.x as f64 - u).abs() < 0.1);
        assert!((projected.y as f64 - v).abs() < 0.1);
    }

    #[test]
    fn test_matrix_third_row_is_denominator() {
        let transform = CalibrationTransform {
            rows: reference(),
            pair_count: 0,
            rms_error: 0.0,
        };
        let p = Vec3::new(10.0, 20.0, 0.5);
        let s = transform.matrix() * p.extend(1.0);
        let projected = transform.project(p).unwrap();
        assert!((s.x / s.z - projected.x).abs() < 1e-2);
        assert!((s.y / s.z - projected.y).abs() < 1e-2);
    }

    #[test]
    fn test_single_pair_still_solves() {
        let pairs = vec![PointPair::new(Vec3::new(1.0, 2.0, 0.5), Vec2::new(100.0, 50.0))];
        let transform = ProjectionSolver::new().solve(&pairs).unwrap();
        let projected = transform.project(pairs[0].sensor).unwrap();
        assert!((projected.x - 100.0).abs() < 1e-2);
        assert!((projected.y - 50.0).abs() < 1e-2);
    }
}
