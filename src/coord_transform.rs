use std::f64::consts::PI;

use crate::route::{CoordinateSystem, GeoPoint};

// Krasovsky 1940, the ellipsoid the GCJ-02 offset is defined on.
const SEMI_MAJOR_AXIS: f64 = 6378245.0;
const ECCENTRICITY_SQUARED: f64 = 0.006_693_421_622_965_943;
const BD_FACTOR: f64 = PI * 3000.0 / 180.0;

// Inverse directions have no exact closed form. The closed-form estimate is
// off by up to a few meters, so it gets corrected against the forward
// formula until the residual is below this (degrees).
const INVERSE_TOLERANCE: f64 = 1e-10;
const INVERSE_MAX_ITERATIONS: usize = 10;

/// Converts `point` from `from` to `to`. WGS84 <-> BD09 goes through GCJ02.
/// No China bounds check is done here, see `is_outside_china`.
pub fn transform(point: GeoPoint, from: CoordinateSystem, to: CoordinateSystem) -> GeoPoint {
    use CoordinateSystem::*;
    match (from, to) {
        (Wgs84, Wgs84) | (Gcj02, Gcj02) | (Bd09, Bd09) => point,
        (Wgs84, Gcj02) => wgs84_to_gcj02(point),
        (Gcj02, Wgs84) => gcj02_to_wgs84(point),
        (Gcj02, Bd09) => gcj02_to_bd09(point),
        (Bd09, Gcj02) => bd09_to_gcj02(point),
        (Wgs84, Bd09) => gcj02_to_bd09(wgs84_to_gcj02(point)),
        (Bd09, Wgs84) => gcj02_to_wgs84(bd09_to_gcj02(point)),
    }
}

/// Rough mainland China bounding box. Callers that do not want to offset
/// foreign points check this before calling `transform`.
pub fn is_outside_china(point: GeoPoint) -> bool {
    !(72.004..=137.8347).contains(&point.longitude) || !(0.8293..=55.8271).contains(&point.latitude)
}

fn offset_latitude(x: f64, y: f64) -> f64 {
    let mut ret = -100.0 + 2.0 * x + 3.0 * y + 0.2 * y * y + 0.1 * x * y + 0.2 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (y * PI).sin() + 40.0 * (y / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (160.0 * (y / 12.0 * PI).sin() + 320.0 * (y * PI / 30.0).sin()) * 2.0 / 3.0;
    ret
}

fn offset_longitude(x: f64, y: f64) -> f64 {
    let mut ret = 300.0 + x + 2.0 * y + 0.1 * x * x + 0.1 * x * y + 0.1 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (x * PI).sin() + 40.0 * (x / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (150.0 * (x / 12.0 * PI).sin() + 300.0 * (x / 30.0 * PI).sin()) * 2.0 / 3.0;
    ret
}

// (d_lng, d_lat) in degrees that GCJ-02 adds at this point.
fn gcj_delta(lng: f64, lat: f64) -> (f64, f64) {
    let d_lat = offset_latitude(lng - 105.0, lat - 35.0);
    let d_lng = offset_longitude(lng - 105.0, lat - 35.0);
    let rad_lat = lat / 180.0 * PI;
    let magic = 1.0 - ECCENTRICITY_SQUARED * rad_lat.sin() * rad_lat.sin();
    let sqrt_magic = magic.sqrt();
    let d_lat = (d_lat * 180.0)
        / ((SEMI_MAJOR_AXIS * (1.0 - ECCENTRICITY_SQUARED)) / (magic * sqrt_magic) * PI);
    let d_lng = (d_lng * 180.0) / (SEMI_MAJOR_AXIS / sqrt_magic * rad_lat.cos() * PI);
    (d_lng, d_lat)
}

fn wgs84_to_gcj02(p: GeoPoint) -> GeoPoint {
    let (d_lng, d_lat) = gcj_delta(p.longitude, p.latitude);
    GeoPoint::new(p.longitude + d_lng, p.latitude + d_lat)
}

fn gcj02_to_wgs84(p: GeoPoint) -> GeoPoint {
    let (d_lng, d_lat) = gcj_delta(p.longitude, p.latitude);
    let estimate = GeoPoint::new(p.longitude - d_lng, p.latitude - d_lat);
    refine_inverse(estimate, p, wgs84_to_gcj02)
}

fn gcj02_to_bd09(p: GeoPoint) -> GeoPoint {
    let (x, y) = (p.longitude, p.latitude);
    let z = (x * x + y * y).sqrt() + 0.00002 * (y * BD_FACTOR).sin();
    let theta = y.atan2(x) + 0.000003 * (x * BD_FACTOR).cos();
    GeoPoint::new(z * theta.cos() + 0.0065, z * theta.sin() + 0.006)
}

fn bd09_to_gcj02(p: GeoPoint) -> GeoPoint {
    let x = p.longitude - 0.0065;
    let y = p.latitude - 0.006;
    let z = (x * x + y * y).sqrt() - 0.00002 * (y * BD_FACTOR).sin();
    let theta = y.atan2(x) - 0.000003 * (x * BD_FACTOR).cos();
    let estimate = GeoPoint::new(z * theta.cos(), z * theta.sin());
    refine_inverse(estimate, p, gcj02_to_bd09)
}

// Both offsets are close to a pure translation, so plain fixed-point
// correction converges in two or three steps.
fn refine_inverse(
    mut estimate: GeoPoint,
    target: GeoPoint,
    forward: fn(GeoPoint) -> GeoPoint,
) -> GeoPoint {
    for _ in 0..INVERSE_MAX_ITERATIONS {
        let projected = forward(estimate);
        let d_lng = projected.longitude - target.longitude;
        let d_lat = projected.latitude - target.latitude;
        estimate.longitude -= d_lng;
        estimate.latitude -= d_lat;
        if d_lng.abs() < INVERSE_TOLERANCE && d_lat.abs() < INVERSE_TOLERANCE {
            break;
        }
    }
    estimate
}
