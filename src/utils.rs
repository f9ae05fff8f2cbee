use crate::route::GeoPoint;

const EARTH_RADIUS: f64 = 6371000.0; // unit: meter

// https://en.wikipedia.org/wiki/Haversine_formula
pub fn haversine_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = lat2 - lat1;
    let d_lng = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS * h.sqrt().asin()
}

/// Surface distance combined with the elevation change. Missing elevation on
/// either side counts as flat.
pub fn distance_3d(a: GeoPoint, a_ele: Option<f64>, b: GeoPoint, b_ele: Option<f64>) -> f64 {
    let flat = haversine_distance(a, b);
    match (a_ele, b_ele) {
        (Some(a_ele), Some(b_ele)) => (flat * flat + (b_ele - a_ele).powi(2)).sqrt(),
        _ => flat,
    }
}

/// Initial bearing from `from` to `to` on a sphere, in degrees [0, 360).
pub fn initial_bearing(from: GeoPoint, to: GeoPoint) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lng = (to.longitude - from.longitude).to_radians();
    let x = lat2.cos() * d_lng.sin();
    let y = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lng.cos();
    (x.atan2(y).to_degrees() + 360.0) % 360.0
}
