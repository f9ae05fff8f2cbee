use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::str::FromStr;
use strum_macros::{Display, EnumString};

use crate::error::TransformError;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display, EnumString, Deserialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateSystem {
    Wgs84,
    Gcj02,
    Bd09,
}

impl CoordinateSystem {
    pub fn parse(name: &str) -> Result<Self, TransformError> {
        Self::from_str(name.trim())
            .map_err(|_| TransformError::UnknownCoordinateSystem(name.to_string()))
    }
}

// A GeoPoint on its own says nothing about its datum. Anything that stores one
// keeps the `CoordinateSystem` next to it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        GeoPoint {
            longitude,
            latitude,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct AreaLabel {
    pub province: String,
    pub city: String,
    pub district: String,
}

impl AreaLabel {
    pub fn new(province: &str, city: &str, district: &str) -> Self {
        AreaLabel {
            province: province.to_string(),
            city: city.to_string(),
            district: district.to_string(),
        }
    }

    /// Unresolved, as opposed to resolved to something.
    pub fn is_empty(&self) -> bool {
        self.province.is_empty() && self.city.is_empty() && self.district.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct RoadLabel {
    pub codes: Vec<String>,
    pub name: Option<String>,
}

impl RoadLabel {
    /// Builds a label from the comma separated code list used by the
    /// geocoders. Returns `None` when there is nothing to show.
    pub fn from_parts(codes: &str, name: &str) -> Option<Self> {
        let codes: Vec<String> = codes
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        let name = Some(name.trim())
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        if codes.is_empty() && name.is_none() {
            None
        } else {
            Some(RoadLabel { codes, name })
        }
    }
}

/// Labels in the secondary display language. Fields equal to the primary
/// language are left empty.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct TranslatedPlace {
    pub area: AreaLabel,
    pub town: String,
    pub road_name: String,
}

/// What an `AreaResolver` knows about a point.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ResolvedPlace {
    pub area: AreaLabel,
    pub road: Option<RoadLabel>,
    pub town: String,
    pub translated: Option<TranslatedPlace>,
}

impl ResolvedPlace {
    pub fn from_area(area: AreaLabel) -> Self {
        ResolvedPlace {
            area,
            ..Default::default()
        }
    }
}

/// A point as handed over by the track parser.
#[derive(Clone, Debug, PartialEq)]
pub struct RawPoint {
    pub index: usize,
    pub time: Option<DateTime<Utc>>,
    pub elapsed_sec: f64,
    pub longitude: f64,
    pub latitude: f64,
    pub elevation: Option<f64>,
    // course recorded by the device, if the track format has one
    pub course: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrackPoint {
    pub index: usize,
    pub time: Option<DateTime<Utc>>,
    pub elapsed_sec: f64,
    pub original: GeoPoint,
    pub original_system: CoordinateSystem,
    pub transformed: Option<(GeoPoint, CoordinateSystem)>,
    pub elevation: Option<f64>,
    // meters from the first point
    pub distance: f64,
    // degrees, 0..360
    pub course: f64,
    // m/s
    pub speed: f64,
    pub area: AreaLabel,
    pub road: Option<RoadLabel>,
    pub town: String,
    pub translated: Option<TranslatedPlace>,
    pub memo: Option<String>,
    // false when area and road are identical to the previous point
    pub label_changed: bool,
}

impl TrackPoint {
    pub fn from_raw(raw: &RawPoint, system: CoordinateSystem) -> Self {
        TrackPoint {
            index: raw.index,
            time: raw.time,
            elapsed_sec: raw.elapsed_sec,
            original: GeoPoint::new(raw.longitude, raw.latitude),
            original_system: system,
            transformed: None,
            elevation: raw.elevation,
            distance: 0.,
            course: 0.,
            speed: 0.,
            area: AreaLabel::default(),
            road: None,
            town: String::new(),
            translated: None,
            memo: None,
            label_changed: true,
        }
    }

    pub fn apply_place(&mut self, place: ResolvedPlace) {
        self.area = place.area;
        self.road = place.road;
        self.town = place.town;
        self.translated = place.translated;
    }

    pub fn same_labels_as(&self, other: &TrackPoint) -> bool {
        self.area == other.area && self.road == other.road
    }
}
