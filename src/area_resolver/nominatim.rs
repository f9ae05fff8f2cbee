use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::http::{lenient_string, HttpClient, ProviderSession};
use super::{blank_if_same, AreaResolver};
use crate::config::NominatimConfig;
use crate::coord_transform;
use crate::error::{ConfigError, Provider, ProviderError, ResolveError};
use crate::route::{
    AreaLabel, CoordinateSystem, GeoPoint, ResolvedPlace, RoadLabel, TranslatedPlace,
};

// zoom 17 is "major and minor streets"
const REVERSE_ZOOM: &str = "17";

#[derive(Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    features: Vec<Feature>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Deserialize)]
struct Feature {
    properties: FeatureProperties,
}

#[derive(Deserialize)]
struct FeatureProperties {
    geocoding: Geocoding,
}

#[derive(Deserialize)]
struct Geocoding {
    #[serde(default, deserialize_with = "lenient_string")]
    place_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    osm_type: String,
    #[serde(default, deserialize_with = "lenient_string")]
    name: String,
    #[serde(default)]
    admin: HashMap<String, String>,
}

impl Geocoding {
    fn admin_level(&self, level: u8) -> String {
        self.admin
            .get(&format!("level{level}"))
            .cloned()
            .unwrap_or_default()
    }

    fn area(&self) -> AreaLabel {
        AreaLabel {
            province: self.admin_level(4),
            city: self.admin_level(5),
            district: self.admin_level(6),
        }
    }

    fn town(&self) -> String {
        self.admin_level(8)
    }

    fn road_name(&self) -> &str {
        if self.osm_type == "way" {
            &self.name
        } else {
            ""
        }
    }
}

#[derive(Deserialize)]
struct DetailsResponse {
    #[serde(default)]
    names: HashMap<String, Value>,
}

/// Reverse geocoding against a Nominatim server (the public instance or a
/// self-hosted one). Queries in WGS84.
pub struct NominatimGeocoder {
    config: NominatimConfig,
    session: ProviderSession,
}

impl NominatimGeocoder {
    pub fn new(
        config: NominatimConfig,
        client: Arc<dyn HttpClient>,
    ) -> Result<NominatimGeocoder, ConfigError> {
        let session = ProviderSession::new(
            Provider::Nominatim,
            client,
            "nominatim.requests_per_second",
            config.requests_per_second,
        )?;
        Ok(NominatimGeocoder { config, session })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.url.trim_end_matches('/'), path)
    }

    fn reverse(&self, point: GeoPoint, language: &str) -> Result<Option<Geocoding>, ProviderError> {
        let query = [
            ("format", "geocodejson".to_string()),
            ("lat", point.latitude.to_string()),
            ("lon", point.longitude.to_string()),
            ("layer", "address".to_string()),
            ("extratags", "1".to_string()),
            ("zoom", REVERSE_ZOOM.to_string()),
            ("accept-language", language.to_string()),
        ];
        let (response, body): (ReverseResponse, String) =
            self.session.get_json(&self.endpoint("reverse"), &query)?;
        if let Some(error) = response.error {
            // "Unable to geocode" is how nominatim says there is nothing here
            debug!("nominatim reverse error {} for {:?}", error, point);
            if body.contains("Unable to geocode") {
                return Ok(None);
            }
            return Err(ProviderError::status(
                Provider::Nominatim,
                error.to_string(),
                body,
            ));
        }
        Ok(response
            .features
            .into_iter()
            .next()
            .map(|feature| feature.properties.geocoding))
    }

    // Road refs like "G4;S7" live on the details endpoint only.
    fn road_codes(&self, place_id: &str) -> Result<String, ProviderError> {
        let query = [
            ("place_id", place_id.to_string()),
            ("format", "json".to_string()),
        ];
        let (details, _): (DetailsResponse, String) =
            self.session.get_json(&self.endpoint("details"), &query)?;
        Ok(match details.names.get("ref") {
            Some(Value::String(refs)) => refs
                .split(';')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .collect::<Vec<_>>()
                .join(","),
            _ => String::new(),
        })
    }
}

impl AreaResolver for NominatimGeocoder {
    fn name(&self) -> &str {
        "nominatim"
    }

    fn resolve(
        &self,
        point: GeoPoint,
        system: CoordinateSystem,
    ) -> Result<ResolvedPlace, ResolveError> {
        let query = coord_transform::transform(point, system, CoordinateSystem::Wgs84);
        let primary = self
            .reverse(query, &self.config.language)?
            .ok_or_else(|| {
                ResolveError::unresolved(point.longitude, point.latitude, "no address found")
            })?;
        let area = primary.area();
        if area.is_empty() {
            return Err(ResolveError::unresolved(
                point.longitude,
                point.latitude,
                "address has no administrative levels",
            ));
        }

        let road_name = primary.road_name();
        let codes = if road_name.is_empty() || primary.place_id.is_empty() {
            String::new()
        } else {
            self.road_codes(&primary.place_id)?
        };

        let translated = if self.config.bilingual {
            let secondary = self.reverse(query, &self.config.secondary_language)?;
            secondary.map(|secondary| TranslatedPlace {
                area: AreaLabel {
                    province: blank_if_same(secondary.admin_level(4), &area.province),
                    city: blank_if_same(secondary.admin_level(5), &area.city),
                    district: blank_if_same(secondary.admin_level(6), &area.district),
                },
                town: blank_if_same(secondary.town(), &primary.town()),
                road_name: blank_if_same(secondary.road_name().to_string(), road_name),
            })
        } else {
            None
        };

        Ok(ResolvedPlace {
            road: RoadLabel::from_parts(&codes, road_name),
            town: primary.town(),
            area,
            translated,
        })
    }
}
