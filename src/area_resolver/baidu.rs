use serde::Deserialize;
use std::sync::Arc;

use super::http::{lenient_f64, lenient_string, nearest_road_names, HttpClient, ProviderSession};
use super::{blank_if_same, AreaResolver};
use crate::config::BaiduConfig;
use crate::error::{ConfigError, Provider, ProviderError, ResolveError};
use crate::route::{
    AreaLabel, CoordinateSystem, GeoPoint, ResolvedPlace, RoadLabel, TranslatedPlace,
};

const PRIMARY_LANGUAGE: &str = "zh-CN";
const SECONDARY_LANGUAGE: &str = "en";

#[derive(Deserialize)]
struct ReverseResponse {
    // numeric on success, but error responses are not always consistent
    #[serde(default, deserialize_with = "lenient_string")]
    status: String,
    #[serde(default)]
    result: Option<ReverseResult>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReverseResult {
    #[serde(default)]
    address_component: AddressComponent,
    #[serde(default, rename = "business_info")]
    business_info: Vec<Business>,
}

#[derive(Deserialize, Default)]
struct AddressComponent {
    #[serde(default, deserialize_with = "lenient_string")]
    province: String,
    #[serde(default, deserialize_with = "lenient_string")]
    city: String,
    #[serde(default, deserialize_with = "lenient_string")]
    district: String,
    #[serde(default, deserialize_with = "lenient_string")]
    town: String,
    #[serde(default, deserialize_with = "lenient_string")]
    street: String,
}

#[derive(Deserialize)]
struct Business {
    #[serde(default, deserialize_with = "lenient_string")]
    name: String,
    #[serde(default = "unknown_distance", deserialize_with = "lenient_f64")]
    distance: f64,
}

fn unknown_distance() -> f64 {
    f64::NAN
}

struct Address {
    area: AreaLabel,
    town: String,
    road_name: String,
}

impl ReverseResult {
    fn into_address(self) -> Address {
        let component = self.address_component;
        let road_name = if component.street.is_empty() {
            nearest_road_names(self.business_info.iter().map(|b| (b.name.as_str(), b.distance)))
        } else {
            component.street
        };
        Address {
            area: AreaLabel {
                province: component.province,
                city: component.city,
                district: component.district,
            },
            town: component.town,
            road_name,
        }
    }
}

fn coord_type(system: CoordinateSystem) -> &'static str {
    match system {
        CoordinateSystem::Wgs84 => "wgs84ll",
        CoordinateSystem::Gcj02 => "gcj02ll",
        CoordinateSystem::Bd09 => "bd09ll",
    }
}

/// Baidu map reverse geocoding. Baidu accepts all three datums, so the point
/// is sent as is with its system in `coordtype`.
pub struct BaiduGeocoder {
    config: BaiduConfig,
    session: ProviderSession,
}

impl BaiduGeocoder {
    pub fn new(
        config: BaiduConfig,
        client: Arc<dyn HttpClient>,
    ) -> Result<BaiduGeocoder, ConfigError> {
        let session = ProviderSession::new(
            Provider::Baidu,
            client,
            "baidu.requests_per_second",
            config.requests_per_second,
        )?;
        Ok(BaiduGeocoder { config, session })
    }

    fn reverse(
        &self,
        point: GeoPoint,
        system: CoordinateSystem,
        language: &str,
    ) -> Result<Address, ProviderError> {
        let query = [
            ("ak", self.config.ak.clone()),
            ("sort_strategy", "distance".to_string()),
            ("output", "json".to_string()),
            ("coordtype", coord_type(system).to_string()),
            ("location", format!("{},{}", point.latitude, point.longitude)),
            ("poi_types", "道路".to_string()),
            ("language", language.to_string()),
        ];
        let (response, body): (ReverseResponse, String) =
            self.session.get_json(&self.config.url, &query)?;
        if response.status != "0" {
            return Err(ProviderError::status(Provider::Baidu, response.status, body));
        }
        match response.result {
            Some(result) => Ok(result.into_address()),
            None => Err(ProviderError::parse(Provider::Baidu, "missing result", body)),
        }
    }
}

impl AreaResolver for BaiduGeocoder {
    fn name(&self) -> &str {
        "baidu"
    }

    fn resolve(
        &self,
        point: GeoPoint,
        system: CoordinateSystem,
    ) -> Result<ResolvedPlace, ResolveError> {
        let primary = self.reverse(point, system, PRIMARY_LANGUAGE)?;
        if primary.area.province.is_empty() {
            return Err(ResolveError::unresolved(
                point.longitude,
                point.latitude,
                "no province in address",
            ));
        }

        let translated = if self.config.bilingual {
            let secondary = self.reverse(point, system, SECONDARY_LANGUAGE)?;
            Some(TranslatedPlace {
                area: AreaLabel {
                    province: blank_if_same(secondary.area.province, &primary.area.province),
                    city: blank_if_same(secondary.area.city, &primary.area.city),
                    district: blank_if_same(secondary.area.district, &primary.area.district),
                },
                town: blank_if_same(secondary.town, &primary.town),
                road_name: blank_if_same(secondary.road_name, &primary.road_name),
            })
        } else {
            None
        };

        Ok(ResolvedPlace {
            road: RoadLabel::from_parts("", &primary.road_name),
            area: primary.area,
            town: primary.town,
            translated,
        })
    }
}
