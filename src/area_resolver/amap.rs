use serde::Deserialize;
use std::sync::Arc;

use super::http::{lenient_f64, lenient_string, nearest_road_names, HttpClient, ProviderSession};
use super::AreaResolver;
use crate::config::AmapConfig;
use crate::coord_transform;
use crate::error::{ConfigError, Provider, ProviderError, ResolveError};
use crate::route::{AreaLabel, CoordinateSystem, GeoPoint, ResolvedPlace, RoadLabel};

// POI type 180000 is "road furniture", which makes the nearby roads list
// come back populated.
const ROAD_POI_TYPE: &str = "180000";
const SEARCH_RADIUS_M: &str = "500";

#[derive(Deserialize)]
struct RegeoResponse {
    #[serde(default, deserialize_with = "lenient_string")]
    status: String,
    #[serde(default, deserialize_with = "lenient_string")]
    infocode: String,
    #[serde(default)]
    regeocode: Option<Regeocode>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Regeocode {
    #[serde(default)]
    address_component: AddressComponent,
    #[serde(default)]
    roads: Vec<Road>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct AddressComponent {
    #[serde(default, deserialize_with = "lenient_string")]
    province: String,
    #[serde(default, deserialize_with = "lenient_string")]
    city: String,
    #[serde(default, deserialize_with = "lenient_string")]
    district: String,
    #[serde(default, deserialize_with = "lenient_string")]
    township: String,
    #[serde(default)]
    street_number: StreetNumber,
}

#[derive(Deserialize, Default)]
struct StreetNumber {
    #[serde(default, deserialize_with = "lenient_string")]
    street: String,
}

#[derive(Deserialize)]
struct Road {
    #[serde(default, deserialize_with = "lenient_string")]
    name: String,
    #[serde(default = "unknown_distance", deserialize_with = "lenient_f64")]
    distance: f64,
}

fn unknown_distance() -> f64 {
    f64::NAN
}

/// AMap (Gaode) web service reverse geocoding. AMap works in GCJ02.
pub struct AmapGeocoder {
    config: AmapConfig,
    session: ProviderSession,
}

impl AmapGeocoder {
    pub fn new(
        config: AmapConfig,
        client: Arc<dyn HttpClient>,
    ) -> Result<AmapGeocoder, ConfigError> {
        let session = ProviderSession::new(
            Provider::Amap,
            client,
            "amap.requests_per_second",
            config.requests_per_second,
        )?;
        Ok(AmapGeocoder { config, session })
    }
}

impl AreaResolver for AmapGeocoder {
    fn name(&self) -> &str {
        "amap"
    }

    fn resolve(
        &self,
        point: GeoPoint,
        system: CoordinateSystem,
    ) -> Result<ResolvedPlace, ResolveError> {
        let gcj = coord_transform::transform(point, system, CoordinateSystem::Gcj02);
        let query = [
            ("key", self.config.key.clone()),
            ("location", format!("{:.6},{:.6}", gcj.longitude, gcj.latitude)),
            ("poitype", ROAD_POI_TYPE.to_string()),
            ("radius", SEARCH_RADIUS_M.to_string()),
            ("extensions", "all".to_string()),
        ];
        let (response, body): (RegeoResponse, String) =
            self.session.get_json(&self.config.url, &query)?;
        if response.status != "1" || response.infocode != "10000" {
            return Err(ProviderError::status(
                Provider::Amap,
                format!("{}/{}", response.status, response.infocode),
                body,
            )
            .into());
        }
        let regeocode = response.regeocode.ok_or_else(|| {
            ProviderError::parse(Provider::Amap, "missing regeocode", body.clone())
        })?;

        let component = regeocode.address_component;
        if component.province.is_empty() {
            return Err(ResolveError::unresolved(
                point.longitude,
                point.latitude,
                "no province in address",
            ));
        }
        let road_name = if component.street_number.street.is_empty() {
            nearest_road_names(regeocode.roads.iter().map(|r| (r.name.as_str(), r.distance)))
        } else {
            component.street_number.street
        };

        Ok(ResolvedPlace {
            area: AreaLabel {
                province: component.province,
                city: component.city,
                district: component.district,
            },
            road: RoadLabel::from_parts("", &road_name),
            town: component.township,
            translated: None,
        })
    }
}
