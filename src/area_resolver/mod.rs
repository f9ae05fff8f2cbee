pub mod amap;
pub mod area_code_db;
pub mod baidu;
pub mod http;
pub mod nominatim;
pub mod polygon;

use std::sync::Arc;

use crate::config::{AreaInfoConfig, AreaSource};
use crate::error::{ConfigError, Provider, ResolveError};
use crate::route::{CoordinateSystem, GeoPoint, ResolvedPlace};
use amap::AmapGeocoder;
use baidu::BaiduGeocoder;
use http::{HttpClient, ReqwestClient};
use nominatim::NominatimGeocoder;
use polygon::PolygonAreaResolver;

/// Maps a point to the administrative area it lies in. Implementations are
/// shared between the pipeline and its prefetch workers.
pub trait AreaResolver: Send + Sync {
    fn name(&self) -> &str;

    /// `point` is in `system`; the resolver converts it to whatever datum it
    /// queries in.
    fn resolve(
        &self,
        point: GeoPoint,
        system: CoordinateSystem,
    ) -> Result<ResolvedPlace, ResolveError>;
}

pub fn build_resolver(config: &AreaInfoConfig) -> Result<Arc<dyn AreaResolver>, ConfigError> {
    build_resolver_with_client(config, None)
}

/// Same as `build_resolver` but with a caller supplied HTTP client for the
/// remote geocoders. `None` creates a default client when one is needed.
pub fn build_resolver_with_client(
    config: &AreaInfoConfig,
    client: Option<Arc<dyn HttpClient>>,
) -> Result<Arc<dyn AreaResolver>, ConfigError> {
    let source = config.area_source()?;
    let http_client = || -> Result<Arc<dyn HttpClient>, ConfigError> {
        match &client {
            Some(client) => Ok(client.clone()),
            None => Ok(Arc::new(ReqwestClient::new()?)),
        }
    };

    let resolver: Arc<dyn AreaResolver> = match source {
        AreaSource::Polygon => {
            let polygon = config
                .polygon
                .as_ref()
                .ok_or(ConfigError::MissingSection("polygon"))?;
            Arc::new(PolygonAreaResolver::from_config(polygon)?)
        }
        AreaSource::Nominatim => {
            let nominatim = config
                .nominatim
                .as_ref()
                .ok_or(ConfigError::MissingSection("nominatim"))?;
            if nominatim.url.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "nominatim.url",
                    reason: "must not be empty".to_string(),
                });
            }
            Arc::new(NominatimGeocoder::new(nominatim.clone(), http_client()?)?)
        }
        AreaSource::Amap => {
            let amap = config
                .amap
                .as_ref()
                .ok_or(ConfigError::MissingSection("amap"))?;
            if amap.key.trim().is_empty() {
                return Err(ConfigError::MissingCredential(Provider::Amap));
            }
            Arc::new(AmapGeocoder::new(amap.clone(), http_client()?)?)
        }
        AreaSource::Baidu => {
            let baidu = config
                .baidu
                .as_ref()
                .ok_or(ConfigError::MissingSection("baidu"))?;
            if baidu.ak.trim().is_empty() {
                return Err(ConfigError::MissingCredential(Provider::Baidu));
            }
            Arc::new(BaiduGeocoder::new(baidu.clone(), http_client()?)?)
        }
    };
    info!("area resolver: {}", resolver.name());
    Ok(resolver)
}

/// Keeps only the secondary-language values that differ from the primary
/// ones.
pub(crate) fn blank_if_same(secondary: String, primary: &str) -> String {
    if secondary == primary {
        String::new()
    } else {
        secondary
    }
}
