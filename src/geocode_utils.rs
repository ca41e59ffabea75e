// geocode_utils.rs
use crate::error_utils::SeoulError;
use async_trait::async_trait;
use lazy_static::lazy_static;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::env;
use std::sync::Arc;

const KAKAO_LOCAL_BASE_URL: &str = "https://dapi.kakao.com/v2/local";

/// Component classification mirroring the address levels the district
/// resolver searches: Seoul districts sit at the sub-locality /
/// administrative-area-level-2 position of a Kakao address string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    SublocalityLevel1,
    AdministrativeAreaLevel1,
    AdministrativeAreaLevel2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddressComponent {
    pub long_name: String,
    pub types: Vec<ComponentType>,
}

/// One geocoding hit: the formatted address plus coordinates of the first
/// document returned by the keyword search. Ephemeral: produced per call,
/// never persisted past the resolution step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodeResult {
    pub address: String,
    pub lat: f64,
    pub lng: f64,
}

impl GeocodeResult {
    /// Decomposes the formatted address into components by splitting on
    /// whitespace. Parts ending in '구' are tagged as
    /// sub-locality/administrative-area-level-2, parts ending in '시' or '도'
    /// as administrative-area-level-1; anything else is dropped.
    pub fn address_components(&self) -> Vec<AddressComponent> {
        let mut components = Vec::new();
        for part in self.address.split_whitespace() {
            if part.ends_with('구') {
                components.push(AddressComponent {
                    long_name: part.to_string(),
                    types: vec![
                        ComponentType::SublocalityLevel1,
                        ComponentType::AdministrativeAreaLevel2,
                    ],
                });
            } else if part.ends_with('시') || part.ends_with('도') {
                components.push(AddressComponent {
                    long_name: part.to_string(),
                    types: vec![ComponentType::AdministrativeAreaLevel1],
                });
            }
        }
        components
    }
}

/// The seam between the district resolver and the Kakao Local service.
/// `Ok(None)` is the "no result" outcome (the common case for malformed
/// queries) and must never abort a reconciliation pass.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn resolve(&self, query: &str) -> Result<Option<GeocodeResult>, SeoulError>;
}

struct SharedKakao {
    api_key: String,
    client: Client,
}

lazy_static! {
    // One underlying HTTP client and API key per process. The key is read
    // lazily on the first handle request and cached for the process lifetime,
    // so two `KakaoLocalClient` handles are interchangeable.
    static ref SHARED_KAKAO: Option<Arc<SharedKakao>> = {
        match env::var("KAKAO_REST_API_KEY").or_else(|_| env::var("KAKAO_MAP_API_KEY")) {
            Ok(api_key) => Some(Arc::new(SharedKakao {
                api_key,
                client: Client::new(),
            })),
            Err(_) => None,
        }
    };
}

/// Keyword-search client for the Kakao Local API.
#[derive(Clone)]
pub struct KakaoLocalClient {
    shared: Arc<SharedKakao>,
}

impl KakaoLocalClient {
    /// Returns a handle onto the process-wide client. Fails with
    /// `SeoulError::ConfigurationMissing` if neither `KAKAO_REST_API_KEY` nor
    /// `KAKAO_MAP_API_KEY` is set, raised here on first use rather than at
    /// process start.
    pub fn shared() -> Result<Self, SeoulError> {
        match SHARED_KAKAO.as_ref() {
            Some(shared) => Ok(KakaoLocalClient {
                shared: Arc::clone(shared),
            }),
            None => Err(SeoulError::ConfigurationMissing),
        }
    }
}

#[async_trait]
impl Geocoder for KakaoLocalClient {
    async fn resolve(&self, query: &str) -> Result<Option<GeocodeResult>, SeoulError> {
        let url = format!("{}/search/keyword.json", KAKAO_LOCAL_BASE_URL);

        let response = self
            .shared
            .client
            .get(&url)
            .header(
                "Authorization",
                format!("KakaoAK {}", self.shared.api_key),
            )
            .query(&[("query", query)])
            .send()
            .await
            .map_err(|e| SeoulError::Transient(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 403 {
            let message = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| {
                    body.get("message")
                        .and_then(|m| m.as_str())
                        .map(String::from)
                })
                .unwrap_or_else(|| "Forbidden".to_string());
            log::error!("Kakao Local API returned 403 for query '{}': {}", query, message);
            return Err(SeoulError::PermissionDenied(message));
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SeoulError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SeoulError::Transient(e.to_string()))?;

        Ok(parse_keyword_response(&body))
    }
}

/// Shapes the first document of a keyword-search response into a
/// `GeocodeResult`. The lot-number address is preferred, falling back to the
/// road address; coordinates arrive as strings and parse permissively to 0.0.
/// Returns `None` when the `documents` array is empty.
pub fn parse_keyword_response(body: &Value) -> Option<GeocodeResult> {
    let doc = body.get("documents")?.as_array()?.first()?;

    let address_name = doc
        .get("address_name")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let road_address_name = doc
        .get("road_address_name")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let address = if !address_name.is_empty() {
        address_name
    } else {
        road_address_name
    };

    let coordinate = |key: &str| {
        doc.get(key)
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0)
    };

    Some(GeocodeResult {
        address: address.to_string(),
        lat: coordinate("y"),
        lng: coordinate("x"),
    })
}
