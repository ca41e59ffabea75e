// district_utils.rs
use crate::geocode_utils::{ComponentType, Geocoder};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;

/// Police-station name suffix ('서', as in 마포서).
pub const STATION_SUFFIX: char = '서';
/// Administrative-district name suffix ('구', as in 마포구).
pub const DISTRICT_SUFFIX: char = '구';

lazy_static! {
    // A contiguous run of Hangul syllables ending in the district suffix,
    // e.g. "강남구" out of "서울특별시 강남구 방배동".
    static ref DISTRICT_RE: Regex = Regex::new("[가-힣]+구").unwrap();
}

/// Outcome of one station lookup. `Unresolved` still carries a best-guess
/// fallback (the naive suffix rewrite, or the station name unchanged) so the
/// reconciler can proceed, but callers and tests can branch on the variant
/// instead of sniffing ambiguous strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistrictResolution {
    Resolved(String),
    Unresolved { fallback: String },
}

impl DistrictResolution {
    pub fn district(&self) -> &str {
        match self {
            DistrictResolution::Resolved(district) => district,
            DistrictResolution::Unresolved { fallback } => fallback,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, DistrictResolution::Resolved(_))
    }
}

/// Maps a police-station name to its containing district: a deterministic
/// suffix rewrite checked against the known-district set first, with the
/// geocoder as fallback for the stations whose rewrite is not a real
/// district (e.g. 방배서 sits in 강남구, not a "방배구").
pub struct DistrictResolver {
    geocoder: Arc<dyn Geocoder>,
    known_districts: HashSet<String>,
}

impl DistrictResolver {
    pub fn new(geocoder: Arc<dyn Geocoder>, known_districts: HashSet<String>) -> Self {
        DistrictResolver {
            geocoder,
            known_districts,
        }
    }

    /// Rewrites a station name to its candidate district by swapping the
    /// trailing '서' for '구'. Returns `None` when the name does not end in
    /// the station suffix.
    pub fn rewrite_suffix(station_name: &str) -> Option<String> {
        let stem = station_name.strip_suffix(STATION_SUFFIX)?;
        Some(format!("{}{}", stem, DISTRICT_SUFFIX))
    }

    /// Resolves a station name to a district. Best effort: this never fails;
    /// a station that defeats every lookup degrades to
    /// `Unresolved { fallback }` with a warning, and processing continues for
    /// the remaining stations.
    pub async fn station_to_district(&self, station_name: &str) -> DistrictResolution {
        if let Some(candidate) = Self::rewrite_suffix(station_name) {
            if self.known_districts.contains(&candidate) {
                return DistrictResolution::Resolved(candidate);
            }
            log::info!(
                "station '{}': rewrite '{}' is not a known district, querying the geocoder",
                station_name,
                candidate
            );
        }

        self.resolve_via_geocoder(station_name).await
    }

    async fn resolve_via_geocoder(&self, station_name: &str) -> DistrictResolution {
        let query = format!("{} 서울", station_name);

        let geocode = match self.geocoder.resolve(&query).await {
            Ok(result) => result,
            Err(e) => {
                // Per-station failures degrade to "no result"; only the
                // single lookup is lost, never the batch.
                log::warn!("geocode lookup failed for '{}': {}", station_name, e);
                None
            }
        };

        if let Some(geocode) = geocode {
            for component in geocode.address_components() {
                let district_level = component.types.contains(&ComponentType::SublocalityLevel1)
                    || component
                        .types
                        .contains(&ComponentType::AdministrativeAreaLevel2);
                if district_level && component.long_name.contains(DISTRICT_SUFFIX) {
                    return DistrictResolution::Resolved(component.long_name);
                }
            }

            if let Some(m) = DISTRICT_RE.find(&geocode.address) {
                return DistrictResolution::Resolved(m.as_str().to_string());
            }
        }

        log::warn!("no district could be resolved for station '{}'", station_name);
        let fallback =
            Self::rewrite_suffix(station_name).unwrap_or_else(|| station_name.to_string());
        DistrictResolution::Unresolved { fallback }
    }
}
