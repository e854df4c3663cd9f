//! Provider resolution
//!
//! Decides which providers to analyze for a point. Regional mobile carriers
//! come from an ordered bounding-box table (first match wins); broadband is
//! the full fixed brand list regardless of location.

use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;
use crate::models::ServiceType;

/// Sentinel provider selector meaning "resolve from location"
pub const AUTO_PROVIDER: &str = "auto";

/// Known broadband brands. Not geographically filtered.
pub const BROADBAND_BRANDS: &[&str] = &[
    "Xfinity",
    "Spectrum",
    "Cox",
    "Shaw",
    "Cogeco",
    "Videotron",
    "Starlink",
];

/// Carriers for one region plus the specialty/MVNO carrier appended to them
#[derive(Debug, Clone, Copy)]
pub struct CarrierRegion {
    pub code: &'static str,
    pub carriers: &'static [&'static str],
    pub specialty: &'static str,
}

pub const US_CARRIERS: CarrierRegion = CarrierRegion {
    code: "US",
    carriers: &["Verizon", "AT&T", "T-Mobile"],
    specialty: "Mint Mobile",
};

pub const CA_CARRIERS: CarrierRegion = CarrierRegion {
    code: "CA",
    carriers: &["Rogers", "Bell", "Telus"],
    specialty: "Freedom Mobile",
};

pub const GLOBAL_CARRIERS: CarrierRegion = CarrierRegion {
    code: "GLOBAL",
    carriers: &["Vodafone", "Orange", "Movistar"],
    specialty: "Lycamobile",
};

/// Ordered region boxes (lat_min, lat_max, lng_min, lng_max, region).
/// Canada precedes the US box because they overlap around the Great Lakes.
const REGION_BOXES: &[(f64, f64, f64, f64, &CarrierRegion)] = &[
    // Canada north of the 49th parallel
    (49.0, 83.5, -141.0, -52.0, &CA_CARRIERS),
    // Southern Ontario / Quebec / Maritimes
    (43.0, 49.0, -83.0, -64.0, &CA_CARRIERS),
    // Contiguous US
    (24.5, 49.5, -125.0, -66.0, &US_CARRIERS),
    // Alaska
    (51.0, 71.5, -170.0, -141.0, &US_CARRIERS),
    // Hawaii
    (18.5, 22.5, -160.5, -154.5, &US_CARRIERS),
];

/// Classify a point into a carrier region (coarse by intent)
pub fn region_for(location: &Coordinate) -> &'static CarrierRegion {
    REGION_BOXES
        .iter()
        .find(|(lat_min, lat_max, lng_min, lng_max, _)| {
            location.lat >= *lat_min
                && location.lat <= *lat_max
                && location.lng >= *lng_min
                && location.lng <= *lng_max
        })
        .map(|(_, _, _, _, region)| *region)
        .unwrap_or(&GLOBAL_CARRIERS)
}

/// Whether a provider name is one of the known broadband brands
pub fn is_broadband_brand(provider: &str) -> bool {
    let needle = provider.trim();
    BROADBAND_BRANDS
        .iter()
        .any(|brand| brand.eq_ignore_ascii_case(needle))
}

/// Every provider name the engine knows about, mobile first
pub fn known_providers() -> Vec<&'static str> {
    let mut all = Vec::new();
    for region in [&US_CARRIERS, &CA_CARRIERS, &GLOBAL_CARRIERS] {
        all.extend_from_slice(region.carriers);
        all.push(region.specialty);
    }
    all.extend_from_slice(BROADBAND_BRANDS);
    all
}

/// Providers selected for one request, split by service type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedProviders {
    pub mobile: Vec<String>,
    pub broadband: Vec<String>,
}

impl ResolvedProviders {
    /// (provider, service type) pairs in scoring order
    pub fn pairs(&self) -> Vec<(String, ServiceType)> {
        self.mobile
            .iter()
            .map(|p| (p.clone(), ServiceType::Mobile))
            .chain(self.broadband.iter().map(|p| (p.clone(), ServiceType::Broadband)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.mobile.len() + self.broadband.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Normalise an optional selector: blank and "auto" both mean auto mode
pub fn explicit_provider(selector: Option<&str>) -> Option<&str> {
    selector
        .map(str::trim)
        .filter(|p| !p.is_empty() && !p.eq_ignore_ascii_case(AUTO_PROVIDER))
}

/// Resolve the providers to analyze for `location`
pub fn resolve(location: &Coordinate, selector: Option<&str>) -> ResolvedProviders {
    if let Some(provider) = explicit_provider(selector) {
        return if is_broadband_brand(provider) {
            ResolvedProviders {
                mobile: Vec::new(),
                broadband: vec![provider.to_string()],
            }
        } else {
            ResolvedProviders {
                mobile: vec![provider.to_string()],
                broadband: Vec::new(),
            }
        };
    }

    let region = region_for(location);
    let mut mobile: Vec<String> = region.carriers.iter().map(|c| c.to_string()).collect();
    mobile.push(region.specialty.to_string());

    ResolvedProviders {
        mobile,
        broadband: BROADBAND_BRANDS.iter().map(|b| b.to_string()).collect(),
    }
}
