//! Coordinate Reference System handling

pub mod utm;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    wkt: Option<String>,
    epsg: Option<u32>,
}

impl CRS {
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
        }
    }

    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// WGS84 / UTM for the given zone and hemisphere (EPSG:326xx / 327xx)
    pub fn utm(zone: u32, north: bool) -> Self {
        Self::from_epsg(if north { 32600 + zone } else { 32700 + zone })
    }

    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Whether coordinates are longitude/latitude degrees.
    ///
    /// Recognizes EPSG geographic 2D codes (4000–4999) and WKT `GEOGCS`
    /// definitions without a projection.
    pub fn is_geographic(&self) -> bool {
        if let Some(code) = self.epsg {
            return (4000..5000).contains(&code);
        }
        self.wkt
            .as_deref()
            .is_some_and(|wkt| wkt.trim_start().starts_with("GEOGCS") && !wkt.contains("PROJCS"))
    }

    /// UTM zone and hemisphere when this is a WGS84 / UTM CRS
    pub fn utm_zone(&self) -> Option<(u32, bool)> {
        self.epsg.and_then(utm::parse_utm_epsg)
    }

    /// Whether two CRS are equivalent (EPSG codes first, then WKT text)
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }
        false
    }

    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(wkt) = &self.wkt {
            let head: String = wkt.chars().take(50).collect();
            return format!("WKT:{}", head);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::from_epsg(4326);
        assert_eq!(crs.epsg(), Some(4326));
        assert_eq!(crs.identifier(), "EPSG:4326");
        assert!(crs.is_geographic());
    }

    #[test]
    fn test_crs_equivalence() {
        assert!(CRS::from_epsg(4326).is_equivalent(&CRS::wgs84()));
        assert!(!CRS::wgs84().is_equivalent(&CRS::utm(18, true)));
    }

    #[test]
    fn test_utm_crs() {
        let crs = CRS::utm(18, true);
        assert_eq!(crs.epsg(), Some(32618));
        assert_eq!(crs.utm_zone(), Some((18, true)));
        assert!(!crs.is_geographic());
        assert_eq!(CRS::utm(18, false).utm_zone(), Some((18, false)));
    }

    #[test]
    fn test_wkt_geographic() {
        let geog = CRS::from_wkt("GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\"]]");
        assert!(geog.is_geographic());
        let proj = CRS::from_wkt("PROJCS[\"MAGNA-SIRGAS / Origen-Nacional\",GEOGCS[\"MAGNA-SIRGAS\"]]");
        assert!(!proj.is_geographic());
    }
}
