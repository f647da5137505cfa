//! Geographic points and the "stores near me" query.
//!
//! Coordinates follow GeoJSON order: longitude first, then latitude.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// Mean earth radius in meters (IUGG).
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Errors that can occur when building a [`GeoPoint`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GeoError {
    /// A coordinate was missing from the request.
    #[error("missing {0}")]
    Missing(&'static str),
    /// A coordinate did not parse as a finite number.
    #[error("{0} must be a number")]
    NotANumber(&'static str),
    /// Longitude outside -180..=180.
    #[error("longitude {0} is out of range")]
    LongitudeOutOfRange(f64),
    /// Latitude outside -90..=90.
    #[error("latitude {0} is out of range")]
    LatitudeOutOfRange(f64),
}

/// A validated WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "[f64; 2]")]
pub struct GeoPoint {
    longitude: f64,
    latitude: f64,
}

impl GeoPoint {
    /// Build a point from longitude and latitude.
    ///
    /// # Errors
    ///
    /// Rejects NaN, infinities and out-of-range values.
    pub fn new(longitude: f64, latitude: f64) -> Result<Self, GeoError> {
        if !longitude.is_finite() {
            return Err(GeoError::NotANumber("longitude"));
        }
        if !latitude.is_finite() {
            return Err(GeoError::NotANumber("latitude"));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(GeoError::LongitudeOutOfRange(longitude));
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(GeoError::LatitudeOutOfRange(latitude));
        }
        Ok(Self {
            longitude,
            latitude,
        })
    }

    /// Parse a point from raw query-string values.
    ///
    /// Malformed input is an error, never a NaN that reaches the database.
    ///
    /// # Errors
    ///
    /// Returns `GeoError::Missing` for absent or blank values and
    /// `GeoError::NotANumber` for values that are not finite numbers.
    pub fn parse(longitude: Option<&str>, latitude: Option<&str>) -> Result<Self, GeoError> {
        let lng = parse_coordinate(longitude, "lng")?;
        let lat = parse_coordinate(latitude, "lat")?;
        Self::new(lng, lat)
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    /// `[lng, lat]`, the GeoJSON coordinate pair.
    #[must_use]
    pub const fn coordinates(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }

    /// Great-circle distance in meters (haversine).
    #[must_use]
    pub fn distance_meters(&self, other: &Self) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lng = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_METERS * a.sqrt().min(1.0).asin()
    }
}

fn parse_coordinate(raw: Option<&str>, name: &'static str) -> Result<f64, GeoError> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty());
    let raw = raw.ok_or(GeoError::Missing(name))?;
    let value: f64 = raw.parse().map_err(|_| GeoError::NotANumber(name))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(GeoError::NotANumber(name))
    }
}

impl TryFrom<[f64; 2]> for GeoPoint {
    type Error = GeoError;

    fn try_from([lng, lat]: [f64; 2]) -> Result<Self, Self::Error> {
        Self::new(lng, lat)
    }
}

impl Serialize for GeoPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.coordinates().serialize(serializer)
    }
}

/// Where a store is: a GeoJSON `Point` plus a human address.
///
/// Serializes as `{"type": "Point", "coordinates": [lng, lat], "address": ...}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    /// The point on the map.
    pub point: GeoPoint,
    /// Street address as entered by the author.
    pub address: String,
}

impl Location {
    /// The only GeoJSON geometry stores use.
    pub const GEOMETRY_TYPE: &'static str = "Point";
}

impl Serialize for Location {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Location", 3)?;
        s.serialize_field("type", Self::GEOMETRY_TYPE)?;
        s.serialize_field("coordinates", &self.point)?;
        s.serialize_field("address", &self.address)?;
        s.end()
    }
}

/// "Nearest stores within a radius" query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearQuery {
    /// Search origin.
    pub origin: GeoPoint,
    /// Maximum distance from the origin in meters.
    pub max_distance_meters: f64,
    /// Maximum number of results.
    pub limit: i64,
}

impl NearQuery {
    /// Fixed search radius (10 km).
    pub const MAX_DISTANCE_METERS: f64 = 10_000.0;
    /// Fixed result cap.
    pub const LIMIT: i64 = 10;

    /// The standard map query around `origin`.
    #[must_use]
    pub const fn around(origin: GeoPoint) -> Self {
        Self {
            origin,
            max_distance_meters: Self::MAX_DISTANCE_METERS,
            limit: Self::LIMIT,
        }
    }

    /// Whether `point` falls inside the search radius.
    #[must_use]
    pub fn contains(&self, point: &GeoPoint) -> bool {
        self.origin.distance_meters(point) <= self.max_distance_meters
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let p = GeoPoint::parse(Some("-79.38"), Some(" 43.65 ")).unwrap();
        assert!((p.longitude() + 79.38).abs() < f64::EPSILON);
        assert!((p.latitude() - 43.65).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        assert_eq!(
            GeoPoint::parse(Some("abc"), Some("1")),
            Err(GeoError::NotANumber("lng"))
        );
        assert_eq!(
            GeoPoint::parse(Some("1"), Some("NaN")),
            Err(GeoError::NotANumber("lat"))
        );
        assert_eq!(
            GeoPoint::parse(Some("inf"), Some("1")),
            Err(GeoError::NotANumber("lng"))
        );
        assert_eq!(
            GeoPoint::parse(None, Some("1")),
            Err(GeoError::Missing("lng"))
        );
        assert_eq!(
            GeoPoint::parse(Some("1"), Some("")),
            Err(GeoError::Missing("lat"))
        );
    }

    #[test]
    fn test_new_rejects_out_of_range() {
        assert!(matches!(
            GeoPoint::new(181.0, 0.0),
            Err(GeoError::LongitudeOutOfRange(_))
        ));
        assert!(matches!(
            GeoPoint::new(0.0, -90.5),
            Err(GeoError::LatitudeOutOfRange(_))
        ));
    }

    #[test]
    fn test_distance_one_degree_latitude() {
        let a = GeoPoint::new(0.0, 0.0).unwrap();
        let b = GeoPoint::new(0.0, 1.0).unwrap();
        let d = a.distance_meters(&b);
        // One degree of arc on the mean sphere is ~111.195 km.
        assert!((d - 111_195.0).abs() < 10.0, "got {d}");
    }

    #[test]
    fn test_antipodes_are_half_a_circumference_apart() {
        // The radius the SQL `near` query binds, from the crate root.
        let radius = crate::EARTH_RADIUS_METERS;
        let a = GeoPoint::new(0.0, 0.0).unwrap();
        let b = GeoPoint::new(180.0, 0.0).unwrap();
        let d = a.distance_meters(&b);
        assert!((d - radius * std::f64::consts::PI).abs() < 1.0, "got {d}");
    }

    #[test]
    fn test_near_query_radius() {
        let query = NearQuery::around(GeoPoint::new(0.0, 0.0).unwrap());
        // ~5.6 km north of the origin
        let inside = GeoPoint::new(0.0, 0.05).unwrap();
        // ~11.1 km north of the origin
        let outside = GeoPoint::new(0.0, 0.1).unwrap();

        assert!(query.contains(&inside));
        assert!(!query.contains(&outside));
        assert_eq!(query.limit, 10);
    }

    #[test]
    fn test_location_serializes_as_geojson() {
        let location = Location {
            point: GeoPoint::new(-79.4, 43.6).unwrap(),
            address: "1 King St".to_owned(),
        };
        let json = serde_json::to_value(&location).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "Point",
                "coordinates": [-79.4, 43.6],
                "address": "1 King St"
            })
        );
    }

    #[test]
    fn test_deserialize_validates_range() {
        assert!(serde_json::from_str::<GeoPoint>("[10.0, 20.0]").is_ok());
        assert!(serde_json::from_str::<GeoPoint>("[10.0, 200.0]").is_err());
    }
}
