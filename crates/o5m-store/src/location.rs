/// Fixed-point coordinate scale: degrees × 1e7.
pub const COORDINATE_SCALE: f64 = 1e7;

/// Largest valid fixed-point longitude (180 degrees).
pub const MAX_LON: i32 = 1_800_000_000;

/// Largest valid fixed-point latitude (90 degrees).
pub const MAX_LAT: i32 = 900_000_000;

/// Sentinel raw coordinate marking an undefined location.
pub const COORD_UNDEFINED: i32 = i32::MIN;

/// A geographic position stored as a pair of 1e7 fixed-point i32 values.
///
/// Deleted nodes carry an undefined location; out-of-range values can be
/// represented (a decoder rejects them before they get here) and are
/// reported by [`is_valid`](Self::is_valid).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Location {
    lon: i32,
    lat: i32,
}

impl Location {
    /// Create a location from raw fixed-point coordinates.
    #[must_use]
    pub fn new(lon: i32, lat: i32) -> Self {
        Self { lon, lat }
    }

    /// The undefined location used for deleted nodes.
    #[must_use]
    pub fn undefined() -> Self {
        Self {
            lon: COORD_UNDEFINED,
            lat: COORD_UNDEFINED,
        }
    }

    /// Is this location defined at all?
    #[must_use]
    pub fn is_defined(self) -> bool {
        self.lon != COORD_UNDEFINED || self.lat != COORD_UNDEFINED
    }

    /// Is this location defined and inside the valid coordinate range?
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.is_defined()
            && (-MAX_LON..=MAX_LON).contains(&self.lon)
            && (-MAX_LAT..=MAX_LAT).contains(&self.lat)
    }

    /// Raw fixed-point longitude.
    #[must_use]
    pub fn lon(self) -> i32 {
        self.lon
    }

    /// Raw fixed-point latitude.
    #[must_use]
    pub fn lat(self) -> i32 {
        self.lat
    }

    /// Longitude in degrees.
    #[must_use]
    pub fn lon_degrees(self) -> f64 {
        f64::from(self.lon) / COORDINATE_SCALE
    }

    /// Latitude in degrees.
    #[must_use]
    pub fn lat_degrees(self) -> f64 {
        f64::from(self.lat) / COORDINATE_SCALE
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::undefined()
    }
}
