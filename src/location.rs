use ndarray::{aview1, ArrayView1};

use crate::{Error, Result, Scalar};

/// Identifier of a customer or a provider.
pub type Id = u64;

/// A validated position on the Earth's surface, in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Location {
    lat: Scalar,
    lon: Scalar,
}

impl Location {
    /// Creates a location from a latitude in `[-90, 90]` and a longitude in `[-180, 180]`.
    ///
    /// Out-of-range or non-finite values are rejected, never clamped.
    pub fn new(lat: Scalar, lon: Scalar) -> Result<Self> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(Error::InvalidLatitude(lat));
        }

        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(Error::InvalidLongitude(lon));
        }

        Ok(Self { lat, lon })
    }

    /// For coordinates that are in range by construction.
    pub(crate) fn from_degrees(lat: Scalar, lon: Scalar) -> Self {
        debug_assert!((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon));
        Self { lat, lon }
    }

    /// Returns the latitude in degrees.
    pub fn lat(&self) -> Scalar {
        self.lat
    }

    /// Returns the longitude in degrees.
    pub fn lon(&self) -> Scalar {
        self.lon
    }
}

/// A location projected onto the unit sphere.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoPoint {
    coords: [Scalar; 3],
}

impl GeoPoint {
    /// Returns the coordinate along `axis` (0 = x, 1 = y, 2 = z).
    #[inline(always)]
    pub fn coord(&self, axis: usize) -> Scalar {
        self.coords[axis]
    }

    /// Returns the cartesian coordinates `[x, y, z]`.
    pub fn coords(&self) -> [Scalar; 3] {
        self.coords
    }

    /// Returns an array view over the coordinates.
    #[inline(always)]
    pub fn view(&self) -> ArrayView1<'_, Scalar> {
        aview1(&self.coords)
    }

    /// Euclidean norm of the point; `1` up to rounding for every projected location.
    pub fn norm(&self) -> Scalar {
        let v = self.view();
        v.dot(&v).sqrt()
    }
}

impl From<Location> for GeoPoint {
    fn from(location: Location) -> Self {
        project(&location)
    }
}

/// Projects a location onto the unit sphere.
pub fn project(location: &Location) -> GeoPoint {
    let lat = location.lat.to_radians();
    let lon = location.lon.to_radians();
    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();

    GeoPoint {
        coords: [cos_lat * cos_lon, cos_lat * sin_lon, sin_lat],
    }
}

/// A customer asking for nearby providers. Identity is the id alone.
#[derive(Clone, Debug)]
pub struct Customer {
    id: Id,
    location: Location,
}

impl Customer {
    /// Creates a new customer.
    pub fn new(id: Id, location: Location) -> Self {
        Self { id, location }
    }

    /// Returns the id of the customer.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Returns the location of the customer.
    pub fn location(&self) -> &Location {
        &self.location
    }
}

impl PartialEq for Customer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Customer {}

/// A provider that customers are matched against.
#[derive(Clone, Debug, PartialEq)]
pub struct Provider {
    id: Id,
    location: Location,
    category: Option<String>,
    dedupe_key: Option<String>,
}

impl Provider {
    /// Creates a provider without category or deduplication key.
    pub fn new(id: Id, location: Location) -> Self {
        Self {
            id,
            location,
            category: None,
            dedupe_key: None,
        }
    }

    /// Creates a provider with its optional labels.
    pub fn with_labels(
        id: Id,
        location: Location,
        category: Option<String>,
        dedupe_key: Option<String>,
    ) -> Self {
        Self {
            id,
            location,
            category,
            dedupe_key,
        }
    }

    /// Returns the id of the provider.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Returns the location of the provider.
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Returns the category label, if any.
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    /// Returns the deduplication key, if any. Opaque to this crate.
    pub fn dedupe_key(&self) -> Option<&str> {
        self.dedupe_key.as_deref()
    }

    pub(crate) fn entry(&self) -> (Id, GeoPoint) {
        (self.id, project(&self.location))
    }
}
