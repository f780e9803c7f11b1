use crate::{GeoPoint, Scalar};

use ndarray_stats::DeviationExt;

/// Mean radius of the Earth in kilometers.
pub const EARTH_RADIUS_KM: Scalar = 6371.;

/// Largest meaningful radius: half of the Earth's circumference.
pub(crate) const MAX_RADIUS_KM: Scalar = std::f64::consts::PI * EARTH_RADIUS_KM;

/// Straight-line distance between two points on the unit sphere, in `[0, 2]`.
///
/// The chord grows strictly with the great-circle angle between the points, so it ranks
/// neighbours exactly like the great-circle distance without any inverse trigonometry.
#[inline(always)]
pub fn chord_distance(a: &GeoPoint, b: &GeoPoint) -> Scalar {
    // Both views always hold three coordinates.
    a.view().l2_dist(&b.view()).unwrap()
}

/// Converts a great-circle radius in kilometers into the equivalent chord threshold.
///
/// Callers derive the threshold once per radius query rather than per comparison.
pub fn radius_to_chord(kilometers: Scalar) -> Scalar {
    let arc = kilometers / EARTH_RADIUS_KM;
    2. * (arc / 2.).sin()
}

/// Converts a chord length back into a great-circle distance in kilometers.
pub fn chord_to_radius(chord: Scalar) -> Scalar {
    let half = (chord / 2.).max(0.).min(1.);
    2. * half.asin() * EARTH_RADIUS_KM
}
