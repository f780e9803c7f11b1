use std::cmp::Ordering;

use crate::metric::{radius_to_chord, MAX_RADIUS_KM};
use crate::{Error, GeoPoint, Id, Result, Scalar};

/// A provider found by a query together with its chord distance to the target.
#[derive(Clone, Copy, Debug)]
pub struct Neighbour {
    provider: Id,
    dist: Scalar,
}

impl Neighbour {
    pub(crate) fn new(provider: Id, dist: Scalar) -> Self {
        Self { provider, dist }
    }

    /// Returns the id of the provider.
    pub fn provider(&self) -> Id {
        self.provider
    }

    /// Returns the chord distance from the query point to the provider.
    pub fn dist(&self) -> Scalar {
        self.dist
    }
}

// Ascending distance, ties broken by ascending provider id.
impl Ord for Neighbour {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist
            .total_cmp(&other.dist)
            .then_with(|| self.provider.cmp(&other.provider))
    }
}

impl PartialOrd for Neighbour {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Neighbour {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Neighbour {}

/// Providers found for one query point, ordered by ascending distance and then by id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryResult {
    neighbours: Vec<Neighbour>,
}

impl QueryResult {
    /// Sorts `neighbours` into result order.
    pub(crate) fn from_unsorted(mut neighbours: Vec<Neighbour>) -> Self {
        neighbours.sort_unstable();
        Self { neighbours }
    }

    /// Returns the neighbours in result order.
    pub fn neighbours(&self) -> &[Neighbour] {
        &self.neighbours
    }

    /// Returns the provider ids in result order.
    pub fn provider_ids(&self) -> Vec<Id> {
        self.neighbours.iter().map(Neighbour::provider).collect()
    }

    /// Returns the number of neighbours.
    pub fn len(&self) -> usize {
        self.neighbours.len()
    }

    /// Returns `true` if nothing was found.
    pub fn is_empty(&self) -> bool {
        self.neighbours.is_empty()
    }

    /// Consumes ```self``` and returns the neighbours.
    pub fn take(self) -> Vec<Neighbour> {
        self.neighbours
    }
}

impl<'a> IntoIterator for &'a QueryResult {
    type Item = &'a Neighbour;
    type IntoIter = std::slice::Iter<'a, Neighbour>;

    fn into_iter(self) -> Self::IntoIter {
        self.neighbours.iter()
    }
}

/// A query issued for every customer of a run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Query {
    /// The `k` nearest providers.
    Nearest(usize),
    /// Every provider within a great-circle radius.
    WithinRadius {
        /// Radius in kilometers, as requested.
        km: Scalar,
        /// Equivalent chord threshold on the unit sphere.
        chord: Scalar,
    },
}

impl Query {
    /// A query for the `k` nearest providers.
    pub fn nearest(k: usize) -> Self {
        Query::Nearest(k)
    }

    /// A query for the `k` nearest providers where `k` comes from an untyped source.
    pub fn nearest_checked(k: i64) -> Result<Self> {
        if k < 0 {
            return Err(Error::NegativeCount(k));
        }

        Ok(Query::Nearest(k as usize))
    }

    /// A query for every provider within `km` kilometers. The chord threshold is derived here,
    /// once, rather than per comparison.
    pub fn within_km(km: Scalar) -> Result<Self> {
        if !km.is_finite() || km < 0. || km > MAX_RADIUS_KM {
            return Err(Error::InvalidRadius(km));
        }

        Ok(Query::WithinRadius {
            km,
            chord: radius_to_chord(km),
        })
    }

    /// Checks a query that may have been built without going through the constructors.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Query::Nearest(_) => Ok(()),
            Query::WithinRadius { chord, .. } => check_threshold(chord),
        }
    }

    /// Runs the query against `index` for a single target point.
    pub fn run<I>(&self, index: &I, target: &GeoPoint) -> Result<QueryResult>
    where
        I: ProximityIndex + ?Sized,
    {
        match *self {
            Query::Nearest(k) => Ok(index.k_nearest(target, k)),
            Query::WithinRadius { chord, .. } => index.within_radius(target, chord),
        }
    }
}

/// Answers nearest and radius queries over a fixed set of providers.
///
/// Implementations are immutable once built and may be shared between threads freely.
pub trait ProximityIndex {
    /// Returns the number of indexed providers.
    fn len(&self) -> usize;

    /// Returns `true` if no provider is indexed.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the `min(k, len)` providers closest to `target`.
    fn k_nearest(&self, target: &GeoPoint, k: usize) -> QueryResult;

    /// Returns every provider whose chord distance to `target` is at most `chord`.
    fn within_radius(&self, target: &GeoPoint, chord: Scalar) -> Result<QueryResult>;
}

pub(crate) fn check_threshold(chord: Scalar) -> Result<()> {
    if !chord.is_finite() || chord < 0. {
        return Err(Error::InvalidChordThreshold(chord));
    }
    Ok(())
}
