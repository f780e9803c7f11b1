use crate::query::check_threshold;
use crate::{
    chord_distance, GeoPoint, Id, Neighbour, Provider, ProximityIndex, QueryResult, Result,
    Scalar,
};

/// Exhaustive scanner over a flat list of projected providers.
///
/// Every query compares the target against every provider, which makes this the baseline for
/// benchmarks and the reference the k-d tree is checked against.
#[derive(Clone, Debug, Default)]
pub struct BruteForce {
    points: Vec<(Id, GeoPoint)>,
}

impl BruteForce {
    /// Projects `providers` onto the unit sphere and keeps them in input order.
    pub fn new(providers: &[Provider]) -> Self {
        Self::build(providers.iter().map(Provider::entry).collect())
    }

    /// Wraps already projected points.
    pub fn build(points: Vec<(Id, GeoPoint)>) -> Self {
        Self { points }
    }

    fn distances<'a>(&'a self, target: &'a GeoPoint) -> impl Iterator<Item = Neighbour> + 'a {
        self.points
            .iter()
            .map(move |(id, point)| Neighbour::new(*id, chord_distance(target, point)))
    }
}

impl ProximityIndex for BruteForce {
    fn len(&self) -> usize {
        self.points.len()
    }

    fn k_nearest(&self, target: &GeoPoint, k: usize) -> QueryResult {
        if k == 0 {
            return QueryResult::default();
        }

        let mut all: Vec<Neighbour> = self.distances(target).collect();
        if k < all.len() {
            // Partial sort: only the first k survive, ordered afterwards.
            all.select_nth_unstable(k - 1);
            all.truncate(k);
        }

        QueryResult::from_unsorted(all)
    }

    fn within_radius(&self, target: &GeoPoint, chord: Scalar) -> Result<QueryResult> {
        check_threshold(chord)?;

        let found = self
            .distances(target)
            .filter(|nb| nb.dist() <= chord)
            .collect();

        Ok(QueryResult::from_unsorted(found))
    }
}
