//! A library for answering proximity queries between customers and providers on the Earth's
//! surface. Locations are projected onto the unit sphere and queried either with a balanced
//! k-d tree or with an exhaustive scan, sequentially or across a worker pool.
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    broken_intra_doc_links
)]

type Scalar = f64;

mod error;
pub use error::{Error, Result};

mod location;
pub use location::{project, Customer, GeoPoint, Id, Location, Provider};

mod metric;
pub use metric::{chord_distance, chord_to_radius, radius_to_chord, EARTH_RADIUS_KM};

mod query;
pub use query::{Neighbour, ProximityIndex, Query, QueryResult};

mod tree;
pub use tree::KdTree;

mod brute;
pub use brute::BruteForce;

mod dispatch;
pub use dispatch::{dispatch, Execution, Outcome, QueryFailure, ResultSet};

pub mod bench;
pub mod generate;
pub mod io;

#[cfg(test)]
mod tests;
