//! Uniformly distributed random customers and providers.
use oorandom::Rand64;

use crate::{Customer, Id, Location, Provider};

/// Draws a location with latitude in `[-90, 90)` and longitude in `[-180, 180)`.
pub fn location(rng: &mut Rand64) -> Location {
    let lat = rng.rand_float() * 180. - 90.;
    let lon = rng.rand_float() * 360. - 180.;
    Location::from_degrees(lat, lon)
}

/// Generates `count` customers with ids `0..count`.
pub fn customers(count: usize, rng: &mut Rand64) -> Vec<Customer> {
    (0..count)
        .map(|id| Customer::new(id as Id, location(rng)))
        .collect()
}

/// Generates `count` providers with ids `0..count` and no labels.
pub fn providers(count: usize, rng: &mut Rand64) -> Vec<Provider> {
    (0..count)
        .map(|id| Provider::new(id as Id, location(rng)))
        .collect()
}
