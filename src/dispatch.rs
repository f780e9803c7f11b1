use std::collections::BTreeMap;
use std::fmt;
use std::iter::FromIterator;
use std::panic::{self, AssertUnwindSafe};

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};

use crate::{project, Customer, Id, ProximityIndex, Query, QueryResult, Result};

/// How customers of a run are processed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Execution {
    /// One customer after another on the calling thread.
    Sequential,
    /// Customers fanned out over the current rayon worker pool.
    Parallel,
}

/// A query that failed unexpectedly for one customer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryFailure {
    message: String,
}

impl QueryFailure {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns a description of the failure.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for QueryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Result of a single customer's query: its neighbours or the reason it has none.
pub type Outcome = std::result::Result<QueryResult, QueryFailure>;

/// Per-customer outcomes of one run, keyed and iterated by ascending customer id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultSet {
    entries: BTreeMap<Id, Outcome>,
}

impl ResultSet {
    /// Returns the outcome recorded for `customer`.
    pub fn get(&self, customer: Id) -> Option<&Outcome> {
        self.entries.get(&customer)
    }

    /// Returns the provider ids found for `customer`, or `None` if it is unknown or failed.
    pub fn provider_ids(&self, customer: Id) -> Option<Vec<Id>> {
        match self.entries.get(&customer) {
            Some(Ok(result)) => Some(result.provider_ids()),
            _ => None,
        }
    }

    /// Iterates over `(customer id, outcome)` pairs by ascending id.
    pub fn iter(&self) -> impl Iterator<Item = (Id, &Outcome)> + '_ {
        self.entries.iter().map(|(id, outcome)| (*id, outcome))
    }

    /// Iterates over the customers whose query failed.
    pub fn failures(&self) -> impl Iterator<Item = (Id, &QueryFailure)> + '_ {
        self.entries
            .iter()
            .filter_map(|(id, outcome)| outcome.as_ref().err().map(|e| (*id, e)))
    }

    /// Total number of neighbours over all successful customers.
    pub fn neighbour_count(&self) -> usize {
        self.entries
            .values()
            .filter_map(|outcome| outcome.as_ref().ok())
            .map(QueryResult::len)
            .sum()
    }

    /// Returns the number of customers in the set.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no customer is recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(Id, Outcome)> for ResultSet {
    fn from_iter<T: IntoIterator<Item = (Id, Outcome)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Runs `query` for every customer against `index`.
///
/// The index is only read, so the parallel form shares it between workers without locking.
/// Each customer fills its own slot; a panic while answering one customer is recorded as that
/// customer's failure and does not affect the others. An invalid query is rejected before any
/// customer is processed.
pub fn dispatch<I>(
    index: &I,
    customers: &[Customer],
    query: &Query,
    execution: Execution,
) -> Result<ResultSet>
where
    I: ProximityIndex + Sync + ?Sized,
{
    query.validate()?;

    let outcomes: Vec<(Id, Outcome)> = match execution {
        Execution::Sequential => customers
            .iter()
            .map(|c| (c.id(), answer(index, c, query)))
            .collect(),
        Execution::Parallel => customers
            .par_iter()
            .map(|c| (c.id(), answer(index, c, query)))
            .collect(),
    };

    Ok(outcomes.into_iter().collect())
}

fn answer<I>(index: &I, customer: &Customer, query: &Query) -> Outcome
where
    I: ProximityIndex + ?Sized,
{
    let target = project(customer.location());

    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| query.run(index, &target))) {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => Err(QueryFailure::new(e.to_string())),
        Err(payload) => Err(QueryFailure::new(panic_message(payload.as_ref()))),
    };

    if let Err(failure) = &outcome {
        log::warn!("Query failed for customer {}: {}", customer.id(), failure);
    }

    outcome
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
