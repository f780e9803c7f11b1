//! Benchmark harness: runs every combination of backend, execution mode and query parameter
//! over one customer and provider set, timing each run and handing its results on.
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::metric::MAX_RADIUS_KM;
use crate::{
    dispatch, BruteForce, Customer, Error, Execution, KdTree, Provider, ProximityIndex, Query,
    Result, ResultSet, Scalar,
};

/// Algorithm answering the queries of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// The balanced k-d tree.
    KdTree,
    /// The exhaustive scanner.
    Naive,
}

impl Backend {
    /// Returns the display name of the backend.
    pub fn name(&self) -> &'static str {
        match self {
            Backend::KdTree => "KdTree",
            Backend::Naive => "Naive",
        }
    }

    fn build(&self, providers: &[Provider]) -> Box<dyn ProximityIndex + Send + Sync> {
        match self {
            Backend::KdTree => Box::new(KdTree::new(providers)),
            Backend::Naive => Box::new(BruteForce::new(providers)),
        }
    }
}

/// Parameters of a benchmark run.
///
/// Every field is optional when deserialized; missing fields take their default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchConfig {
    k_values: Vec<usize>,
    radii_km: Vec<Scalar>,
    backends: Vec<Backend>,
    executions: Vec<Execution>,
    threads: Option<usize>,
}

impl Default for BenchConfig {
    /// K of 200, 400 and 800, radii doubling from 1 km to 128 km, both backends, both
    /// execution modes and rayon's default pool size.
    fn default() -> Self {
        Self {
            k_values: vec![200, 400, 800],
            radii_km: (0..8).map(|e| (1u32 << e) as Scalar).collect(),
            backends: vec![Backend::KdTree, Backend::Naive],
            executions: vec![Execution::Sequential, Execution::Parallel],
            threads: None,
        }
    }
}

impl BenchConfig {
    /// Creates a config with default parameters.
    pub fn new() -> Self {
        Self {
            ..Default::default()
        }
    }

    /// Parses a config from TOML.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the neighbour counts of the K-nearest runs.
    pub fn k_values(mut self, k_values: Vec<usize>) -> Self {
        self.k_values = k_values;
        self
    }

    /// Sets the radii, in kilometers, of the radius runs.
    pub fn radii_km(mut self, radii_km: Vec<Scalar>) -> Self {
        self.radii_km = radii_km;
        self
    }

    /// Sets the backends to compare.
    pub fn backends(mut self, backends: Vec<Backend>) -> Self {
        self.backends = backends;
        self
    }

    /// Sets the execution modes to compare.
    pub fn executions(mut self, executions: Vec<Execution>) -> Self {
        self.executions = executions;
        self
    }

    /// Sets the size of the worker pool for parallel runs.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Rejects radii that are negative, not finite or wider than half the globe.
    pub fn validate(&self) -> Result<()> {
        match self
            .radii_km
            .iter()
            .find(|r| !r.is_finite() || **r < 0. || **r > MAX_RADIUS_KM)
        {
            Some(r) => Err(Error::InvalidRadius(*r)),
            None => Ok(()),
        }
    }

    /// Returns the queries of a run: every K first, then every radius.
    pub fn queries(&self) -> Result<Vec<Query>> {
        let nearest = self.k_values.iter().map(|k| Ok(Query::nearest(*k)));
        let radius = self.radii_km.iter().map(|r| Query::within_km(*r));
        nearest.chain(radius).collect()
    }
}

/// Identifies one combination of a benchmark run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunLabel {
    /// Algorithm used.
    pub backend: Backend,
    /// Sequential or parallel.
    pub execution: Execution,
    /// Query issued for every customer.
    pub query: Query,
}

impl RunLabel {
    /// File name stem for the results of this run, e.g. `KdTreeParallel-200` or `Naive-4km`.
    pub fn file_stem(&self) -> String {
        let parallel = match self.execution {
            Execution::Sequential => "",
            Execution::Parallel => "Parallel",
        };
        let param = match self.query {
            Query::Nearest(k) => k.to_string(),
            Query::WithinRadius { km, .. } => format!("{}km", km),
        };

        format!("{}{}-{}", self.backend.name(), parallel, param)
    }
}

impl fmt::Display for RunLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let execution = match self.execution {
            Execution::Sequential => "sequential",
            Execution::Parallel => "parallel",
        };

        match self.query {
            Query::Nearest(k) => write!(f, "{} {} (K={})", self.backend.name(), execution, k),
            Query::WithinRadius { km, chord } => write!(
                f,
                "{} {} (R={}km, chord={})",
                self.backend.name(),
                execution,
                km,
                chord
            ),
        }
    }
}

/// Consumer of the result set of each run.
pub trait ResultSink {
    /// Accepts the results of the run identified by `label`.
    fn accept(&mut self, label: &RunLabel, results: &ResultSet) -> Result<()>;
}

/// Keeps every result set in memory.
impl ResultSink for Vec<(RunLabel, ResultSet)> {
    fn accept(&mut self, label: &RunLabel, results: &ResultSet) -> Result<()> {
        self.push((*label, results.clone()));
        Ok(())
    }
}

/// Discards every result set.
#[derive(Clone, Copy, Debug, Default)]
pub struct Discard;

impl ResultSink for Discard {
    fn accept(&mut self, _label: &RunLabel, _results: &ResultSet) -> Result<()> {
        Ok(())
    }
}

/// Receiver of elapsed times. Reporting is fire-and-forget.
pub trait TimingReporter {
    /// Reports that the step named `label` took `elapsed`.
    fn report(&self, label: &str, elapsed: Duration);
}

/// Reports timings through the `log` facade at info level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogReporter;

impl TimingReporter for LogReporter {
    fn report(&self, label: &str, elapsed: Duration) {
        log::info!("{}: {:?}", label, elapsed);
    }
}

/// Summary of one combination of a benchmark run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    /// Combination that was run.
    pub label: RunLabel,
    /// Wall-clock time of the queries, index construction excluded.
    pub elapsed: Duration,
    /// Number of customers queried.
    pub customers: usize,
    /// Number of customers whose query failed.
    pub failures: usize,
    /// Number of neighbours found over all customers.
    pub neighbours: usize,
}

/// Drives the benchmark matrix described by a [`BenchConfig`].
#[derive(Clone, Debug)]
pub struct Harness {
    config: BenchConfig,
}

impl Harness {
    /// Creates a harness after validating `config`.
    pub fn new(config: BenchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the configuration of the harness.
    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Builds every configured backend once, then runs each query for each backend and
    /// execution mode. Result sets go to `sink`; timings go to `reporter`.
    pub fn run<S, R>(
        &self,
        customers: &[Customer],
        providers: &[Provider],
        sink: &mut S,
        reporter: &R,
    ) -> Result<Vec<RunSummary>>
    where
        S: ResultSink + ?Sized,
        R: TimingReporter + ?Sized,
    {
        let queries = self.config.queries()?;

        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(threads) = self.config.threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder.build()?;

        log::info!(
            "Benchmarking {} customers against {} providers on {} threads",
            customers.len(),
            providers.len(),
            pool.current_num_threads()
        );

        let indexes: Vec<_> = self
            .config
            .backends
            .iter()
            .map(|backend| {
                let start = Instant::now();
                let index = backend.build(providers);
                reporter.report(&format!("{} build", backend.name()), start.elapsed());
                (*backend, index)
            })
            .collect();

        let mut summaries = Vec::new();
        for query in &queries {
            for (backend, index) in &indexes {
                for execution in &self.config.executions {
                    let label = RunLabel {
                        backend: *backend,
                        execution: *execution,
                        query: *query,
                    };

                    let start = Instant::now();
                    let results = match execution {
                        Execution::Sequential => {
                            dispatch(&**index, customers, query, *execution)?
                        }
                        Execution::Parallel => pool.install(|| {
                            dispatch(&**index, customers, query, *execution)
                        })?,
                    };
                    let elapsed = start.elapsed();

                    reporter.report(&label.to_string(), elapsed);
                    sink.accept(&label, &results)?;

                    summaries.push(RunSummary {
                        label,
                        elapsed,
                        customers: results.len(),
                        failures: results.failures().count(),
                        neighbours: results.neighbour_count(),
                    });
                }
            }
        }

        Ok(summaries)
    }
}
