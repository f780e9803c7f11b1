use thiserror::Error;

/// Errors raised while constructing points, validating queries or moving data in and out.
#[derive(Debug, Error)]
pub enum Error {
    /// Latitude outside `[-90, 90]` degrees or not finite.
    #[error("latitude out of range [-90, 90]: {0}")]
    InvalidLatitude(f64),

    /// Longitude outside `[-180, 180]` degrees or not finite.
    #[error("longitude out of range [-180, 180]: {0}")]
    InvalidLongitude(f64),

    /// A neighbour count below zero.
    #[error("neighbour count must not be negative, got {0}")]
    NegativeCount(i64),

    /// A radius in kilometers that is negative, not finite or wider than half the globe.
    #[error("radius must lie between 0 km and half of Earth's circumference, got {0}")]
    InvalidRadius(f64),

    /// A chord threshold that is negative or not finite.
    #[error("chord threshold must be a finite non-negative number, got {0}")]
    InvalidChordThreshold(f64),

    /// A record that could not be turned into a point.
    #[error("malformed record on line {line}: {reason}")]
    MalformedRecord {
        /// 1-based line number of the record.
        line: u64,
        /// What was wrong with it.
        reason: String,
    },

    /// A command line value that could not be parsed.
    #[error("invalid {name} argument: {value:?}")]
    InvalidArgument {
        /// Name of the argument.
        name: String,
        /// Value as given.
        value: String,
    },

    /// The worker pool could not be started.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Benchmark configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// Delimited reader or writer failure.
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
