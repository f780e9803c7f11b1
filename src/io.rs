//! Reading provider files and writing result sets, both pipe-delimited.
//!
//! Provider records have the form `ID|Latitude|Longitude|Category|DedupeKey`, without a
//! header. The deduplication key may be left out. Result files start with the header
//! `customer|provider|distance` followed by one row per neighbour.
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::bench::{ResultSink, RunLabel};
use crate::{Error, Location, Provider, Result, ResultSet};

const DELIMITER: u8 = b'|';

/// Reads pipe-delimited provider records.
pub fn read_providers<R: Read>(reader: R) -> Result<Vec<Provider>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut providers = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record?;
        let line = record
            .position()
            .map_or(idx as u64 + 1, |pos| pos.line());

        if record.len() < 4 {
            return Err(Error::MalformedRecord {
                line,
                reason: format!("expected at least 4 fields, found {}", record.len()),
            });
        }

        let id = parse_field(&record[0], "id", line)?;
        let lat = parse_field(&record[1], "latitude", line)?;
        let lon = parse_field(&record[2], "longitude", line)?;
        let location = Location::new(lat, lon)?;

        providers.push(Provider::with_labels(
            id,
            location,
            label(record.get(3)),
            label(record.get(4)),
        ));
    }

    log::debug!("Read {} providers", providers.len());
    Ok(providers)
}

/// Reads pipe-delimited provider records from the file at `path`.
pub fn load_providers<P: AsRef<Path>>(path: P) -> Result<Vec<Provider>> {
    let file = File::open(path.as_ref())?;
    read_providers(file)
}

fn parse_field<T: std::str::FromStr>(field: &str, name: &str, line: u64) -> Result<T> {
    field.parse().map_err(|_| Error::MalformedRecord {
        line,
        reason: format!("invalid {}: {:?}", name, field),
    })
}

fn label(field: Option<&str>) -> Option<String> {
    field.filter(|s| !s.is_empty()).map(str::to_string)
}

/// Writes `results` as `customer|provider|distance` rows in result set order.
///
/// Customers whose query failed contribute no rows.
pub fn write_result_set<W: Write>(writer: W, results: &ResultSet) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .from_writer(writer);

    wtr.write_record(&["customer", "provider", "distance"])?;
    for (customer, outcome) in results.iter() {
        if let Ok(result) = outcome {
            for nb in result {
                wtr.write_record(&[
                    customer.to_string(),
                    nb.provider().to_string(),
                    nb.dist().to_string(),
                ])?;
            }
        }
    }

    wtr.flush()?;
    Ok(())
}

/// Writes each run's result set to its own file inside a directory.
///
/// File names follow [`RunLabel::file_stem`], e.g. `KdTreeParallel-200.txt`.
#[derive(Clone, Debug)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Creates the sink, creating `dir` if it does not exist yet.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Returns the path the results of `label` are written to.
    pub fn path_for(&self, label: &RunLabel) -> PathBuf {
        self.dir.join(format!("{}.txt", label.file_stem()))
    }
}

impl ResultSink for DirectorySink {
    fn accept(&mut self, label: &RunLabel, results: &ResultSet) -> Result<()> {
        let path = self.path_for(label);
        write_result_set(File::create(&path)?, results)?;
        log::debug!("Wrote {} results to {}", label, path.display());
        Ok(())
    }
}
