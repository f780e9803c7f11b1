use std::fs;
use std::process;

use clap::{App, Arg, ArgMatches};
use oorandom::Rand64;

use geonear::bench::{Backend, BenchConfig, Discard, Harness, LogReporter};
use geonear::io::{load_providers, DirectorySink};
use geonear::{generate, Error, Execution, Result};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = App::new("geonear")
        .about("Benchmarks k-d tree and brute-force nearest provider search")
        .arg(
            Arg::with_name("providers")
                .long("providers")
                .value_name("FILE")
                .help("Pipe-delimited provider file: ID|Latitude|Longitude|Category|DedupeKey")
                .takes_value(true)
                .conflicts_with("random-providers"),
        )
        .arg(
            Arg::with_name("random-providers")
                .long("random-providers")
                .value_name("N")
                .help("Number of randomly generated providers")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("customers")
                .long("customers")
                .value_name("N")
                .help("Number of randomly generated customers")
                .default_value("40000"),
        )
        .arg(
            Arg::with_name("seed")
                .long("seed")
                .value_name("N")
                .help("Seed of the random generator")
                .default_value("0"),
        )
        .arg(
            Arg::with_name("output")
                .long("output")
                .value_name("DIR")
                .help("Directory receiving one result file per run")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("config")
                .long("config")
                .value_name("FILE")
                .help("TOML benchmark configuration")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("threads")
                .long("threads")
                .value_name("N")
                .help("Size of the worker pool for parallel runs")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("k")
                .long("k")
                .value_name("LIST")
                .help("Comma-separated neighbour counts, e.g. 200,400,800")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("radii")
                .long("radii")
                .value_name("LIST")
                .help("Comma-separated radii in km, e.g. 1,2,4")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("backend")
                .long("backend")
                .possible_values(&["kdtree", "naive", "all"])
                .default_value("all"),
        )
        .get_matches();

    if let Err(e) = run(&matches) {
        log::error!("{}", e);
        process::exit(1);
    }
}

fn run(matches: &ArgMatches<'_>) -> Result<()> {
    let mut config = match matches.value_of("config") {
        Some(path) => BenchConfig::from_toml_str(&fs::read_to_string(path)?)?,
        None => BenchConfig::new(),
    };

    if let Some(list) = matches.value_of("k") {
        config = config.k_values(parse_k_values(list)?);
    }
    if let Some(list) = matches.value_of("radii") {
        config = config.radii_km(parse_list(list, "radius")?);
    }
    if let Some(threads) = matches.value_of("threads") {
        config = config.threads(parse_value(threads, "threads")?);
    }
    config = match matches.value_of("backend") {
        Some("kdtree") => config.backends(vec![Backend::KdTree]),
        Some("naive") => config.backends(vec![Backend::Naive]),
        _ => config,
    };

    let seed: u64 = parse_value(matches.value_of("seed").unwrap_or("0"), "seed")?;
    let mut rng = Rand64::new(seed as u128);

    let customer_count = parse_value(
        matches.value_of("customers").unwrap_or("40000"),
        "customers",
    )?;
    let customers = generate::customers(customer_count, &mut rng);
    let providers = match (
        matches.value_of("providers"),
        matches.value_of("random-providers"),
    ) {
        (Some(path), _) => load_providers(path)?,
        (None, Some(count)) => generate::providers(parse_value(count, "providers")?, &mut rng),
        (None, None) => generate::providers(100_000, &mut rng),
    };

    let harness = Harness::new(config)?;
    let summaries = match matches.value_of("output") {
        Some(dir) => {
            let mut sink = DirectorySink::new(dir)?;
            harness.run(&customers, &providers, &mut sink, &LogReporter)?
        }
        None => harness.run(&customers, &providers, &mut Discard, &LogReporter)?,
    };

    for summary in summaries.iter().filter(|s| s.failures > 0) {
        log::warn!("{}: {} customers failed", summary.label, summary.failures);
    }

    let parallel = summaries
        .iter()
        .filter(|s| s.label.execution == Execution::Parallel)
        .count();
    log::info!("Finished {} runs ({} parallel)", summaries.len(), parallel);
    Ok(())
}

fn parse_k_values(list: &str) -> Result<Vec<usize>> {
    parse_list::<i64>(list, "k")?
        .into_iter()
        .map(|k| {
            if k < 0 {
                return Err(Error::NegativeCount(k));
            }
            Ok(k as usize)
        })
        .collect()
}

fn parse_list<T: std::str::FromStr>(list: &str, name: &str) -> Result<Vec<T>> {
    list.split(',').map(|v| parse_value(v.trim(), name)).collect()
}

fn parse_value<T: std::str::FromStr>(value: &str, name: &str) -> Result<T> {
    value.parse().map_err(|_| Error::InvalidArgument {
        name: name.to_string(),
        value: value.to_string(),
    })
}
