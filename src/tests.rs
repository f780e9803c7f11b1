#![allow(unused_imports)]
use std::cell::RefCell;
use std::time::Duration;

use oorandom::Rand64;

use crate::bench::{Backend, BenchConfig, Harness, RunLabel, RunSummary, TimingReporter};
use crate::io::{read_providers, write_result_set, DirectorySink};
use crate::metric::chord_to_radius;
use crate::{
    chord_distance, dispatch, generate, project, radius_to_chord, BruteForce, Customer, Error,
    Execution, GeoPoint, Id, KdTree, Location, Provider, ProximityIndex, Query, QueryResult,
    Scalar,
};

fn loc(lat: Scalar, lon: Scalar) -> Location {
    Location::new(lat, lon).unwrap()
}

fn point(lat: Scalar, lon: Scalar) -> GeoPoint {
    project(&loc(lat, lon))
}

fn random_set(seed: u128, customers: usize, providers: usize) -> (Vec<Customer>, Vec<Provider>) {
    let mut rng = Rand64::new(seed);
    let c = generate::customers(customers, &mut rng);
    let p = generate::providers(providers, &mut rng);
    (c, p)
}

// Providers packed into a small area so that radius queries of a few hundred km find many.
fn clustered_providers(seed: u128, count: usize) -> Vec<Provider> {
    let mut rng = Rand64::new(seed);
    (0..count)
        .map(|id| {
            let lat = 40. + rng.rand_float() * 10.;
            let lon = -5. + rng.rand_float() * 10.;
            Provider::new(id as Id, loc(lat, lon))
        })
        .collect()
}

#[test]
fn test_location_validation() {
    assert!(Location::new(90., 180.).is_ok(), "Test range bounds");
    assert!(Location::new(-90., -180.).is_ok(), "Test range bounds");
    assert!(matches!(
        Location::new(90.5, 0.),
        Err(Error::InvalidLatitude(_))
    ));
    assert!(matches!(
        Location::new(0., -180.1),
        Err(Error::InvalidLongitude(_))
    ));
    assert!(matches!(
        Location::new(Scalar::NAN, 0.),
        Err(Error::InvalidLatitude(_))
    ));
    assert!(matches!(
        Location::new(0., Scalar::INFINITY),
        Err(Error::InvalidLongitude(_))
    ));
}

#[test]
fn test_projection() {
    assert_eq!([1., 0., 0.], point(0., 0.).coords(), "Test origin");

    let north = point(90., 45.);
    assert!((north.coord(2) - 1.).abs() < 1e-12, "Test north pole");

    let mut rng = Rand64::new(7);
    for _ in 0..10_000 {
        let p = project(&generate::location(&mut rng));
        assert!((p.norm() - 1.).abs() < 1e-9, "Test unit norm");
    }
}

#[test]
fn test_metric() {
    let a = point(0., 0.);
    assert_eq!(0., chord_distance(&a, &a), "Test identical points");

    let b = point(0., 180.);
    assert!((chord_distance(&a, &b) - 2.).abs() < 1e-12, "Test antipodes");

    let c = point(0., 90.);
    assert!(
        (chord_distance(&a, &c) - (2. as Scalar).sqrt()).abs() < 1e-12,
        "Test quarter circle"
    );
}

#[test]
fn test_radius_to_chord() {
    assert_eq!(0., radius_to_chord(0.), "Test zero radius");

    let mut prev = radius_to_chord(0.);
    for km in [1e-6, 1e-3, 0.5].iter().copied().chain((1..=20_000).map(|k| k as Scalar)) {
        let chord = radius_to_chord(km);
        assert!(chord > prev, "Test strictly increasing at {} km", km);
        prev = chord;
    }

    for km in [1., 128., 5000.].iter() {
        assert!((chord_to_radius(radius_to_chord(*km)) - km).abs() < 1e-6);
    }
}

#[test]
fn test_query_validation() {
    assert!(matches!(
        Query::nearest_checked(-1),
        Err(Error::NegativeCount(-1))
    ));
    assert_eq!(Query::Nearest(3), Query::nearest_checked(3).unwrap());
    assert!(matches!(Query::within_km(-1.), Err(Error::InvalidRadius(_))));
    assert!(matches!(
        Query::within_km(30_000.),
        Err(Error::InvalidRadius(_))
    ));
    assert!(matches!(
        Query::within_km(Scalar::NAN),
        Err(Error::InvalidRadius(_))
    ));

    let providers = vec![Provider::new(0, loc(0., 0.))];
    let tree = KdTree::new(&providers);
    let brute = BruteForce::new(&providers);
    let target = point(0., 0.);
    assert!(matches!(
        tree.within_radius(&target, -0.1),
        Err(Error::InvalidChordThreshold(_))
    ));
    assert!(matches!(
        brute.within_radius(&target, -0.1),
        Err(Error::InvalidChordThreshold(_))
    ));

    let bad = Query::WithinRadius {
        km: 1.,
        chord: -1.,
    };
    let customers = vec![Customer::new(0, loc(0., 0.))];
    assert!(matches!(
        dispatch(&tree, &customers, &bad, Execution::Sequential),
        Err(Error::InvalidChordThreshold(_))
    ));
}

#[test]
fn test_three_providers() {
    let providers = vec![
        Provider::new(0, loc(0., 0.)),
        Provider::new(1, loc(0., 1.)),
        Provider::new(2, loc(1., 0.)),
    ];
    let target = point(0., 0.);
    let tree = KdTree::new(&providers);
    let brute = BruteForce::new(&providers);

    let result = tree.k_nearest(&target, 2);
    assert_eq!(2, result.len(), "Test result length");
    assert_eq!(0, result.neighbours()[0].provider(), "Test nearest provider");
    assert_eq!(0., result.neighbours()[0].dist(), "Test nearest distance");
    assert!([1, 2].contains(&result.neighbours()[1].provider()));
    assert_eq!(brute.k_nearest(&target, 2), result, "Test against scanner");

    let all = tree.k_nearest(&target, 50);
    assert_eq!(3, all.len(), "Test K above provider count");
    assert_eq!(brute.k_nearest(&target, 50), all);
    let dists: Vec<_> = all.neighbours().iter().map(|nb| nb.dist()).collect();
    assert!(dists.windows(2).all(|w| w[0] <= w[1]), "Test ordering");

    assert!(tree.k_nearest(&target, 0).is_empty(), "Test K = 0");
    assert!(brute.k_nearest(&target, 0).is_empty(), "Test K = 0");
}

#[test]
fn test_empty_providers() {
    let tree = KdTree::new(&[]);
    let brute = BruteForce::new(&[]);
    let target = point(12., 34.);

    assert_eq!(0, tree.len());
    assert_eq!(0, tree.depth());
    for k in [0, 1, 50].iter() {
        assert!(tree.k_nearest(&target, *k).is_empty());
        assert!(brute.k_nearest(&target, *k).is_empty());
    }
    for chord in [0., 0.5, 2.].iter() {
        assert!(tree.within_radius(&target, *chord).unwrap().is_empty());
        assert!(brute.within_radius(&target, *chord).unwrap().is_empty());
    }
}

#[test]
fn test_coincident_providers() {
    let providers = vec![
        Provider::new(9, loc(10., 10.)),
        Provider::new(4, loc(10., 10.)),
        Provider::new(7, loc(10., 10.)),
        Provider::new(1, loc(11., 10.)),
        Provider::new(3, loc(10., 10.)),
    ];
    let target = point(10., 10.);
    let tree = KdTree::new(&providers);
    let brute = BruteForce::new(&providers);
    tree.verify();

    let result = tree.k_nearest(&target, 3);
    assert_eq!(vec![3, 4, 7], result.provider_ids(), "Test tie-break by id");
    assert_eq!(brute.k_nearest(&target, 3), result);

    let exact = tree.within_radius(&target, 0.).unwrap();
    assert_eq!(vec![3, 4, 7, 9], exact.provider_ids(), "Test zero threshold");
    assert_eq!(brute.within_radius(&target, 0.).unwrap(), exact);
}

#[test]
fn test_tree_structure() {
    let (_, providers) = random_set(3, 0, 1000);
    let tree = KdTree::new(&providers);
    tree.verify();

    assert_eq!(1000, tree.len());
    assert!(tree.depth() <= 10, "Test balanced depth: {}", tree.depth());
}

#[test]
fn test_nearest_oracle() {
    let (customers, providers) = random_set(11, 200, 3000);
    let tree = KdTree::new(&providers);
    let brute = BruteForce::new(&providers);

    for c in &customers {
        let target = project(c.location());
        for k in [1, 7, 64, 3000, 5000].iter() {
            assert_eq!(
                brute.k_nearest(&target, *k),
                tree.k_nearest(&target, *k),
                "Test customer {} with K = {}",
                c.id(),
                k
            );
        }
    }
}

#[test]
fn test_radius_oracle() {
    let providers = clustered_providers(17, 2000);
    let tree = KdTree::new(&providers);
    let brute = BruteForce::new(&providers);

    let mut rng = Rand64::new(19);
    for _ in 0..100 {
        let target = point(38. + rng.rand_float() * 14., -7. + rng.rand_float() * 14.);
        for km in [1., 16., 128., 500.].iter() {
            let chord = radius_to_chord(*km);
            let expected = brute.within_radius(&target, chord).unwrap();
            let actual = tree.within_radius(&target, chord).unwrap();
            assert_eq!(expected, actual, "Test radius {} km", km);
            assert!(actual.neighbours().iter().all(|nb| nb.dist() <= chord));
        }
    }
}

#[test]
fn test_monotonicity() {
    let providers = clustered_providers(23, 1500);
    let tree = KdTree::new(&providers);
    let target = point(45., 0.);

    let mut prev = QueryResult::default();
    for k in [1, 2, 10, 100, 1000].iter() {
        let result = tree.k_nearest(&target, *k);
        assert_eq!(
            prev.provider_ids()[..],
            result.provider_ids()[..prev.len()],
            "Test prefix at K = {}",
            k
        );
        prev = result;
    }

    let mut prev: Vec<Id> = Vec::new();
    for km in [1., 2., 4., 8., 16., 32., 64., 128., 256.].iter() {
        let result = tree.within_radius(&target, radius_to_chord(*km)).unwrap();
        let ids = result.provider_ids();
        assert!(
            prev.iter().all(|id| ids.contains(id)),
            "Test subset at {} km",
            km
        );
        prev = ids;
    }
    assert!(!prev.is_empty());
}

#[test]
fn test_determinism() {
    let (customers, providers) = random_set(29, 50, 2000);
    let points: Vec<_> = providers.iter().map(Provider::entry).collect();
    let mut reversed = points.clone();
    reversed.reverse();

    let one = KdTree::build(points.clone());
    let two = KdTree::build(points);
    let three = KdTree::build(reversed);

    for c in &customers {
        let target = project(c.location());
        let expected = one.k_nearest(&target, 25);
        assert_eq!(expected, two.k_nearest(&target, 25), "Test rebuild");
        assert_eq!(expected, three.k_nearest(&target, 25), "Test input order");
    }
}

#[test]
fn test_dispatch() {
    let (customers, providers) = random_set(31, 300, 1000);
    let tree = KdTree::new(&providers);
    let brute = BruteForce::new(&providers);
    let query = Query::nearest(10);

    let sequential = dispatch(&tree, &customers, &query, Execution::Sequential).unwrap();
    let parallel = dispatch(&tree, &customers, &query, Execution::Parallel).unwrap();
    let naive = dispatch(&brute, &customers, &query, Execution::Parallel).unwrap();

    assert_eq!(300, sequential.len());
    assert_eq!(sequential, parallel, "Test parallel against sequential");
    assert_eq!(sequential, naive, "Test tree against scanner");
    assert_eq!(3000, parallel.neighbour_count());
    assert_eq!(0, parallel.failures().count());

    let ids: Vec<Id> = parallel.iter().map(|(id, _)| id).collect();
    assert_eq!((0..300).collect::<Vec<Id>>(), ids, "Test customer order");

    let c = &customers[42];
    assert_eq!(
        Some(tree.k_nearest(&project(c.location()), 10).provider_ids()),
        parallel.provider_ids(c.id())
    );
}

struct ExplodingIndex(BruteForce);

impl ProximityIndex for ExplodingIndex {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn k_nearest(&self, target: &GeoPoint, k: usize) -> QueryResult {
        if target.coord(2) > 0.5 {
            panic!("exploding index");
        }
        self.0.k_nearest(target, k)
    }

    fn within_radius(&self, target: &GeoPoint, chord: Scalar) -> crate::Result<QueryResult> {
        self.0.within_radius(target, chord)
    }
}

#[test]
fn test_worker_failure() {
    let (_, providers) = random_set(37, 0, 100);
    let index = ExplodingIndex(BruteForce::new(&providers));
    let customers = vec![
        Customer::new(0, loc(0., 0.)),
        Customer::new(1, loc(60., 0.)),
        Customer::new(2, loc(-10., 20.)),
    ];

    for execution in [Execution::Sequential, Execution::Parallel].iter() {
        let results = dispatch(&index, &customers, &Query::nearest(5), *execution).unwrap();
        assert_eq!(3, results.len(), "Test every customer recorded");

        let failures: Vec<_> = results.failures().collect();
        assert_eq!(1, failures.len());
        assert_eq!(1, failures[0].0);
        assert_eq!("exploding index", failures[0].1.message());

        assert_eq!(5, results.provider_ids(0).unwrap().len());
        assert_eq!(5, results.provider_ids(2).unwrap().len());
        assert_eq!(None, results.provider_ids(1));
    }
}

#[derive(Default)]
struct Recorder(RefCell<Vec<String>>);

impl TimingReporter for Recorder {
    fn report(&self, label: &str, _elapsed: Duration) {
        self.0.borrow_mut().push(label.to_string());
    }
}

#[test]
fn test_harness() {
    let (customers, _) = random_set(41, 40, 0);
    let providers = clustered_providers(43, 400);
    let config = BenchConfig::new()
        .k_values(vec![1, 20, 1000])
        .radii_km(vec![500., 2000.])
        .threads(2);

    let harness = Harness::new(config).unwrap();
    let mut sink: Vec<(RunLabel, crate::ResultSet)> = Vec::new();
    let reporter = Recorder::default();
    let summaries = harness
        .run(&customers, &providers, &mut sink, &reporter)
        .unwrap();

    assert_eq!(20, summaries.len(), "Test matrix size");
    assert_eq!(20, sink.len());

    let labels = reporter.0.borrow();
    assert_eq!(22, labels.len(), "Test builds and runs reported");
    assert_eq!("KdTree build", labels[0]);
    assert_eq!("Naive build", labels[1]);

    for runs in sink.chunks(4) {
        let query = runs[0].0.query;
        for (label, results) in runs {
            assert_eq!(query, label.query);
            assert_eq!(&runs[0].1, results, "Test {} against {}", label, runs[0].0);
        }
    }

    for summary in &summaries {
        assert_eq!(40, summary.customers);
        assert_eq!(0, summary.failures);
        if let Query::Nearest(k) = summary.label.query {
            assert_eq!(40 * k.min(400), summary.neighbours);
        }
    }
}

#[test]
fn test_config() {
    let config = BenchConfig::from_toml_str(
        r#"
        k_values = [5, 10]
        executions = ["parallel"]
        backends = ["kdtree"]
        "#,
    )
    .unwrap();

    assert_eq!(
        BenchConfig::new()
            .k_values(vec![5, 10])
            .executions(vec![Execution::Parallel])
            .backends(vec![Backend::KdTree]),
        config
    );
    assert_eq!(10, config.queries().unwrap().len());

    assert!(matches!(
        BenchConfig::from_toml_str("radii_km = [-1.0]"),
        Err(Error::InvalidRadius(_))
    ));
    assert!(matches!(
        BenchConfig::from_toml_str("radius = 3"),
        Err(Error::Config(_))
    ));
    assert!(Harness::new(BenchConfig::new().radii_km(vec![1e9])).is_err());
}

#[test]
fn test_labels() {
    let label = RunLabel {
        backend: Backend::KdTree,
        execution: Execution::Parallel,
        query: Query::nearest(200),
    };
    assert_eq!("KdTreeParallel-200", label.file_stem());

    let label = RunLabel {
        backend: Backend::Naive,
        execution: Execution::Sequential,
        query: Query::within_km(4.).unwrap(),
    };
    assert_eq!("Naive-4km", label.file_stem());
}

#[test]
fn test_read_providers() {
    let input = "1|10.5|20.25|cafe|ab12\n2|-5|100|shop\n3|0|0||\n";
    let providers = read_providers(input.as_bytes()).unwrap();

    assert_eq!(3, providers.len());
    assert_eq!(1, providers[0].id());
    assert_eq!(10.5, providers[0].location().lat());
    assert_eq!(20.25, providers[0].location().lon());
    assert_eq!(Some("cafe"), providers[0].category());
    assert_eq!(Some("ab12"), providers[0].dedupe_key());
    assert_eq!(Some("shop"), providers[1].category());
    assert_eq!(None, providers[1].dedupe_key());
    assert_eq!(None, providers[2].category());
    assert_eq!(None, providers[2].dedupe_key());

    assert!(matches!(
        read_providers("1|0|0|x\n2|abc|0|x\n".as_bytes()),
        Err(Error::MalformedRecord { line: 2, .. })
    ));
    assert!(matches!(
        read_providers("1|0\n".as_bytes()),
        Err(Error::MalformedRecord { .. })
    ));
    assert!(matches!(
        read_providers("1|95|0|x\n".as_bytes()),
        Err(Error::InvalidLatitude(_))
    ));
}

#[test]
fn test_write_results() {
    let providers = vec![
        Provider::new(0, loc(0., 0.)),
        Provider::new(1, loc(0., 1.)),
    ];
    let customers = vec![Customer::new(5, loc(0., 0.)), Customer::new(3, loc(0., 1.))];
    let brute = BruteForce::new(&providers);
    let results = dispatch(&brute, &customers, &Query::nearest(1), Execution::Sequential).unwrap();

    let mut out = Vec::new();
    write_result_set(&mut out, &results).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<_> = text.lines().collect();

    assert_eq!(
        vec!["customer|provider|distance", "3|1|0", "5|0|0"],
        lines,
        "Test written rows"
    );

    let dir = tempfile::tempdir().unwrap();
    let mut sink = DirectorySink::new(dir.path().join("KdTree")).unwrap();
    let label = RunLabel {
        backend: Backend::KdTree,
        execution: Execution::Parallel,
        query: Query::nearest(1),
    };
    crate::bench::ResultSink::accept(&mut sink, &label, &results).unwrap();

    let path = dir.path().join("KdTree").join("KdTreeParallel-1.txt");
    assert_eq!(path, sink.path_for(&label));
    assert_eq!(text, std::fs::read_to_string(path).unwrap());
}
