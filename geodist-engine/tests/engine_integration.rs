//! End-to-end tests for the resumable pairwise distance engine: full runs
//! over small catalogs, interrupt-and-resume equivalence, and the
//! corrupt-state refusals.

use geodist_core::{DistanceAlgorithm, DistanceUnit};
use geodist_engine::{
    ensure_initialized, BatchRunner, Catalog, CheckpointStore, DiskSpaceGuard, EngineConfig,
    PairKey,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const THREE_POINTS: &str = "id,latitude,longitude\nA,0.0,0.0\nB,0.0,1.0\nC,1.0,0.0\n";

const SIX_POINTS: &str = "zipcode,latitude,longitude\n\
10001,40.7506,-73.9972\n\
20001,38.9109,-77.0163\n\
30301,33.7525,-84.3922\n\
60601,41.8858,-87.6181\n\
80201,39.7513,-104.9965\n\
94101,37.7741,-122.4167\n";

struct Fixture {
    _dir: TempDir,
    catalog: Catalog,
    db_path: std::path::PathBuf,
    guard: DiskSpaceGuard,
}

fn fixture(csv: &str) -> Fixture {
    let dir = TempDir::new().unwrap();
    let points_path = dir.path().join("points.csv");
    fs::write(&points_path, csv).unwrap();
    let catalog = Catalog::load(&points_path).unwrap();
    let db_path = dir.path().join("distances.db");
    let guard = DiskSpaceGuard::for_store(&db_path, 0);
    Fixture {
        catalog,
        db_path,
        guard,
        _dir: dir,
    }
}

fn test_config() -> EngineConfig {
    EngineConfig {
        batch_size: 4,
        gen_batch_size: 5,
        concurrency: 2,
        min_free_bytes: 0,
        ..EngineConfig::default()
    }
}

fn init_store(fx: &Fixture, config: &EngineConfig) -> CheckpointStore {
    let mut store = CheckpointStore::open(&fx.db_path).unwrap();
    ensure_initialized(
        &fx.catalog,
        &mut store,
        &fx.guard,
        config.gen_batch_size,
        config.algorithm,
        config.unit,
    )
    .unwrap();
    store
}

fn complete_run(fx: &Fixture, config: EngineConfig) -> Vec<(PairKey, f64)> {
    let mut store = init_store(fx, &config);
    let mut runner = BatchRunner::new(&fx.catalog, &mut store, fx.guard.clone(), config).unwrap();
    let report = runner.run(None).unwrap();
    assert_eq!(report.remaining, 0);
    drop(runner);
    store.completed().unwrap()
}

#[test]
fn test_three_point_scenario() {
    let fx = fixture(THREE_POINTS);
    let results = complete_run(&fx, test_config());

    let pairs: Vec<&PairKey> = results.iter().map(|(p, _)| p).collect();
    assert_eq!(
        pairs,
        vec![
            &PairKey::new("A", "B").unwrap(),
            &PairKey::new("A", "C").unwrap(),
            &PairKey::new("B", "C").unwrap(),
        ]
    );
    for (_, distance) in &results {
        assert!(distance.is_finite() && *distance > 0.0);
    }

    // One degree of longitude at the equator
    let ab = results
        .iter()
        .find(|(p, _)| p == &PairKey::new("A", "B").unwrap())
        .unwrap()
        .1;
    assert!((ab - 111.195).abs() < 0.1, "A-B distance {}", ab);
}

#[test]
fn test_generation_idempotent_across_reopens() {
    let fx = fixture(THREE_POINTS);
    let config = test_config();

    let store = init_store(&fx, &config);
    let before = store.total_count().unwrap();
    drop(store);

    // A second process run against the same store changes nothing
    let store = init_store(&fx, &config);
    assert_eq!(store.total_count().unwrap(), before);
    assert_eq!(before, 3);
    assert!(store.completed().unwrap().is_empty());
}

#[test]
fn test_interrupted_run_resumes_to_same_results() {
    let fx = fixture(SIX_POINTS);
    let config = test_config();

    // Reference: one uninterrupted run in a separate store
    let reference_fx = fixture(SIX_POINTS);
    let reference = complete_run(&reference_fx, config);
    assert_eq!(reference.len(), 15);

    // Interrupted run: two batches of four, then the process "dies"
    {
        let mut store = init_store(&fx, &config);
        let mut runner =
            BatchRunner::new(&fx.catalog, &mut store, fx.guard.clone(), config).unwrap();
        let partial = runner.run(Some(2)).unwrap();
        assert_eq!(partial.committed, 8);
        assert_eq!(partial.remaining, 7);
    }

    // Second invocation completes only the remaining pairs
    let mut store = init_store(&fx, &config);
    assert_eq!(store.remaining_count().unwrap(), 7);
    let mut runner = BatchRunner::new(&fx.catalog, &mut store, fx.guard.clone(), config).unwrap();
    let rest = runner.run(None).unwrap();
    assert_eq!(rest.committed, 7);
    assert_eq!(rest.remaining, 0);
    drop(runner);

    // Union of the two runs equals the uninterrupted run exactly
    let resumed = store.completed().unwrap();
    assert_eq!(resumed.len(), reference.len());
    for ((pair_a, dist_a), (pair_b, dist_b)) in resumed.iter().zip(reference.iter()) {
        assert_eq!(pair_a, pair_b);
        assert_eq!(dist_a, dist_b, "distances diverged for {:?}", pair_a);
    }
}

#[test]
fn test_runner_reinvocation_on_complete_store_is_noop() {
    let fx = fixture(THREE_POINTS);
    let config = test_config();
    complete_run(&fx, config);

    let mut store = init_store(&fx, &config);
    let mut runner = BatchRunner::new(&fx.catalog, &mut store, fx.guard.clone(), config).unwrap();
    let report = runner.run(None).unwrap();
    assert_eq!(report.batches, 0);
    assert_eq!(report.committed, 0);
    assert_eq!(report.remaining, 0);
}

#[test]
fn test_no_half_committed_pairs_after_full_run() {
    let fx = fixture(SIX_POINTS);
    let results = complete_run(&fx, test_config());

    // Every done pair carries a finite distance; counts are consistent
    assert_eq!(results.len(), 15);
    for (pair, distance) in &results {
        assert!(
            distance.is_finite() && *distance >= 0.0,
            "pair {:?} has invalid distance {}",
            pair,
            distance
        );
    }
}

#[test]
fn test_foreign_store_refused() {
    let fx = fixture(THREE_POINTS);

    // Store with work rows but no generation record
    let mut store = CheckpointStore::open(&fx.db_path).unwrap();
    store
        .insert_pending(&[PairKey::new("A", "B").unwrap()])
        .unwrap();
    drop(store);

    let mut store = CheckpointStore::open(&fx.db_path).unwrap();
    let config = test_config();
    let err = ensure_initialized(
        &fx.catalog,
        &mut store,
        &fx.guard,
        config.gen_batch_size,
        config.algorithm,
        config.unit,
    )
    .unwrap_err();
    assert!(err.to_string().contains("corrupt checkpoint state"));
}

#[test]
fn test_catalog_change_refused() {
    let fx = fixture(SIX_POINTS);
    let config = test_config();
    complete_run(&fx, config);

    // Same store, smaller catalog
    let dir = TempDir::new().unwrap();
    let points_path = dir.path().join("points.csv");
    fs::write(&points_path, THREE_POINTS).unwrap();
    let other_catalog = Catalog::load(&points_path).unwrap();

    let mut store = CheckpointStore::open(&fx.db_path).unwrap();
    let err = ensure_initialized(
        &other_catalog,
        &mut store,
        &fx.guard,
        config.gen_batch_size,
        config.algorithm,
        config.unit,
    )
    .unwrap_err();
    assert!(err.to_string().contains("corrupt checkpoint state"));
}

#[test]
fn test_unit_change_refused_on_resume() {
    let fx = fixture(THREE_POINTS);
    let config = test_config();
    init_store(&fx, &config);

    let mut store = CheckpointStore::open(&fx.db_path).unwrap();
    let err = ensure_initialized(
        &fx.catalog,
        &mut store,
        &fx.guard,
        config.gen_batch_size,
        config.algorithm,
        DistanceUnit::Miles,
    )
    .unwrap_err();
    assert!(err.to_string().contains("corrupt checkpoint state"));
}

#[test]
fn test_geodesic_run_matches_haversine_within_one_percent() {
    let fx_h = fixture(SIX_POINTS);
    let haversine = complete_run(&fx_h, test_config());

    let fx_g = fixture(SIX_POINTS);
    let geodesic_config = EngineConfig {
        algorithm: DistanceAlgorithm::Geodesic,
        ..test_config()
    };
    let geodesic = complete_run(&fx_g, geodesic_config);

    for ((pair, h), (_, g)) in haversine.iter().zip(geodesic.iter()) {
        let rel = (h - g).abs() / g;
        assert!(rel < 0.01, "pair {:?}: {} vs {} ({})", pair, h, g, rel);
    }
}

fn corrupt_db_with_extra_row(db_path: &Path) {
    // Simulates foreign interference after a completed generation
    let conn = rusqlite::Connection::open(db_path).unwrap();
    conn.execute(
        "INSERT INTO work (id1, id2, done) VALUES ('Y', 'Z', 0)",
        [],
    )
    .unwrap();
}

#[test]
fn test_count_drift_after_completion_refused() {
    let fx = fixture(THREE_POINTS);
    let config = test_config();
    init_store(&fx, &config);
    corrupt_db_with_extra_row(&fx.db_path);

    let mut store = CheckpointStore::open(&fx.db_path).unwrap();
    let err = ensure_initialized(
        &fx.catalog,
        &mut store,
        &fx.guard,
        config.gen_batch_size,
        config.algorithm,
        config.unit,
    )
    .unwrap_err();
    assert!(err.to_string().contains("corrupt checkpoint state"));
}
