//! Durable checkpoint store over SQLite.
//!
//! One `work` table holds the entire pair universe, keyed by the canonical
//! pair with a `done` flag and the computed distance:
//!
//! ```sql
//! work (id1 TEXT, id2 TEXT, distance REAL, done INTEGER, PRIMARY KEY (id1, id2))
//! ```
//!
//! Rows are inserted once by the generator and mutated exactly once by the
//! batch runner, always inside a single transaction per batch: the
//! distance and the `done` flag land together or not at all, so a crash at
//! any point leaves every pair either fully pending or fully computed.
//!
//! A small `meta` table records the generation lifecycle (catalog size,
//! expected universe size, a completion flag) and pins the distance
//! algorithm and unit chosen when the store was created. Resuming with a
//! different configuration is refused rather than silently mixing
//! incompatible results.

use crate::errors::{EngineError, EngineResult};
use crate::pairs::PairKey;
use geodist_core::{DistanceAlgorithm, DistanceUnit};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::Path;
use std::time::Duration;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS work (
    id1      TEXT NOT NULL,
    id2      TEXT NOT NULL,
    distance REAL,
    done     INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (id1, id2)
);
CREATE TABLE IF NOT EXISTS meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

const META_CATALOG_SIZE: &str = "catalog_size";
const META_UNIVERSE_SIZE: &str = "universe_size";
const META_GENERATED: &str = "generated";
const META_ALGORITHM: &str = "algorithm";
const META_UNIT: &str = "unit";

/// Where the store is in the pair-universe generation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    /// No generation has ever been recorded.
    Fresh,
    /// Generation started but its completion flag was never set. The
    /// idempotent insert pass can be re-run to finish it.
    InProgress { catalog_size: u64, universe_size: u64 },
    /// Generation finished and was verified against the expected count.
    Complete { catalog_size: u64, universe_size: u64 },
}

/// Durable record of which pairs are done and their distances.
///
/// Single-writer: exactly one process may pull and commit against a store
/// at a time. The busy timeout plus the runner's retry policy absorb
/// incidental contention from read-only observers.
pub struct CheckpointStore {
    conn: Connection,
}

impl CheckpointStore {
    /// Opens (or creates) a store at `path` and bootstraps the schema.
    pub fn open(path: impl AsRef<Path>) -> EngineResult<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Opens an existing store without write access, for inspection.
    pub fn open_read_only(path: impl AsRef<Path>) -> EngineResult<Self> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(Self { conn })
    }

    /// In-memory store, for tests and ephemeral runs.
    pub fn open_in_memory() -> EngineResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> EngineResult<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Bulk-inserts pending pairs. Idempotent: pairs already present are
    /// ignored, so overlapping batches from a resumed generation are
    /// harmless. Returns the number of rows actually inserted.
    pub fn insert_pending(&mut self, pairs: &[PairKey]) -> EngineResult<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx
                .prepare_cached("INSERT OR IGNORE INTO work (id1, id2, done) VALUES (?1, ?2, 0)")?;
            for pair in pairs {
                inserted += stmt.execute(params![pair.a(), pair.b()])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Returns up to `limit` not-yet-done pairs in a stable order.
    pub fn pull_pending(&self, limit: usize) -> EngineResult<Vec<PairKey>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT id1, id2 FROM work WHERE done = 0 ORDER BY id1, id2 LIMIT ?1")?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut pairs = Vec::new();
        for row in rows {
            let (a, b) = row?;
            pairs.push(PairKey::from_store_row(a, b)?);
        }
        Ok(pairs)
    }

    /// Atomically records a batch of results and marks the pairs done.
    ///
    /// All rows land in one transaction. Every row must flip exactly one
    /// pending pair; if any pair is missing or already done the whole
    /// batch rolls back with [`EngineError::CorruptState`], since that can
    /// only happen when a second writer violated the single-writer
    /// discipline.
    pub fn commit_results(&mut self, results: &[(PairKey, f64)]) -> EngineResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "UPDATE work SET distance = ?3, done = 1 WHERE id1 = ?1 AND id2 = ?2 AND done = 0",
            )?;
            for (pair, distance) in results {
                let changed = stmt.execute(params![pair.a(), pair.b(), distance])?;
                if changed != 1 {
                    return Err(EngineError::corrupt(format!(
                        "pair ({}, {}) was not pending at commit time",
                        pair.a(),
                        pair.b()
                    )));
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Total pairs in the work table.
    pub fn total_count(&self) -> EngineResult<u64> {
        self.count("SELECT COUNT(*) FROM work")
    }

    /// Pairs not yet done.
    pub fn remaining_count(&self) -> EngineResult<u64> {
        self.count("SELECT COUNT(*) FROM work WHERE done = 0")
    }

    /// Completed pairs with their distances, in canonical order.
    pub fn completed(&self) -> EngineResult<Vec<(PairKey, f64)>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id1, id2, distance FROM work WHERE done = 1 ORDER BY id1, id2",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
            ))
        })?;
        let mut results = Vec::new();
        for row in rows {
            let (a, b, distance) = row?;
            results.push((PairKey::from_store_row(a, b)?, distance));
        }
        Ok(results)
    }

    fn count(&self, sql: &str) -> EngineResult<u64> {
        let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Reads the generation lifecycle recorded in meta.
    ///
    /// # Errors
    /// [`EngineError::CorruptState`] if the meta record is internally
    /// inconsistent (flag present but sizes missing or unparsable).
    pub fn generation_state(&self) -> EngineResult<GenerationState> {
        let Some(flag) = self.meta_get(META_GENERATED)? else {
            return Ok(GenerationState::Fresh);
        };
        let catalog_size = self.meta_u64(META_CATALOG_SIZE)?;
        let universe_size = self.meta_u64(META_UNIVERSE_SIZE)?;
        if flag == "1" {
            Ok(GenerationState::Complete {
                catalog_size,
                universe_size,
            })
        } else {
            Ok(GenerationState::InProgress {
                catalog_size,
                universe_size,
            })
        }
    }

    /// Records the start of generation: sizes, configuration, and an
    /// unset completion flag, in one transaction.
    pub fn begin_generation(
        &mut self,
        catalog_size: u64,
        universe_size: u64,
        algorithm: DistanceAlgorithm,
        unit: DistanceUnit,
    ) -> EngineResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO meta (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )?;
            stmt.execute(params![META_CATALOG_SIZE, catalog_size.to_string()])?;
            stmt.execute(params![META_UNIVERSE_SIZE, universe_size.to_string()])?;
            stmt.execute(params![META_GENERATED, "0"])?;
            stmt.execute(params![META_ALGORITHM, algorithm.to_string()])?;
            stmt.execute(params![META_UNIT, unit.to_string()])?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Verifies the generated universe and sets the completion flag.
    ///
    /// # Errors
    /// [`EngineError::CorruptState`] if the work table count does not
    /// match `expected`.
    pub fn finish_generation(&mut self, expected: u64) -> EngineResult<()> {
        let total = self.total_count()?;
        if total != expected {
            return Err(EngineError::corrupt(format!(
                "generation produced {} pairs, expected {}",
                total, expected
            )));
        }
        self.meta_set(META_GENERATED, "1")
    }

    /// Checks the recorded algorithm and unit against the current
    /// configuration. A mismatch is refused: results computed under
    /// different settings must not share a store.
    pub fn check_run_config(
        &self,
        algorithm: DistanceAlgorithm,
        unit: DistanceUnit,
    ) -> EngineResult<()> {
        if let Some(recorded) = self.meta_get(META_ALGORITHM)? {
            if recorded != algorithm.to_string() {
                return Err(EngineError::corrupt(format!(
                    "store was generated with algorithm {:?} but the run is configured for {}",
                    recorded, algorithm
                )));
            }
        }
        if let Some(recorded) = self.meta_get(META_UNIT)? {
            if recorded != unit.to_string() {
                return Err(EngineError::corrupt(format!(
                    "store records distances in {:?} but the run is configured for {}",
                    recorded, unit
                )));
            }
        }
        Ok(())
    }

    /// Algorithm recorded at generation time, if any.
    pub fn recorded_algorithm(&self) -> EngineResult<Option<DistanceAlgorithm>> {
        match self.meta_get(META_ALGORITHM)? {
            Some(value) => Ok(Some(value.parse().map_err(|e| {
                EngineError::corrupt(format!("meta algorithm: {}", e))
            })?)),
            None => Ok(None),
        }
    }

    /// Unit recorded at generation time, if any.
    pub fn recorded_unit(&self) -> EngineResult<Option<DistanceUnit>> {
        match self.meta_get(META_UNIT)? {
            Some(value) => Ok(Some(
                value
                    .parse()
                    .map_err(|e| EngineError::corrupt(format!("meta unit: {}", e)))?,
            )),
            None => Ok(None),
        }
    }

    fn meta_get(&self, key: &str) -> EngineResult<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn meta_set(&self, key: &str, value: &str) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn meta_u64(&self, key: &str) -> EngineResult<u64> {
        let value = self
            .meta_get(key)?
            .ok_or_else(|| EngineError::corrupt(format!("meta key {} missing", key)))?;
        value
            .parse()
            .map_err(|_| EngineError::corrupt(format!("meta key {} unparsable: {:?}", key, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(a: &str, b: &str) -> PairKey {
        PairKey::new(a, b).unwrap()
    }

    fn store_with_pairs(pairs: &[PairKey]) -> CheckpointStore {
        let mut store = CheckpointStore::open_in_memory().unwrap();
        store.insert_pending(pairs).unwrap();
        store
    }

    #[test]
    fn test_insert_is_idempotent() {
        let pairs = vec![pair("A", "B"), pair("A", "C"), pair("B", "C")];
        let mut store = CheckpointStore::open_in_memory().unwrap();

        assert_eq!(store.insert_pending(&pairs).unwrap(), 3);
        // Overlapping re-insert adds nothing
        assert_eq!(store.insert_pending(&pairs).unwrap(), 0);
        assert_eq!(store.insert_pending(&pairs[1..]).unwrap(), 0);
        assert_eq!(store.total_count().unwrap(), 3);
    }

    #[test]
    fn test_pull_respects_limit_and_order() {
        let store = store_with_pairs(&[pair("A", "B"), pair("A", "C"), pair("B", "C")]);

        let batch = store.pull_pending(2).unwrap();
        assert_eq!(batch, vec![pair("A", "B"), pair("A", "C")]);

        let all = store.pull_pending(100).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_commit_marks_done_and_records_distance() {
        let mut store = store_with_pairs(&[pair("A", "B"), pair("A", "C")]);

        store.commit_results(&[(pair("A", "B"), 111.2)]).unwrap();

        assert_eq!(store.remaining_count().unwrap(), 1);
        assert_eq!(store.pull_pending(10).unwrap(), vec![pair("A", "C")]);
        let completed = store.completed().unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].0, pair("A", "B"));
        assert!((completed[0].1 - 111.2).abs() < 1e-9);
    }

    #[test]
    fn test_commit_is_all_or_nothing() {
        let mut store = store_with_pairs(&[pair("A", "B"), pair("A", "C")]);
        store.commit_results(&[(pair("A", "B"), 1.0)]).unwrap();

        // Second row references an already-done pair: the whole batch must
        // roll back, including the valid first row.
        let err = store
            .commit_results(&[(pair("A", "C"), 2.0), (pair("A", "B"), 9.9)])
            .unwrap_err();
        assert!(matches!(err, EngineError::CorruptState(_)));

        assert_eq!(store.remaining_count().unwrap(), 1);
        let completed = store.completed().unwrap();
        assert_eq!(completed.len(), 1);
        assert!((completed[0].1 - 1.0).abs() < 1e-9, "first commit overwritten");
    }

    #[test]
    fn test_commit_unknown_pair_rolls_back() {
        let mut store = store_with_pairs(&[pair("A", "B")]);
        let err = store
            .commit_results(&[(pair("A", "B"), 1.0), (pair("X", "Y"), 2.0)])
            .unwrap_err();
        assert!(matches!(err, EngineError::CorruptState(_)));
        assert_eq!(store.remaining_count().unwrap(), 1);
    }

    #[test]
    fn test_generation_lifecycle() {
        let mut store = CheckpointStore::open_in_memory().unwrap();
        assert_eq!(store.generation_state().unwrap(), GenerationState::Fresh);

        store
            .begin_generation(
                3,
                3,
                DistanceAlgorithm::Haversine,
                DistanceUnit::Kilometers,
            )
            .unwrap();
        assert_eq!(
            store.generation_state().unwrap(),
            GenerationState::InProgress {
                catalog_size: 3,
                universe_size: 3
            }
        );

        store
            .insert_pending(&[pair("A", "B"), pair("A", "C"), pair("B", "C")])
            .unwrap();
        store.finish_generation(3).unwrap();
        assert_eq!(
            store.generation_state().unwrap(),
            GenerationState::Complete {
                catalog_size: 3,
                universe_size: 3
            }
        );
    }

    #[test]
    fn test_finish_generation_verifies_count() {
        let mut store = CheckpointStore::open_in_memory().unwrap();
        store
            .begin_generation(
                3,
                3,
                DistanceAlgorithm::Haversine,
                DistanceUnit::Kilometers,
            )
            .unwrap();
        store.insert_pending(&[pair("A", "B")]).unwrap();

        let err = store.finish_generation(3).unwrap_err();
        assert!(matches!(err, EngineError::CorruptState(_)));
        // Flag stays unset, generation remains resumable
        assert!(matches!(
            store.generation_state().unwrap(),
            GenerationState::InProgress { .. }
        ));
    }

    #[test]
    fn test_run_config_mismatch_refused() {
        let mut store = CheckpointStore::open_in_memory().unwrap();
        store
            .begin_generation(
                3,
                3,
                DistanceAlgorithm::Haversine,
                DistanceUnit::Kilometers,
            )
            .unwrap();

        assert!(store
            .check_run_config(DistanceAlgorithm::Haversine, DistanceUnit::Kilometers)
            .is_ok());
        assert!(store
            .check_run_config(DistanceAlgorithm::Geodesic, DistanceUnit::Kilometers)
            .is_err());
        assert!(store
            .check_run_config(DistanceAlgorithm::Haversine, DistanceUnit::Miles)
            .is_err());

        assert_eq!(
            store.recorded_algorithm().unwrap(),
            Some(DistanceAlgorithm::Haversine)
        );
        assert_eq!(
            store.recorded_unit().unwrap(),
            Some(DistanceUnit::Kilometers)
        );
    }
}
