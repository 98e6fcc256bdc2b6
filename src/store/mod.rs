//! SQLite persistence: raw observation rows keyed by content hash, the
//! reconciled identity table derived from them, and a per-run audit trail.

pub mod merge;

use std::ops::Deref;

use rusqlite::{Connection, params};
use sha2::{Digest, Sha256};

use crate::range::{Observation, RevisionRange};

/// One reconciled identity: a (filename, message) key, the revision range it
/// was observed over, and the merge pointer once an operator has folded it
/// into another identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    pub identity: i64,
    pub filename: String,
    pub message: String,
    pub range: RevisionRange,
    pub merged_into: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub inserted: usize,
    pub deduplicated: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub observations: usize,
    pub identities_created: usize,
}

pub struct ExceptionStore {
    conn: Connection,
}

impl ExceptionStore {
    pub fn open(path: &str) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            ",
        )?;

        let version: i64 = self.conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version == 0 {
            self.create_schema_v1()?;
            self.conn.execute_batch("PRAGMA user_version = 1;")?;
        } else if version == 1 {
            self.create_schema_v1()?;
        } else {
            return Err(rusqlite::Error::InvalidQuery);
        }
        Ok(())
    }

    fn create_schema_v1(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS exception_identity (
                identity INTEGER PRIMARY KEY,
                filename TEXT NOT NULL,
                message TEXT NOT NULL,
                start_revision_index INTEGER NOT NULL,
                start_revision TEXT NOT NULL,
                end_revision_index INTEGER NOT NULL,
                end_revision TEXT NOT NULL,
                merged_into INTEGER,
                UNIQUE(filename, message)
            );

            CREATE TABLE IF NOT EXISTS raw_observation (
                content_hash TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                revision_index INTEGER NOT NULL,
                revision TEXT NOT NULL,
                message TEXT NOT NULL,
                identity INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_raw_observation_identity
                ON raw_observation(identity);

            CREATE TABLE IF NOT EXISTS scan_run (
                run_id INTEGER PRIMARY KEY,
                started_at TEXT NOT NULL,
                repo TEXT NOT NULL,
                revision_count INTEGER NOT NULL,
                observation_count INTEGER NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Inserts a batch of observations. Rows are keyed by content hash, so
    /// re-collecting a revision already in the store is a no-op counted
    /// under `deduplicated`.
    pub fn load_raw(&self, observations: &[Observation]) -> rusqlite::Result<LoadSummary> {
        let tx = self.conn.unchecked_transaction()?;
        let mut summary = LoadSummary::default();
        for observation in observations {
            let changed = tx.execute(
                "INSERT OR IGNORE INTO raw_observation
                     (content_hash, filename, revision_index, revision, message)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    observation_hash(observation),
                    observation.filename,
                    observation.revision_index,
                    observation.revision,
                    observation.message
                ],
            )?;
            if changed == 1 {
                summary.inserted += 1;
            } else {
                summary.deduplicated += 1;
            }
        }
        tx.commit()?;
        Ok(summary)
    }

    /// Replays every raw row in (revision_index, filename, message) order and
    /// folds it into the identity table: a first sighting of a key mints a
    /// new identity, a later one widens that identity's range. The replay
    /// order is what keeps identity numbers stable across runs.
    pub fn reconcile(&self) -> rusqlite::Result<ReconcileSummary> {
        let tx = self.conn.unchecked_transaction()?;
        let mut summary = ReconcileSummary::default();
        {
            let mut stmt = tx.prepare(
                "SELECT content_hash, filename, message, revision, revision_index
                 FROM raw_observation
                 ORDER BY revision_index ASC, filename ASC, message ASC",
            )?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let content_hash: String = row.get(0)?;
                let observation = Observation {
                    filename: row.get(1)?,
                    message: row.get(2)?,
                    revision: row.get(3)?,
                    revision_index: row.get(4)?,
                };
                let (identity, created) = Self::assign_identity_on(tx.deref(), &observation)?;
                if created {
                    summary.identities_created += 1;
                }
                tx.execute(
                    "UPDATE raw_observation SET identity = ?1 WHERE content_hash = ?2",
                    params![identity, content_hash],
                )?;
                summary.observations += 1;
            }
        }
        tx.commit()?;
        Ok(summary)
    }

    fn assign_identity_on(
        conn: &Connection,
        observation: &Observation,
    ) -> rusqlite::Result<(i64, bool)> {
        let mut stmt = conn.prepare(
            "SELECT identity, start_revision_index, start_revision,
                    end_revision_index, end_revision
             FROM exception_identity
             WHERE filename = ?1 AND message = ?2",
        )?;
        let mut rows = stmt.query(params![observation.filename, observation.message])?;
        if let Some(row) = rows.next()? {
            let identity: i64 = row.get(0)?;
            let mut range = RevisionRange {
                start_revision_index: row.get(1)?,
                start_revision: row.get(2)?,
                end_revision_index: row.get(3)?,
                end_revision: row.get(4)?,
            };
            range.update(&observation.revision, observation.revision_index);
            conn.execute(
                "UPDATE exception_identity
                 SET start_revision_index = ?1, start_revision = ?2,
                     end_revision_index = ?3, end_revision = ?4
                 WHERE identity = ?5",
                params![
                    range.start_revision_index,
                    range.start_revision,
                    range.end_revision_index,
                    range.end_revision,
                    identity
                ],
            )?;
            return Ok((identity, false));
        }

        conn.execute(
            "INSERT INTO exception_identity
                 (filename, message, start_revision_index, start_revision,
                  end_revision_index, end_revision)
             VALUES (?1, ?2, ?3, ?4, ?3, ?4)",
            params![
                observation.filename,
                observation.message,
                observation.revision_index,
                observation.revision
            ],
        )?;
        Ok((conn.last_insert_rowid(), true))
    }

    pub fn record_run(
        &self,
        started_at: &str,
        repo: &str,
        revision_count: usize,
        observation_count: usize,
    ) -> rusqlite::Result<i64> {
        self.conn.execute(
            "INSERT INTO scan_run (started_at, repo, revision_count, observation_count)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                started_at,
                repo,
                revision_count as i64,
                observation_count as i64
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn identity_records(&self) -> rusqlite::Result<Vec<IdentityRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT identity, filename, message, start_revision_index, start_revision,
                    end_revision_index, end_revision, merged_into
             FROM exception_identity
             ORDER BY filename ASC, message ASC",
        )?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(IdentityRecord {
                identity: row.get(0)?,
                filename: row.get(1)?,
                message: row.get(2)?,
                range: RevisionRange {
                    start_revision_index: row.get(3)?,
                    start_revision: row.get(4)?,
                    end_revision_index: row.get(5)?,
                    end_revision: row.get(6)?,
                },
                merged_into: row.get(7)?,
            });
        }
        Ok(out)
    }

    /// Revisions in collection order, each listed once.
    pub fn revision_sequence(&self) -> rusqlite::Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT revision FROM raw_observation
             GROUP BY revision
             ORDER BY MIN(revision_index) ASC",
        )?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(row.get(0)?);
        }
        Ok(out)
    }

    pub fn observations(&self) -> rusqlite::Result<Vec<Observation>> {
        let mut stmt = self.conn.prepare(
            "SELECT filename, message, revision, revision_index
             FROM raw_observation
             ORDER BY revision_index ASC, filename ASC, message ASC",
        )?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(Observation {
                filename: row.get(0)?,
                message: row.get(1)?,
                revision: row.get(2)?,
                revision_index: row.get(3)?,
            });
        }
        Ok(out)
    }
}

/// Natural key of a raw observation. Fields are NUL-delimited so adjacent
/// fields can never collide; revision_index is deliberately left out, so a
/// re-collect of the same revision hashes to the same row.
fn observation_hash(observation: &Observation) -> String {
    let mut hasher = Sha256::new();
    hasher.update(observation.filename.as_bytes());
    hasher.update([0u8]);
    hasher.update(observation.revision.as_bytes());
    hasher.update([0u8]);
    hasher.update(observation.message.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{byte:02x}");
    }
    out
}
