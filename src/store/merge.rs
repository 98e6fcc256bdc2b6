//! Operator-directed unification of identities that denote the same
//! real-world exception message.

use std::collections::BTreeSet;
use std::ops::Deref;

use rusqlite::{Connection, params};

use crate::store::ExceptionStore;

/// What one merge directive did to the store. `missing` lists directive
/// entries that resolved to an identity with no raw observations;
/// `rewritten` counts the raw rows re-pointed at the survivor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub directive: Vec<i64>,
    pub survivor: Option<i64>,
    pub missing: Vec<i64>,
    pub rewritten: usize,
}

impl ExceptionStore {
    /// Unifies the identities named by one directive. Every entry is first
    /// resolved through its merge pointer, so directives written against an
    /// older state of the store keep working and a re-run is a no-op. The
    /// largest resolved identity survives; the others get their raw rows
    /// re-pointed and a merge pointer at the survivor. Runs in a single
    /// transaction.
    pub fn apply_directive(&self, directive: &[i64]) -> rusqlite::Result<MergeOutcome> {
        let tx = self.conn.unchecked_transaction()?;
        let mut outcome = MergeOutcome {
            directive: directive.to_vec(),
            survivor: None,
            missing: Vec::new(),
            rewritten: 0,
        };

        let mut resolved = BTreeSet::new();
        for &identity in directive {
            let terminal = Self::resolve_identity_on(tx.deref(), identity)?;
            if Self::raw_count_on(tx.deref(), terminal)? == 0 {
                outcome.missing.push(identity);
            } else {
                resolved.insert(terminal);
            }
        }

        if resolved.len() < 2 {
            // Fully unified already, or not enough valid entries to act on.
            outcome.survivor = resolved.iter().next_back().copied();
            tx.commit()?;
            return Ok(outcome);
        }

        let Some(&survivor) = resolved.iter().next_back() else {
            tx.commit()?;
            return Ok(outcome);
        };
        outcome.survivor = Some(survivor);

        for &identity in &resolved {
            if identity == survivor {
                continue;
            }
            outcome.rewritten += tx.execute(
                "UPDATE raw_observation SET identity = ?1 WHERE identity = ?2",
                params![survivor, identity],
            )?;
            // The OR arm re-points identities merged into this one earlier,
            // keeping every pointer one hop from its terminal identity.
            tx.execute(
                "UPDATE exception_identity SET merged_into = ?1
                 WHERE identity = ?2 OR merged_into = ?2",
                params![survivor, identity],
            )?;
        }

        tx.commit()?;
        Ok(outcome)
    }

    pub fn run_directives(&self, directives: &[Vec<i64>]) -> rusqlite::Result<Vec<MergeOutcome>> {
        let mut outcomes = Vec::with_capacity(directives.len());
        for directive in directives {
            outcomes.push(self.apply_directive(directive)?);
        }
        Ok(outcomes)
    }

    fn resolve_identity_on(conn: &Connection, identity: i64) -> rusqlite::Result<i64> {
        let mut current = identity;
        // Pointers are kept one hop deep; the cap only guards a store that
        // was edited by hand.
        for _ in 0..32 {
            let mut stmt =
                conn.prepare("SELECT merged_into FROM exception_identity WHERE identity = ?1")?;
            let mut rows = stmt.query(params![current])?;
            let Some(row) = rows.next()? else {
                return Ok(current);
            };
            match row.get::<_, Option<i64>>(0)? {
                Some(next) if next != current => current = next,
                _ => return Ok(current),
            }
        }
        Ok(current)
    }

    fn raw_count_on(conn: &Connection, identity: i64) -> rusqlite::Result<i64> {
        conn.query_row(
            "SELECT COUNT(*) FROM raw_observation WHERE identity = ?1",
            params![identity],
            |row| row.get(0),
        )
    }
}
