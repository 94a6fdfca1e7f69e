// Repository layer — each domain lives in its own file with `impl CollabRepository`.
//
// This is the persistence collaborator the event router consults: user lookup
// at admission, membership upserts on join, and single-field room mutations.
// Calls may block on storage, so callers must never hold an in-memory lock
// (registry, subscriber sets) across them.

use sqlx::sqlite::SqlitePool;

mod membership;
mod rooms;
mod users;

#[cfg(test)]
pub(crate) mod test_helpers;

#[derive(Clone)]
pub struct CollabRepository {
    pub(crate) pool: SqlitePool,
}

impl CollabRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}
