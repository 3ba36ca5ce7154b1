//! Following repository — accounts tracked by the twitter store

use crate::schema::FollowedAccountSeed;
use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct FollowedAccountRecord {
    pub id: String,
    pub name: String,
    pub username: String,
}

impl From<&FollowedAccountSeed> for FollowedAccountRecord {
    fn from(seed: &FollowedAccountSeed) -> Self {
        Self {
            id: seed.id.to_string(),
            name: seed.name.to_string(),
            username: seed.username.to_string(),
        }
    }
}

pub struct FollowingRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FollowingRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Tracked accounts in insertion order (ids are text, so not sortable)
    pub async fn following(&self) -> DbResult<Vec<FollowedAccountRecord>> {
        let records = sqlx::query_as::<_, FollowedAccountRecord>(
            "SELECT id, name, username FROM following ORDER BY rowid",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    pub async fn tweet_count(&self) -> DbResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tweets")
            .fetch_one(self.pool)
            .await?;

        Ok(row.0)
    }
}
