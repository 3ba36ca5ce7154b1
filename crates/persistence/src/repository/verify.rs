//! Seed verification — compares a store against the declared schema and seed rows

use super::{
    ApiServiceRecord, BrokerRecord, FollowedAccountRecord, FollowingRepository, NamedRecord,
    ReferenceRepository, SequenceRecord,
};
use crate::schema::{self, StoreKind};
use crate::{DbError, DbResult};
use sqlx::SqlitePool;
use std::fmt::Debug;

/// Check that every expected table exists and every seed table holds exactly its seed rows
pub async fn verify_store(kind: StoreKind, pool: &SqlitePool) -> DbResult<()> {
    let present: Vec<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table'")
            .fetch_all(pool)
            .await?;

    for table in schema::tables(kind) {
        if !present.iter().any(|(name,)| name == table) {
            return Err(DbError::SeedMismatch {
                table: table.to_string(),
                detail: "table is missing".to_string(),
            });
        }
    }

    match kind {
        StoreKind::Trader => verify_trader(pool).await,
        StoreKind::Twitter => {
            let repo = FollowingRepository::new(pool);
            expect_rows(
                "following",
                repo.following().await?,
                schema::FOLLOWING.iter().map(FollowedAccountRecord::from).collect(),
            )
        }
    }
}

async fn verify_trader(pool: &SqlitePool) -> DbResult<()> {
    let repo = ReferenceRepository::new(pool);

    expect_rows(
        "strategies",
        repo.strategies().await?,
        schema::STRATEGIES.iter().map(NamedRecord::from).collect(),
    )?;
    expect_rows(
        "actions",
        repo.actions().await?,
        schema::ACTIONS.iter().map(NamedRecord::from).collect(),
    )?;
    expect_rows(
        "status",
        repo.statuses().await?,
        schema::STATUSES.iter().map(NamedRecord::from).collect(),
    )?;
    expect_rows(
        "brokers",
        repo.brokers().await?,
        schema::BROKERS.iter().map(BrokerRecord::from).collect(),
    )?;
    expect_rows(
        "api",
        repo.api_services().await?,
        schema::API_SERVICES.iter().map(ApiServiceRecord::from).collect(),
    )?;

    let mut sequences: Vec<SequenceRecord> = schema::SEQUENCE_RESETS
        .iter()
        .map(|(name, seq)| SequenceRecord {
            name: name.to_string(),
            seq: *seq,
        })
        .collect();
    sequences.sort_by(|a, b| a.name.cmp(&b.name));
    expect_rows("sqlite_sequence", repo.sequences().await?, sequences)
}

fn expect_rows<T: PartialEq + Debug>(table: &str, actual: Vec<T>, expected: Vec<T>) -> DbResult<()> {
    if actual == expected {
        return Ok(());
    }
    Err(DbError::SeedMismatch {
        table: table.to_string(),
        detail: format!("expected {expected:?}, found {actual:?}"),
    })
}
