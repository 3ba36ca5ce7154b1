//! Reference data repository — the immutable enumeration tables of the trader store

use crate::schema::{ApiServiceSeed, BrokerSeed, NamedSeed};
use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// Row of `strategies`, `actions` or `status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct NamedRecord {
    pub id: i64,
    pub name: String,
}

impl From<&NamedSeed> for NamedRecord {
    fn from(seed: &NamedSeed) -> Self {
        Self {
            id: seed.id,
            name: seed.name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerRecord {
    pub id: i64,
    pub name: String,
    pub supported: bool,
}

impl From<&BrokerSeed> for BrokerRecord {
    fn from(seed: &BrokerSeed) -> Self {
        Self {
            id: seed.id,
            name: seed.name.to_string(),
            supported: seed.supported,
        }
    }
}

/// External API integration with its credential field names decoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiServiceRecord {
    pub id: i64,
    pub service: String,
    pub inputs: Vec<String>,
}

impl From<&ApiServiceSeed> for ApiServiceRecord {
    fn from(seed: &ApiServiceSeed) -> Self {
        Self {
            id: seed.id,
            service: seed.service.to_string(),
            inputs: seed.inputs.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Autoincrement counter of one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SequenceRecord {
    pub name: String,
    pub seq: i64,
}

/// Read-only access to the trader store's reference tables
pub struct ReferenceRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ReferenceRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn strategies(&self) -> DbResult<Vec<NamedRecord>> {
        self.named("strategies").await
    }

    pub async fn actions(&self) -> DbResult<Vec<NamedRecord>> {
        self.named("actions").await
    }

    pub async fn statuses(&self) -> DbResult<Vec<NamedRecord>> {
        self.named("status").await
    }

    async fn named(&self, table: &'static str) -> DbResult<Vec<NamedRecord>> {
        let sql = format!(r#"SELECT id, name FROM "{table}" ORDER BY id"#);
        let records = sqlx::query_as::<_, NamedRecord>(&sql)
            .fetch_all(self.pool)
            .await?;

        Ok(records)
    }

    pub async fn brokers(&self) -> DbResult<Vec<BrokerRecord>> {
        self.brokers_where("1 = 1").await
    }

    /// Brokers with a working integration
    pub async fn supported_brokers(&self) -> DbResult<Vec<BrokerRecord>> {
        self.brokers_where("supported = 1").await
    }

    async fn brokers_where(&self, filter: &'static str) -> DbResult<Vec<BrokerRecord>> {
        let sql = format!("SELECT id, name, supported FROM brokers WHERE {filter} ORDER BY id");
        let rows: Vec<(i64, String, i64)> = sqlx::query_as(&sql).fetch_all(self.pool).await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, supported)| BrokerRecord {
                id,
                name,
                supported: supported != 0,
            })
            .collect())
    }

    pub async fn api_services(&self) -> DbResult<Vec<ApiServiceRecord>> {
        let rows: Vec<(i64, String, String)> =
            sqlx::query_as("SELECT id, service, inputs FROM api ORDER BY id")
                .fetch_all(self.pool)
                .await?;

        rows.into_iter()
            .map(|(id, service, inputs)| {
                Ok(ApiServiceRecord {
                    id,
                    service,
                    inputs: serde_json::from_str(&inputs)?,
                })
            })
            .collect()
    }

    /// Credential field names required by one service
    pub async fn api_inputs(&self, service: &str) -> DbResult<Option<Vec<String>>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT inputs FROM api WHERE service = ?")
            .bind(service)
            .fetch_optional(self.pool)
            .await?;

        match row {
            Some((inputs,)) => Ok(Some(serde_json::from_str(&inputs)?)),
            None => Ok(None),
        }
    }

    pub async fn sequences(&self) -> DbResult<Vec<SequenceRecord>> {
        let records = sqlx::query_as::<_, SequenceRecord>(
            "SELECT name, seq FROM sqlite_sequence ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{initialize, Database};
    use tempfile::TempDir;

    async fn trader(dir: &TempDir) -> Database {
        initialize(dir.path()).await.unwrap();
        Database::open(dir.path().join("trader.db")).await.unwrap()
    }

    fn named(rows: &[(i64, &str)]) -> Vec<NamedRecord> {
        rows.iter()
            .map(|(id, name)| NamedRecord {
                id: *id,
                name: name.to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_enumerations_seeded() {
        let dir = TempDir::new().unwrap();
        let db = trader(&dir).await;
        let repo = ReferenceRepository::new(db.pool());

        assert_eq!(
            repo.strategies().await.unwrap(),
            named(&[(1, "reverse_stock_arbitrage")])
        );
        assert_eq!(repo.actions().await.unwrap(), named(&[(1, "BUY"), (2, "SELL")]));
        assert_eq!(
            repo.statuses().await.unwrap(),
            named(&[
                (1, "PENDING"),
                (2, "FILLED"),
                (3, "CONFIRMED"),
                (4, "NOT_TRIGGERED")
            ])
        );
    }

    #[tokio::test]
    async fn test_only_robinhood_supported() {
        let dir = TempDir::new().unwrap();
        let db = trader(&dir).await;
        let repo = ReferenceRepository::new(db.pool());

        let all: Vec<String> = repo
            .brokers()
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(all, vec!["robinhood", "webull", "fidelity"]);

        let supported = repo.supported_brokers().await.unwrap();
        assert_eq!(supported.len(), 1);
        assert_eq!(supported[0].name, "robinhood");
        assert!(supported[0].supported);
    }

    #[tokio::test]
    async fn test_api_inputs_decoded() {
        let dir = TempDir::new().unwrap();
        let db = trader(&dir).await;
        let repo = ReferenceRepository::new(db.pool());

        let services = repo.api_services().await.unwrap();
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].service, "robinhood");
        assert_eq!(services[0].inputs, vec!["username", "password"]);

        assert_eq!(
            repo.api_inputs("twitter").await.unwrap(),
            Some(vec![
                "bearer_token".to_string(),
                "client_secret".to_string(),
                "client_token".to_string()
            ])
        );
        assert_eq!(repo.api_inputs("webull").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sequences_reset() {
        let dir = TempDir::new().unwrap();
        let db = trader(&dir).await;
        let repo = ReferenceRepository::new(db.pool());

        let sequences: Vec<(String, i64)> = repo
            .sequences()
            .await
            .unwrap()
            .into_iter()
            .map(|s| (s.name, s.seq))
            .collect();
        assert_eq!(
            sequences,
            vec![
                ("actions".to_string(), 2),
                ("api".to_string(), 2),
                ("brokers".to_string(), 3),
                ("credentials".to_string(), 1),
                ("status".to_string(), 4),
                ("strategies".to_string(), 2),
            ]
        );
    }

    #[tokio::test]
    async fn test_next_strategy_id_skips_reserved_counter() {
        let dir = TempDir::new().unwrap();
        let db = trader(&dir).await;

        let result = sqlx::query("INSERT INTO strategies (name) VALUES ('momentum')")
            .execute(db.pool())
            .await
            .unwrap();
        assert_eq!(result.last_insert_rowid(), 3);
    }
}
