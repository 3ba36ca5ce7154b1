//! Database schema definitions
//!
//! Tables and seed rows for the two local stores are declared here as data.
//! [`plan`] turns them into the ordered statement list executed on first run.

use crate::DbResult;
use std::borrow::Cow;
use std::fmt;

/// Layout version written to `PRAGMA user_version` of every created store
pub const SCHEMA_VERSION: u32 = 1;

/// One independently initialized database file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    Trader,
    Twitter,
}

impl StoreKind {
    /// Initialization order
    pub const ALL: [StoreKind; 2] = [StoreKind::Trader, StoreKind::Twitter];

    pub fn file_name(self) -> &'static str {
        match self {
            StoreKind::Trader => "trader.db",
            StoreKind::Twitter => "twitter.db",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StoreKind::Trader => "trader",
            StoreKind::Twitter => "twitter",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Seed data
// ============================================================================

/// Row of an `(id, name)` enumeration table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedSeed {
    pub id: i64,
    pub name: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerSeed {
    pub id: i64,
    pub name: &'static str,
    pub supported: bool,
}

/// External API integration and the credential fields it needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiServiceSeed {
    pub id: i64,
    pub service: &'static str,
    pub inputs: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeSeed {
    pub broker: i64,
    pub symbol: &'static str,
    pub time: &'static str,
    pub action: i64,
    pub quantity: i64,
    pub status: i64,
    pub last_updated: &'static str,
}

/// Tracked social-media account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowedAccountSeed {
    pub id: &'static str,
    pub name: &'static str,
    pub username: &'static str,
}

pub const STRATEGIES: &[NamedSeed] = &[NamedSeed {
    id: 1,
    name: "reverse_stock_arbitrage",
}];

pub const ACTIONS: &[NamedSeed] = &[
    NamedSeed { id: 1, name: "BUY" },
    NamedSeed { id: 2, name: "SELL" },
];

pub const STATUSES: &[NamedSeed] = &[
    NamedSeed { id: 1, name: "PENDING" },
    NamedSeed { id: 2, name: "FILLED" },
    NamedSeed { id: 3, name: "CONFIRMED" },
    NamedSeed { id: 4, name: "NOT_TRIGGERED" },
];

pub const BROKERS: &[BrokerSeed] = &[
    BrokerSeed { id: 1, name: "robinhood", supported: true },
    BrokerSeed { id: 2, name: "webull", supported: false },
    BrokerSeed { id: 3, name: "fidelity", supported: false },
];

pub const API_SERVICES: &[ApiServiceSeed] = &[
    ApiServiceSeed {
        id: 1,
        service: "robinhood",
        inputs: &["username", "password"],
    },
    ApiServiceSeed {
        id: 2,
        service: "twitter",
        inputs: &["bearer_token", "client_secret", "client_token"],
    },
];

pub const SAMPLE_TRADE: TradeSeed = TradeSeed {
    broker: 1,
    symbol: "TSLA",
    time: "2021-01-25 05:58:48",
    action: 1,
    quantity: 1,
    status: 4,
    last_updated: "2021-01-25 06:39:03",
};

/// Values written to `sqlite_sequence` after seeding (strategies is one ahead of its rows)
pub const SEQUENCE_RESETS: &[(&str, i64)] = &[
    ("strategies", 2),
    ("credentials", 1),
    ("actions", 2),
    ("status", 4),
    ("brokers", 3),
    ("api", 2),
];

pub const FOLLOWING: &[FollowedAccountSeed] = &[
    FollowedAccountSeed {
        id: "44196397",
        name: "Elon Musk",
        username: "elonmusk",
    },
    FollowedAccountSeed {
        id: "1332370385921306631",
        name: "Reverse Split Arbitrage",
        username: "ReverseSplitArb",
    },
    FollowedAccountSeed {
        id: "898021206967951360",
        name: "Tesla Daily",
        username: "TeslaPodcast",
    },
];

// ============================================================================
// Trader DDL
// ============================================================================

const CREATE_STRATEGIES: &str = r#"
CREATE TABLE IF NOT EXISTS "strategies" (
    "id" INTEGER NOT NULL,
    "name" TEXT NOT NULL UNIQUE,
    PRIMARY KEY("id" AUTOINCREMENT)
)"#;

// CHECK(id=1) keeps the table to a single row
const CREATE_CREDENTIALS: &str = r#"
CREATE TABLE IF NOT EXISTS "credentials" (
    "id" INTEGER NOT NULL CHECK(id=1),
    "credentials" TEXT NOT NULL,
    PRIMARY KEY("id" AUTOINCREMENT)
)"#;

const CREATE_ACTIONS: &str = r#"
CREATE TABLE IF NOT EXISTS "actions" (
    "id" INTEGER NOT NULL,
    "name" TEXT NOT NULL UNIQUE,
    PRIMARY KEY("id" AUTOINCREMENT)
)"#;

const CREATE_STATUS: &str = r#"
CREATE TABLE IF NOT EXISTS "status" (
    "id" INTEGER NOT NULL,
    "name" TEXT NOT NULL UNIQUE,
    PRIMARY KEY("id" AUTOINCREMENT)
)"#;

const CREATE_TRADES: &str = r#"
CREATE TABLE IF NOT EXISTS "trades" (
    "broker" INTEGER NOT NULL,
    "symbol" TEXT NOT NULL CHECK(length("symbol") <= 4),
    "time" TIMESTAMP NOT NULL,
    "action" INTEGER NOT NULL,
    "quantity" INTEGER NOT NULL CHECK("quantity" >= 0),
    "status" INTEGER NOT NULL,
    "last_updated" TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY("symbol","time","broker"),
    FOREIGN KEY("status") REFERENCES "status"("id") ON UPDATE CASCADE ON DELETE RESTRICT,
    FOREIGN KEY("action") REFERENCES "actions"("id") ON UPDATE CASCADE ON DELETE RESTRICT,
    FOREIGN KEY("broker") REFERENCES "brokers"("id") ON UPDATE CASCADE ON DELETE RESTRICT
)"#;

const CREATE_BROKERS: &str = r#"
CREATE TABLE IF NOT EXISTS "brokers" (
    "id" INTEGER NOT NULL,
    "name" TEXT NOT NULL UNIQUE,
    "supported" INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY("id" AUTOINCREMENT)
)"#;

const CREATE_API: &str = r#"
CREATE TABLE IF NOT EXISTS "api" (
    "id" INTEGER NOT NULL,
    "service" TEXT NOT NULL UNIQUE,
    "inputs" TEXT NOT NULL,
    PRIMARY KEY("id" AUTOINCREMENT)
)"#;

// ============================================================================
// Twitter DDL
// ============================================================================

/// Everything after `text` is an opaque JSON blob from the tweet payload
const CREATE_TWEETS: &str = r#"
CREATE TABLE IF NOT EXISTS "tweets" (
    "id" TEXT NOT NULL UNIQUE,
    "author_id" TEXT NOT NULL,
    "created_at" TIMESTAMP NOT NULL,
    "text" TEXT NOT NULL,
    "entities" TEXT,
    "public_metrics" TEXT,
    "context_annotations" TEXT,
    "withheld" TEXT,
    "geo" TEXT,
    PRIMARY KEY("id")
)"#;

const CREATE_FOLLOWING: &str = r#"
CREATE TABLE IF NOT EXISTS "following" (
    "id" TEXT NOT NULL,
    "name" TEXT NOT NULL,
    "username" TEXT NOT NULL,
    PRIMARY KEY("id")
)"#;

const TRADER_TABLES: &[&str] = &[
    "strategies",
    "credentials",
    "actions",
    "status",
    "trades",
    "brokers",
    "api",
];

const TWITTER_TABLES: &[&str] = &["tweets", "following"];

/// Tables a store must contain once created
pub fn tables(kind: StoreKind) -> &'static [&'static str] {
    match kind {
        StoreKind::Trader => TRADER_TABLES,
        StoreKind::Twitter => TWITTER_TABLES,
    }
}

// ============================================================================
// Statements
// ============================================================================

/// Value bound to an insert placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Integer(i64),
    Text(String),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

/// One step of a store's creation sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Schema definition, no parameters
    Ddl(&'static str),
    /// Full-row insert with one placeholder per value
    Insert {
        table: &'static str,
        values: Vec<SqlValue>,
    },
    /// Parameterless data statement
    Raw(&'static str),
}

impl Statement {
    fn insert(table: &'static str, values: Vec<SqlValue>) -> Self {
        Statement::Insert { table, values }
    }

    pub fn sql(&self) -> Cow<'static, str> {
        match self {
            Statement::Ddl(sql) | Statement::Raw(sql) => Cow::Borrowed(sql.trim()),
            Statement::Insert { table, values } => {
                let placeholders = vec!["?"; values.len()].join(", ");
                Cow::Owned(format!(r#"INSERT INTO "{table}" VALUES({placeholders})"#))
            }
        }
    }

    pub fn values(&self) -> &[SqlValue] {
        match self {
            Statement::Insert { values, .. } => values,
            _ => &[],
        }
    }
}

fn named_rows(table: &'static str, rows: &'static [NamedSeed]) -> impl Iterator<Item = Statement> {
    rows.iter()
        .map(move |row| Statement::insert(table, vec![row.id.into(), row.name.into()]))
}

/// Ordered creation sequence for one store
///
/// Referenced tables are not guaranteed to exist before their referrers
/// (`trades` precedes `brokers`), so it must run with foreign keys disabled.
pub fn plan(kind: StoreKind) -> DbResult<Vec<Statement>> {
    match kind {
        StoreKind::Trader => trader_plan(),
        StoreKind::Twitter => Ok(twitter_plan()),
    }
}

fn trader_plan() -> DbResult<Vec<Statement>> {
    let mut steps = Vec::new();

    steps.push(Statement::Ddl(CREATE_STRATEGIES));
    steps.extend(named_rows("strategies", STRATEGIES));

    steps.push(Statement::Ddl(CREATE_CREDENTIALS));

    steps.push(Statement::Ddl(CREATE_ACTIONS));
    steps.extend(named_rows("actions", ACTIONS));

    steps.push(Statement::Ddl(CREATE_STATUS));
    steps.extend(named_rows("status", STATUSES));

    steps.push(Statement::Ddl(CREATE_TRADES));
    let trade = SAMPLE_TRADE;
    steps.push(Statement::insert(
        "trades",
        vec![
            trade.broker.into(),
            trade.symbol.into(),
            trade.time.into(),
            trade.action.into(),
            trade.quantity.into(),
            trade.status.into(),
            trade.last_updated.into(),
        ],
    ));

    steps.push(Statement::Ddl(CREATE_BROKERS));
    for broker in BROKERS {
        steps.push(Statement::insert(
            "brokers",
            vec![broker.id.into(), broker.name.into(), broker.supported.into()],
        ));
    }

    steps.push(Statement::Ddl(CREATE_API));
    for api in API_SERVICES {
        let inputs = serde_json::to_string(api.inputs)?;
        steps.push(Statement::insert(
            "api",
            vec![api.id.into(), api.service.into(), inputs.into()],
        ));
    }

    steps.push(Statement::Raw("DELETE FROM sqlite_sequence"));
    for (table, seq) in SEQUENCE_RESETS {
        steps.push(Statement::insert(
            "sqlite_sequence",
            vec![(*table).into(), (*seq).into()],
        ));
    }

    Ok(steps)
}

fn twitter_plan() -> Vec<Statement> {
    let mut steps = vec![
        Statement::Ddl(CREATE_TWEETS),
        Statement::Ddl(CREATE_FOLLOWING),
    ];
    for account in FOLLOWING {
        steps.push(Statement::insert(
            "following",
            vec![account.id.into(), account.name.into(), account.username.into()],
        ));
    }
    steps
}
