//! SQL persistence for `DecisionLogRecord`: an append-only table with an
//! idempotent conditional outcome writer and the trigger-readiness count
//! the trainer agent polls. Grounded in `db/queries.py`'s three statements
//! and the `rusqlite` WAL-mode schema style of `src/signals/db_storage.rs`.

use crate::domain::{AssetClass, DecisionLogRecord, MarketRegime, Signal, Timeframe};
use rusqlite::{params, Connection, OptionalExtension};

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;

CREATE TABLE IF NOT EXISTS decision_log (
    id TEXT PRIMARY KEY,
    timestamp TEXT NOT NULL,
    agent_id TEXT NOT NULL,
    task_id TEXT NOT NULL,
    asset TEXT NOT NULL,
    asset_class TEXT NOT NULL,
    timeframe TEXT NOT NULL,
    signal_type TEXT NOT NULL,
    signal_value TEXT NOT NULL,
    confidence REAL NOT NULL,
    reasoning TEXT NOT NULL,
    data_sources TEXT NOT NULL,
    market_regime TEXT NOT NULL,
    outcome_pnl REAL,
    outcome_latency_days INTEGER,
    contributed_to_trade INTEGER NOT NULL,
    trade_was_profitable INTEGER
);

CREATE INDEX IF NOT EXISTS idx_decision_log_timestamp ON decision_log(timestamp);
CREATE INDEX IF NOT EXISTS idx_decision_log_outcome_ready
    ON decision_log(outcome_pnl, trade_was_profitable);
"#;

pub struct DecisionLogStore {
    conn: Connection,
}

impl DecisionLogStore {
    pub fn open(path: &str) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }

    /// Appends a new decision record. `DecisionLogRecord` is append-only by
    /// contract; this never updates an existing row.
    pub fn insert(&self, record: &DecisionLogRecord) -> rusqlite::Result<()> {
        let signal_json = serde_json::to_string(&record.signal_value).expect("Signal always serializes");
        let data_sources_json = serde_json::to_string(&record.data_sources).expect("Vec<String> always serializes");
        self.conn.execute(
            "INSERT INTO decision_log (
                id, timestamp, agent_id, task_id, asset, asset_class, timeframe,
                signal_type, signal_value, confidence, reasoning, data_sources,
                market_regime, outcome_pnl, outcome_latency_days,
                contributed_to_trade, trade_was_profitable
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                record.id.to_string(),
                record.timestamp.to_rfc3339(),
                record.agent_id,
                record.task_id,
                record.asset,
                record.asset_class.as_str(),
                record.timeframe.as_str(),
                record.signal_type,
                signal_json,
                record.confidence,
                record.reasoning,
                data_sources_json,
                record.market_regime.as_str(),
                record.outcome_pnl,
                record.outcome_latency_days,
                record.contributed_to_trade,
                record.trade_was_profitable,
            ],
        )?;
        Ok(())
    }

    /// Idempotent conditional outcome write: only applies when the row's
    /// `outcome_pnl` is still null, so a replayed outcome event never
    /// overwrites an already-labeled record.
    pub fn record_outcome(
        &self,
        id: uuid::Uuid,
        outcome_pnl: f64,
        outcome_latency_days: i64,
        trade_was_profitable: bool,
    ) -> rusqlite::Result<bool> {
        let changed = self.conn.execute(
            "UPDATE decision_log
             SET outcome_pnl = ?2, outcome_latency_days = ?3, trade_was_profitable = ?4
             WHERE id = ?1 AND outcome_pnl IS NULL",
            params![id.to_string(), outcome_pnl, outcome_latency_days, trade_was_profitable],
        )?;
        Ok(changed > 0)
    }

    /// Count of rows with both outcome fields set — the trainer's
    /// trigger-readiness signal.
    pub fn outcome_ready_count(&self) -> rusqlite::Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM decision_log WHERE outcome_pnl IS NOT NULL AND trade_was_profitable IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn find_by_id(&self, id: uuid::Uuid) -> rusqlite::Result<Option<DecisionLogRecord>> {
        self.conn
            .query_row(
                "SELECT id, timestamp, agent_id, task_id, asset, asset_class, timeframe,
                        signal_type, signal_value, confidence, reasoning, data_sources,
                        market_regime, outcome_pnl, outcome_latency_days,
                        contributed_to_trade, trade_was_profitable
                 FROM decision_log WHERE id = ?1",
                params![id.to_string()],
                row_to_record,
            )
            .optional()
    }

    /// All records, ordered by timestamp ascending — the order the
    /// dataset builder requires for its temporal split.
    pub fn all_ordered(&self) -> rusqlite::Result<Vec<DecisionLogRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp, agent_id, task_id, asset, asset_class, timeframe,
                    signal_type, signal_value, confidence, reasoning, data_sources,
                    market_regime, outcome_pnl, outcome_latency_days,
                    contributed_to_trade, trade_was_profitable
             FROM decision_log ORDER BY timestamp ASC",
        )?;
        let rows = stmt.query_map([], row_to_record)?;
        rows.collect()
    }
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<DecisionLogRecord> {
    let id: String = row.get(0)?;
    let timestamp: String = row.get(1)?;
    let asset_class: String = row.get(5)?;
    let timeframe: String = row.get(6)?;
    let signal_value: String = row.get(8)?;
    let data_sources: String = row.get(11)?;
    let market_regime: String = row.get(12)?;

    let id = uuid::Uuid::parse_str(&id).map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?;
    let timestamp = chrono::DateTime::parse_from_rfc3339(&timestamp)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e)))?
        .with_timezone(&chrono::Utc);
    let signal_value: Signal = serde_json::from_str(&signal_value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e)))?;
    let data_sources: Vec<String> = serde_json::from_str(&data_sources)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(11, rusqlite::types::Type::Text, Box::new(e)))?;

    Ok(DecisionLogRecord {
        id,
        timestamp,
        agent_id: row.get(2)?,
        task_id: row.get(3)?,
        asset: row.get(4)?,
        asset_class: parse_asset_class(&asset_class),
        timeframe: parse_timeframe(&timeframe),
        signal_type: row.get(7)?,
        signal_value,
        confidence: row.get(9)?,
        reasoning: row.get(10)?,
        data_sources,
        market_regime: parse_market_regime(&market_regime),
        outcome_pnl: row.get(13)?,
        outcome_latency_days: row.get(14)?,
        contributed_to_trade: row.get(15)?,
        trade_was_profitable: row.get(16)?,
    })
}

fn parse_asset_class(value: &str) -> AssetClass {
    match value {
        "equity" => AssetClass::Equity,
        "crypto" => AssetClass::Crypto,
        "etf" => AssetClass::Etf,
        "fx" => AssetClass::Fx,
        _ => AssetClass::Other,
    }
}

fn parse_timeframe(value: &str) -> Timeframe {
    match value {
        "1m" => Timeframe::OneMinute,
        "5m" => Timeframe::FiveMinutes,
        "15m" => Timeframe::FifteenMinutes,
        "1h" => Timeframe::OneHour,
        "4h" => Timeframe::FourHours,
        _ => Timeframe::OneDay,
    }
}

fn parse_market_regime(value: &str) -> MarketRegime {
    match value {
        "trending_bull" => MarketRegime::TrendingBull,
        "trending_bear" => MarketRegime::TrendingBear,
        "high_volatility" => MarketRegime::HighVolatility,
        _ => MarketRegime::MeanReverting,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BaseSignal;
    use crate::domain::TradeDirection;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_record(profitable: Option<bool>) -> DecisionLogRecord {
        DecisionLogRecord::new(
            Uuid::new_v4(),
            Utc::now(),
            "technical-agent",
            "task-1",
            "BTC-USD",
            AssetClass::Crypto,
            Timeframe::OneHour,
            "technical",
            Signal::Base(BaseSignal::new("BTC-USD", TradeDirection::Buy).unwrap()),
            0.8,
            "rsi confirms",
            vec!["timescaledb:ohlcv".into()],
            MarketRegime::TrendingBull,
            profitable.map(|p| if p { 10.0 } else { -10.0 }),
            profitable.map(|_| 2),
            true,
            profitable,
        )
        .unwrap()
    }

    #[test]
    fn insert_then_find_round_trips() {
        let store = DecisionLogStore::open_in_memory().unwrap();
        let record = sample_record(None);
        store.insert(&record).unwrap();
        let found = store.find_by_id(record.id).unwrap().unwrap();
        assert_eq!(found.id, record.id);
        assert_eq!(found.asset_class, AssetClass::Crypto);
    }

    #[test]
    fn outcome_write_is_idempotent_once_set() {
        let store = DecisionLogStore::open_in_memory().unwrap();
        let record = sample_record(None);
        store.insert(&record).unwrap();

        assert!(store.record_outcome(record.id, 10.0, 1, true).unwrap());
        assert!(!store.record_outcome(record.id, 999.0, 1, false).unwrap());

        let found = store.find_by_id(record.id).unwrap().unwrap();
        assert_eq!(found.outcome_pnl, Some(10.0));
        assert_eq!(found.trade_was_profitable, Some(true));
    }

    #[test]
    fn outcome_ready_count_tracks_labeled_rows() {
        let store = DecisionLogStore::open_in_memory().unwrap();
        store.insert(&sample_record(Some(true))).unwrap();
        store.insert(&sample_record(None)).unwrap();
        assert_eq!(store.outcome_ready_count().unwrap(), 1);
    }
}
