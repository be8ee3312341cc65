use super::traits::{ReportReader, ReportStore, ReportWriter, StorageError};
use super::with_deadline;
use crate::domain::{DailySummary, GameProfit, Report};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Config, NoTls, Row};
use tracing::{error, info};

const BACKEND: &str = "postgres";

const CREATE_TABLE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS reports (
        id BIGSERIAL PRIMARY KEY,
        username TEXT NOT NULL,
        username_game TEXT NOT NULL,
        currency TEXT NOT NULL,
        winloss BIGINT NOT NULL,
        bet BIGINT NOT NULL,
        turnover BIGINT NOT NULL,
        payout DOUBLE PRECISION NOT NULL,
        bet_time TIMESTAMPTZ NOT NULL,
        brand_id TEXT NOT NULL,
        brand_name TEXT NOT NULL,
        game_id TEXT NOT NULL,
        game_name TEXT NOT NULL,
        game_type TEXT NOT NULL,
        transaction_id TEXT NOT NULL,
        round_id TEXT NOT NULL
    )";

// One array per column keeps the statement text fixed regardless of batch size.
const INSERT_SQL: &str = "
    INSERT INTO reports (username, username_game, currency, winloss, bet, turnover, payout,
                         bet_time, brand_id, brand_name, game_id, game_name, game_type,
                         transaction_id, round_id)
    SELECT * FROM UNNEST(
        $1::text[], $2::text[], $3::text[], $4::int8[], $5::int8[], $6::int8[], $7::float8[],
        $8::timestamptz[], $9::text[], $10::text[], $11::text[], $12::text[], $13::text[],
        $14::text[], $15::text[]
    )";

const PROFIT_SQL: &str = "
    SELECT game_name, SUM(winloss)::int8 AS total_profit
    FROM reports
    GROUP BY game_name
    ORDER BY total_profit DESC, game_name";

const DAILY_SQL: &str = "
    SELECT TO_CHAR(bet_time AT TIME ZONE 'UTC', 'YYYY-MM-DD') AS day,
           brand_id,
           game_name,
           SUM(bet)::int8,
           SUM(turnover)::int8,
           AVG(payout)::float8,
           COUNT(*),
           SUM(CASE WHEN winloss > 0 THEN winloss ELSE 0 END)::int8
    FROM reports
    GROUP BY day, brand_id, game_name
    ORDER BY day, brand_id, game_name";

/// Column-major view of a batch, bound as one array parameter per column.
#[derive(Debug, Default)]
pub(crate) struct ReportColumns {
    username: Vec<String>,
    username_game: Vec<String>,
    currency: Vec<String>,
    winloss: Vec<i64>,
    bet: Vec<i64>,
    turnover: Vec<i64>,
    payout: Vec<f64>,
    bet_time: Vec<DateTime<Utc>>,
    brand_id: Vec<String>,
    brand_name: Vec<String>,
    game_id: Vec<String>,
    game_name: Vec<String>,
    game_type: Vec<String>,
    transaction_id: Vec<String>,
    round_id: Vec<String>,
}

impl ReportColumns {
    pub(crate) fn from_reports(reports: &[Report]) -> Self {
        let mut columns = ReportColumns::default();
        for r in reports {
            columns.username.push(r.username.clone());
            columns.username_game.push(r.username_game.clone());
            columns.currency.push(r.currency.clone());
            columns.winloss.push(r.winloss);
            columns.bet.push(r.bet);
            columns.turnover.push(r.turnover);
            columns.payout.push(r.payout);
            columns.bet_time.push(r.bet_time);
            columns.brand_id.push(r.brand_id.clone());
            columns.brand_name.push(r.brand_name.clone());
            columns.game_id.push(r.game_id.clone());
            columns.game_name.push(r.game_name.clone());
            columns.game_type.push(r.game_type.clone());
            columns.transaction_id.push(r.transaction_id.clone());
            columns.round_id.push(r.round_id.clone());
        }
        columns
    }

    pub(crate) fn len(&self) -> usize {
        self.username.len()
    }

    fn params(&self) -> [&(dyn ToSql + Sync); 15] {
        [
            &self.username,
            &self.username_game,
            &self.currency,
            &self.winloss,
            &self.bet,
            &self.turnover,
            &self.payout,
            &self.bet_time,
            &self.brand_id,
            &self.brand_name,
            &self.game_id,
            &self.game_name,
            &self.game_type,
            &self.transaction_id,
            &self.round_id,
        ]
    }
}

fn decode_count(row: &Row, idx: usize, column: &str) -> Result<u64, StorageError> {
    let value: i64 = row.try_get(idx)?;
    u64::try_from(value).map_err(|e| StorageError::Conversion {
        column: column.to_string(),
        reason: e.to_string(),
    })
}

/// Relational store backed by PostgreSQL.
///
/// A single pipelined client is shared by every worker.
pub struct PostgresStore {
    client: Arc<Client>,
    write_timeout: Duration,
    read_timeout: Duration,
}

impl PostgresStore {
    pub async fn connect(
        url: &str,
        write_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, StorageError> {
        let mut config = url.parse::<Config>()?;
        if config.get_connect_timeout().is_none() {
            config.connect_timeout(write_timeout);
        }

        let (client, connection) = config.connect(NoTls).await?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                error!(%err, "Postgres connection closed with error");
            }
        });

        info!(
            hosts = config.get_hosts().len(),
            dbname = config.get_dbname().unwrap_or(""),
            "Connected to PostgreSQL"
        );

        Ok(Self {
            client: Arc::new(client),
            write_timeout,
            read_timeout,
        })
    }
}

#[async_trait]
impl ReportWriter for PostgresStore {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn write_batch(&self, reports: &[Report]) -> Result<(), StorageError> {
        if reports.is_empty() {
            return Ok(());
        }

        let columns = ReportColumns::from_reports(reports);
        with_deadline(BACKEND, self.write_timeout, async {
            self.client.execute(INSERT_SQL, &columns.params()).await?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl ReportReader for PostgresStore {
    async fn count(&self) -> Result<u64, StorageError> {
        with_deadline(BACKEND, self.read_timeout, async {
            let row = self.client.query_one("SELECT COUNT(*) FROM reports", &[]).await?;
            decode_count(&row, 0, "count")
        })
        .await
    }

    async fn profit_by_game(&self) -> Result<Vec<GameProfit>, StorageError> {
        with_deadline(BACKEND, self.read_timeout, async {
            let rows = self.client.query(PROFIT_SQL, &[]).await?;
            rows.iter()
                .map(|row| -> Result<GameProfit, StorageError> {
                    Ok(GameProfit {
                        game_name: row.try_get(0)?,
                        total_profit: row.try_get(1)?,
                    })
                })
                .collect()
        })
        .await
    }

    async fn daily_summary(&self) -> Result<Vec<DailySummary>, StorageError> {
        with_deadline(BACKEND, self.read_timeout, async {
            let rows = self.client.query(DAILY_SQL, &[]).await?;
            rows.iter()
                .map(|row| -> Result<DailySummary, StorageError> {
                    Ok(DailySummary {
                        date: row.try_get(0)?,
                        brand_id: row.try_get(1)?,
                        game_name: row.try_get(2)?,
                        total_bet: row.try_get(3)?,
                        total_turnover: row.try_get(4)?,
                        average_payout: row.try_get(5)?,
                        total_count: decode_count(row, 6, "total_count")?,
                        positive_win: row.try_get(7)?,
                    })
                })
                .collect()
        })
        .await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        with_deadline(BACKEND, self.write_timeout, async {
            self.client.batch_execute("TRUNCATE TABLE reports").await?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl ReportStore for PostgresStore {
    async fn init_schema(&self) -> Result<(), StorageError> {
        with_deadline(BACKEND, self.write_timeout, async {
            self.client.batch_execute(CREATE_TABLE_SQL).await?;
            Ok(())
        })
        .await
    }
}
