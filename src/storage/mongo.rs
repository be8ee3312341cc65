use super::traits::{ReportReader, ReportStore, ReportWriter, StorageError};
use super::with_deadline;
use crate::domain::{DailySummary, GameProfit, Report};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use std::time::Duration;
use tracing::info;

const BACKEND: &str = "mongodb";

pub(crate) fn report_document(r: &Report) -> Document {
    doc! {
        "username": r.username.as_str(),
        "username_game": r.username_game.as_str(),
        "currency": r.currency.as_str(),
        "winloss": r.winloss,
        "bet": r.bet,
        "turnover": r.turnover,
        "payout": r.payout,
        "bet_time": mongodb::bson::DateTime::from_millis(r.bet_time.timestamp_millis()),
        "brand_id": r.brand_id.as_str(),
        "brand_name": r.brand_name.as_str(),
        "game_id": r.game_id.as_str(),
        "game_name": r.game_name.as_str(),
        "game_type": r.game_type.as_str(),
        "transaction_id": r.transaction_id.as_str(),
        "round_id": r.round_id.as_str(),
    }
}

pub(crate) fn profit_pipeline() -> Vec<Document> {
    vec![
        doc! { "$group": { "_id": "$game_name", "total_profit": { "$sum": "$winloss" } } },
        doc! { "$sort": { "total_profit": -1, "_id": 1 } },
    ]
}

pub(crate) fn daily_pipeline() -> Vec<Document> {
    vec![
        doc! {
            "$group": {
                "_id": {
                    "date": { "$dateToString": { "format": "%Y-%m-%d", "date": "$bet_time" } },
                    "brand_id": "$brand_id",
                    "game_name": "$game_name",
                },
                "total_bet": { "$sum": "$bet" },
                "total_turnover": { "$sum": "$turnover" },
                "average_payout": { "$avg": "$payout" },
                "total_count": { "$sum": 1 },
                "positive_win": {
                    "$sum": { "$cond": [ { "$gt": ["$winloss", 0] }, "$winloss", 0 ] }
                },
            }
        },
        doc! { "$sort": { "_id.date": 1, "_id.brand_id": 1, "_id.game_name": 1 } },
    ]
}

fn conversion(column: &str, reason: impl ToString) -> StorageError {
    StorageError::Conversion {
        column: column.to_string(),
        reason: reason.to_string(),
    }
}

/// Read a numeric aggregate accepting 32-bit, 64-bit or floating results.
fn get_number(doc: &Document, key: &str) -> Result<i64, StorageError> {
    match doc.get(key) {
        Some(Bson::Int32(v)) => Ok(i64::from(*v)),
        Some(Bson::Int64(v)) => Ok(*v),
        Some(Bson::Double(v)) => Ok(*v as i64),
        Some(other) => Err(conversion(key, format!("unexpected type {:?}", other.element_type()))),
        None => Err(conversion(key, "missing")),
    }
}

fn get_float(doc: &Document, key: &str) -> Result<f64, StorageError> {
    match doc.get(key) {
        Some(Bson::Double(v)) => Ok(*v),
        Some(Bson::Int32(v)) => Ok(f64::from(*v)),
        Some(Bson::Int64(v)) => Ok(*v as f64),
        Some(Bson::Null) | None => Ok(0.0),
        Some(other) => Err(conversion(key, format!("unexpected type {:?}", other.element_type()))),
    }
}

fn get_string(doc: &Document, key: &str) -> Result<String, StorageError> {
    doc.get_str(key).map(str::to_string).map_err(|e| conversion(key, e))
}

pub(crate) fn decode_profit(doc: &Document) -> Result<GameProfit, StorageError> {
    Ok(GameProfit {
        game_name: get_string(doc, "_id")?,
        total_profit: get_number(doc, "total_profit")?,
    })
}

pub(crate) fn decode_daily(doc: &Document) -> Result<DailySummary, StorageError> {
    let id = doc.get_document("_id").map_err(|e| conversion("_id", e))?;
    let total_count = get_number(doc, "total_count")?;

    Ok(DailySummary {
        date: get_string(id, "date")?,
        brand_id: get_string(id, "brand_id")?,
        game_name: get_string(id, "game_name")?,
        total_bet: get_number(doc, "total_bet")?,
        total_turnover: get_number(doc, "total_turnover")?,
        average_payout: get_float(doc, "average_payout")?,
        total_count: u64::try_from(total_count).map_err(|e| conversion("total_count", e))?,
        positive_win: get_number(doc, "positive_win")?,
    })
}

/// Document store backed by MongoDB.
///
/// The driver pools connections internally, so one handle serves every worker.
pub struct MongoStore {
    collection: Collection<Document>,
    write_timeout: Duration,
    read_timeout: Duration,
}

impl MongoStore {
    pub async fn connect(
        uri: &str,
        database: &str,
        collection: &str,
        write_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, StorageError> {
        let mut options = ClientOptions::parse(uri).await?;
        options.app_name = Some("storebench".to_string());
        if options.connect_timeout.is_none() {
            options.connect_timeout = Some(write_timeout);
        }
        if options.server_selection_timeout.is_none() {
            options.server_selection_timeout = Some(write_timeout);
        }

        let client = Client::with_options(options)?;
        let collection = client.database(database).collection::<Document>(collection);

        info!(database, collection = collection.name(), "Connected to MongoDB");

        Ok(Self {
            collection,
            write_timeout,
            read_timeout,
        })
    }

    async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>, StorageError> {
        let cursor = self.collection.aggregate(pipeline, None).await?;
        let documents: Vec<Document> = cursor.try_collect().await?;
        Ok(documents)
    }
}

#[async_trait]
impl ReportWriter for MongoStore {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn write_batch(&self, reports: &[Report]) -> Result<(), StorageError> {
        if reports.is_empty() {
            return Ok(());
        }

        let documents: Vec<Document> = reports.iter().map(report_document).collect();
        with_deadline(BACKEND, self.write_timeout, async {
            self.collection.insert_many(documents, None).await?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl ReportReader for MongoStore {
    async fn count(&self) -> Result<u64, StorageError> {
        with_deadline(BACKEND, self.read_timeout, async {
            Ok(self.collection.count_documents(doc! {}, None).await?)
        })
        .await
    }

    async fn profit_by_game(&self) -> Result<Vec<GameProfit>, StorageError> {
        with_deadline(BACKEND, self.read_timeout, async {
            let documents = self.aggregate(profit_pipeline()).await?;
            documents.iter().map(decode_profit).collect()
        })
        .await
    }

    async fn daily_summary(&self) -> Result<Vec<DailySummary>, StorageError> {
        with_deadline(BACKEND, self.read_timeout, async {
            let documents = self.aggregate(daily_pipeline()).await?;
            documents.iter().map(decode_daily).collect()
        })
        .await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        with_deadline(BACKEND, self.write_timeout, async {
            self.collection.delete_many(doc! {}, None).await?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl ReportStore for MongoStore {
    /// Collections are created on first insert; only the time index is ensured here.
    async fn init_schema(&self) -> Result<(), StorageError> {
        let index = mongodb::IndexModel::builder()
            .keys(doc! { "bet_time": 1 })
            .build();
        with_deadline(BACKEND, self.write_timeout, async {
            self.collection.create_index(index, None).await?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::report::REPORT_COLUMNS;
    use crate::generator::generate;

    #[test]
    fn test_report_document_has_every_column() {
        let report = generate(1).remove(0);
        let document = report_document(&report);

        for column in REPORT_COLUMNS {
            assert!(document.contains_key(column), "missing {}", column);
        }
        assert_eq!(document.get_i64("winloss").unwrap(), report.winloss);
        assert_eq!(
            document.get_datetime("bet_time").unwrap().timestamp_millis(),
            report.bet_time.timestamp_millis()
        );
    }

    #[test]
    fn test_decode_profit_accepts_int32_sums() {
        let profit = decode_profit(&doc! { "_id": "Game 3", "total_profit": 42i32 }).unwrap();
        assert_eq!(profit.game_name, "Game 3");
        assert_eq!(profit.total_profit, 42);
    }

    #[test]
    fn test_decode_daily_summary() {
        let document = doc! {
            "_id": { "date": "2025-01-01", "brand_id": "brand1", "game_name": "Game 1" },
            "total_bet": 30i64,
            "total_turnover": 60i64,
            "average_payout": 1.5,
            "total_count": 3i32,
            "positive_win": 100i64,
        };

        let summary = decode_daily(&document).unwrap();
        assert_eq!(summary.date, "2025-01-01");
        assert_eq!(summary.brand_id, "brand1");
        assert_eq!(summary.total_count, 3);
        assert_eq!(summary.positive_win, 100);
        assert!((summary.average_payout - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_decode_rejects_missing_fields() {
        assert!(decode_profit(&doc! { "_id": "Game 1" }).is_err());
        assert!(decode_daily(&doc! { "_id": "flat" }).is_err());
    }

    #[test]
    fn test_pipelines_group_then_sort() {
        let profit = profit_pipeline();
        assert!(profit[0].contains_key("$group"));
        assert!(profit[1].contains_key("$sort"));

        let daily = daily_pipeline();
        let group = daily[0].get_document("$group").unwrap();
        for key in ["total_bet", "total_turnover", "average_payout", "total_count", "positive_win"] {
            assert!(group.contains_key(key), "missing {}", key);
        }
    }
}
