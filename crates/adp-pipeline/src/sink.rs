//! Postgres append-write sink for loaded rows

use crate::error::Result;
use crate::load::{AisRow, RecordSink};
use adp_common::TableRef;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tokio::sync::Mutex;

/// Appends loaded rows to a Postgres table.
///
/// All appends between `begin` and `commit` run on one transaction, so a file
/// interrupted mid-append leaves no rows behind.
#[derive(Debug)]
pub struct PgRecordSink {
    pool: PgPool,
    txn: Mutex<Option<Transaction<'static, Postgres>>>,
}

impl PgRecordSink {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            txn: Mutex::new(None),
        }
    }
}

impl RecordSink for PgRecordSink {
    async fn ensure_table(&self, table: &TableRef) -> Result<()> {
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", table.schema))
            .execute(&self.pool)
            .await?;

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                mmsi text,
                base_date_time text,
                event_ts timestamp,
                latitude double precision,
                longitude double precision,
                sog double precision,
                cog double precision,
                vessel_name text
            )",
            table.qualified()
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn begin(&self) -> Result<()> {
        let mut guard = self.txn.lock().await;
        if guard.is_none() {
            *guard = Some(self.pool.begin().await?);
        }
        Ok(())
    }

    async fn append(&self, table: &TableRef, rows: &[AisRow]) -> Result<u64> {
        let mut guard = self.txn.lock().await;
        let txn = guard
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("append called with no open write transaction"))?;

        let mut total = 0u64;
        // Stay well under the bind-parameter limit per statement.
        for chunk in rows.chunks(1000) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                "INSERT INTO {} (mmsi, base_date_time, event_ts, latitude, longitude, sog, cog, vessel_name) ",
                table.qualified()
            ));
            builder.push_values(chunk, |mut b, row| {
                b.push_bind(&row.mmsi)
                    .push_bind(&row.base_date_time)
                    .push_bind(row.event_ts)
                    .push_bind(row.latitude)
                    .push_bind(row.longitude)
                    .push_bind(row.sog)
                    .push_bind(row.cog)
                    .push_bind(&row.vessel_name);
            });

            let result = builder.build().execute(&mut **txn).await?;
            total += result.rows_affected();
        }
        Ok(total)
    }

    async fn commit(&self) -> Result<()> {
        if let Some(txn) = self.txn.lock().await.take() {
            txn.commit().await?;
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        if let Some(txn) = self.txn.lock().await.take() {
            txn.rollback().await?;
        }
        Ok(())
    }
}
