//! Usage-event append and the windowed counts the ledger gates on.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};

use quillgate_core::quota::UsageCategory;
use quillgate_core::service::Service;
use quillgate_core::usage::{UsageEvent, UsageReportFilter, UsageReportRow};

use crate::backend::format_ts;
use crate::DuckDbBackend;

impl DuckDbBackend {
    /// Append one usage event.
    ///
    /// Single-row insert, no unique constraints to conflict on — concurrent
    /// appends from many workers serialize only on the connection mutex.
    /// Rows are never updated or deleted afterwards.
    pub async fn append_usage(&self, event: &UsageEvent) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO usage_events ( \
                id, user_id, service, category, provider, model, \
                input_tokens, output_tokens, cost_minor_units, created_at \
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            duckdb::params![
                event.id,
                event.user_id,
                event.service.as_str(),
                event.category.as_str(),
                event.provider,
                event.model,
                event.input_tokens,
                event.output_tokens,
                event.cost_minor_units,
                format_ts(event.created_at),
            ],
        )?;
        Ok(())
    }

    /// Count events for one (user, service, category). `since = None` counts
    /// all-time; otherwise counts rows with `created_at >= since`.
    ///
    /// Served by the (user_id, service, category, created_at) index; quota is
    /// recomputed from the log on every check instead of trusting a counter.
    pub async fn count_usage(
        &self,
        user_id: &str,
        service: Service,
        category: UsageCategory,
        since: Option<DateTime<Utc>>,
    ) -> Result<i64> {
        let conn = self.conn.lock().await;
        let count: i64 = match since {
            Some(since) => conn
                .prepare(
                    "SELECT COUNT(*) FROM usage_events \
                     WHERE user_id = ?1 AND service = ?2 AND category = ?3 \
                     AND created_at >= ?4",
                )?
                .query_row(
                    duckdb::params![
                        user_id,
                        service.as_str(),
                        category.as_str(),
                        format_ts(since)
                    ],
                    |row| row.get(0),
                )?,
            None => conn
                .prepare(
                    "SELECT COUNT(*) FROM usage_events \
                     WHERE user_id = ?1 AND service = ?2 AND category = ?3",
                )?
                .query_row(
                    duckdb::params![user_id, service.as_str(), category.as_str()],
                    |row| row.get(0),
                )?,
        };
        Ok(count)
    }

    /// Windowed count across every windowed category for one (user, service).
    /// `content_creation` is excluded — it has its own all-time cap and must
    /// not double-charge the aggregate.
    pub async fn count_usage_total(
        &self,
        user_id: &str,
        service: Service,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        let conn = self.conn.lock().await;
        let count: i64 = conn
            .prepare(
                "SELECT COUNT(*) FROM usage_events \
                 WHERE user_id = ?1 AND service = ?2 \
                 AND category <> 'content_creation' \
                 AND created_at >= ?3",
            )?
            .query_row(
                duckdb::params![user_id, service.as_str(), format_ts(since)],
                |row| row.get(0),
            )?;
        Ok(count)
    }

    /// Reporting aggregation for the administration surface: one row per
    /// (day, service, category, provider, model) in the date range.
    pub async fn usage_report(&self, filter: &UsageReportFilter) -> Result<Vec<UsageReportRow>> {
        let conn = self.conn.lock().await;

        let start = filter
            .start_date
            .and_hms_opt(0, 0, 0)
            .expect("midnight is a valid time")
            .and_utc();
        // End date is inclusive: scan up to the following midnight.
        let end = (filter.end_date + Duration::days(1))
            .and_hms_opt(0, 0, 0)
            .expect("midnight is a valid time")
            .and_utc();

        let mut sql = String::from(
            "SELECT CAST(CAST(created_at AS DATE) AS VARCHAR) AS day, \
                    service, category, provider, model, \
                    COUNT(*), SUM(input_tokens), SUM(output_tokens), SUM(cost_minor_units) \
             FROM usage_events \
             WHERE created_at >= ?1 AND created_at < ?2",
        );
        let mut params: Vec<Box<dyn duckdb::types::ToSql>> =
            vec![Box::new(format_ts(start)), Box::new(format_ts(end))];
        if let Some(service) = filter.service {
            sql.push_str(" AND service = ?3");
            params.push(Box::new(service.as_str().to_string()));
        }
        sql.push_str(" GROUP BY 1, 2, 3, 4, 5 ORDER BY 1, 2, 3, 4, 5");

        let param_refs: Vec<&dyn duckdb::types::ToSql> =
            params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            Ok(UsageReportRow {
                day: row.get(0)?,
                service: row.get(1)?,
                category: row.get(2)?,
                provider: row.get(3)?,
                model: row.get(4)?,
                calls: row.get(5)?,
                input_tokens: row.get(6)?,
                output_tokens: row.get(7)?,
                cost_minor_units: row.get(8)?,
            })
        })?;

        let mut report = Vec::new();
        for row in rows {
            report.push(row?);
        }
        Ok(report)
    }
}
