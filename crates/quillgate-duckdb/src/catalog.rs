//! Plan-limits catalog queries.

use anyhow::Result;

use quillgate_core::plan::{PlanLimits, PlanTier};
use quillgate_core::service::Service;
use quillgate_metadata::PlanLimitsRecord;

use crate::DuckDbBackend;

const RECORD_COLUMNS: &str = "service, plan_tier, version, content_creation_cap, text_daily_cap, \
     image_daily_cap, total_daily_cap, premium_credit_daily_cap, standard_credit_daily_cap, \
     ai_enabled, is_active, CAST(updated_at AS VARCHAR)";

/// Row as DuckDB hands it over; enum columns still raw strings. Split from
/// [`PlanLimitsRecord`] so the row-mapping closure stays infallible for
/// duckdb's error type and enum parsing can fail with a real error.
struct RawPlanRow {
    service: String,
    plan_tier: String,
    version: i64,
    limits: PlanLimits,
    is_active: bool,
    updated_at: String,
}

fn raw_from_row(row: &duckdb::Row<'_>) -> duckdb::Result<RawPlanRow> {
    Ok(RawPlanRow {
        service: row.get(0)?,
        plan_tier: row.get(1)?,
        version: row.get(2)?,
        limits: PlanLimits {
            content_creation_cap: row.get(3)?,
            text_daily_cap: row.get(4)?,
            image_daily_cap: row.get(5)?,
            total_daily_cap: row.get(6)?,
            premium_credit_daily_cap: row.get(7)?,
            standard_credit_daily_cap: row.get(8)?,
            ai_enabled: row.get(9)?,
        },
        is_active: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

impl RawPlanRow {
    fn into_record(self) -> Result<PlanLimitsRecord> {
        Ok(PlanLimitsRecord {
            service: Service::parse(&self.service)?,
            plan_tier: PlanTier::parse(&self.plan_tier)?,
            version: self.version,
            limits: self.limits,
            is_active: self.is_active,
            updated_at: self.updated_at,
        })
    }
}

impl DuckDbBackend {
    /// The active row with the highest version for (service, tier), if any.
    pub async fn get_plan_limits(
        &self,
        service: Service,
        tier: PlanTier,
    ) -> Result<Option<PlanLimitsRecord>> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM plan_limits \
             WHERE service = ?1 AND plan_tier = ?2 AND is_active \
             ORDER BY version DESC LIMIT 1"
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map(
            duckdb::params![service.as_str(), tier.as_str()],
            raw_from_row,
        )?;
        match rows.next() {
            Some(raw) => Ok(Some(raw?.into_record()?)),
            None => Ok(None),
        }
    }

    /// Insert a new catalog version for (service, tier) and deactivate the
    /// previous ones. Runs in one transaction so readers never observe two
    /// active versions.
    pub async fn upsert_plan_limits(
        &self,
        service: Service,
        tier: PlanTier,
        limits: PlanLimits,
    ) -> Result<PlanLimitsRecord> {
        {
            let mut conn = self.conn.lock().await;
            let tx = conn.transaction()?;
            let next_version: i64 = tx
                .prepare(
                    "SELECT COALESCE(MAX(version), 0) + 1 FROM plan_limits \
                     WHERE service = ?1 AND plan_tier = ?2",
                )?
                .query_row(duckdb::params![service.as_str(), tier.as_str()], |row| {
                    row.get(0)
                })?;
            tx.execute(
                "UPDATE plan_limits SET is_active = FALSE \
                 WHERE service = ?1 AND plan_tier = ?2",
                duckdb::params![service.as_str(), tier.as_str()],
            )?;
            tx.execute(
                "INSERT INTO plan_limits ( \
                    service, plan_tier, version, content_creation_cap, text_daily_cap, \
                    image_daily_cap, total_daily_cap, premium_credit_daily_cap, \
                    standard_credit_daily_cap, ai_enabled, is_active, updated_at \
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, TRUE, CURRENT_TIMESTAMP)",
                duckdb::params![
                    service.as_str(),
                    tier.as_str(),
                    next_version,
                    limits.content_creation_cap,
                    limits.text_daily_cap,
                    limits.image_daily_cap,
                    limits.total_daily_cap,
                    limits.premium_credit_daily_cap,
                    limits.standard_credit_daily_cap,
                    limits.ai_enabled,
                ],
            )?;
            tx.commit()?;
        }

        self.get_plan_limits(service, tier)
            .await?
            .ok_or_else(|| anyhow::anyhow!("plan limits row missing after upsert"))
    }

    /// Every active catalog row for one service.
    pub async fn list_plan_limits(&self, service: Service) -> Result<Vec<PlanLimitsRecord>> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM plan_limits \
             WHERE service = ?1 AND is_active \
             ORDER BY plan_tier, version DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(duckdb::params![service.as_str()], raw_from_row)?;
        let mut records = Vec::new();
        for raw in rows {
            records.push(raw?.into_record()?);
        }
        Ok(records)
    }
}
