//! Provider/model routing settings queries.

use anyhow::Result;

use quillgate_core::plan::PlanTier;
use quillgate_core::provider::Phase;
use quillgate_core::service::Service;
use quillgate_metadata::{ProviderModelSetting, UpsertProviderSettingParams};

use crate::DuckDbBackend;

struct RawSettingRow {
    service: String,
    plan_tier: String,
    phase: String,
    primary_provider: String,
    primary_model: String,
    backup_provider: String,
    backup_model: String,
    updated_at: String,
}

impl RawSettingRow {
    fn into_setting(self) -> Result<ProviderModelSetting> {
        Ok(ProviderModelSetting {
            service: Service::parse(&self.service)?,
            plan_tier: PlanTier::parse(&self.plan_tier)?,
            phase: Phase::parse(&self.phase)?,
            primary_provider: self.primary_provider,
            primary_model: self.primary_model,
            backup_provider: self.backup_provider,
            backup_model: self.backup_model,
            updated_at: self.updated_at,
        })
    }
}

fn raw_from_row(row: &duckdb::Row<'_>) -> duckdb::Result<RawSettingRow> {
    Ok(RawSettingRow {
        service: row.get(0)?,
        plan_tier: row.get(1)?,
        phase: row.get(2)?,
        primary_provider: row.get(3)?,
        primary_model: row.get(4)?,
        backup_provider: row.get(5)?,
        backup_model: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

const SETTING_COLUMNS: &str = "service, plan_tier, phase, primary_provider, primary_model, \
     backup_provider, backup_model, CAST(updated_at AS VARCHAR)";

impl DuckDbBackend {
    /// Exact-key lookup; alias resolution happens in the engine.
    pub async fn get_provider_setting(
        &self,
        service: Service,
        tier: PlanTier,
        phase: Phase,
    ) -> Result<Option<ProviderModelSetting>> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {SETTING_COLUMNS} FROM provider_model_settings \
             WHERE service = ?1 AND plan_tier = ?2 AND phase = ?3"
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map(
            duckdb::params![service.as_str(), tier.as_str(), phase.as_str()],
            raw_from_row,
        )?;
        match rows.next() {
            Some(raw) => Ok(Some(raw?.into_setting()?)),
            None => Ok(None),
        }
    }

    pub async fn upsert_provider_setting(
        &self,
        service: Service,
        tier: PlanTier,
        phase: Phase,
        params: UpsertProviderSettingParams,
    ) -> Result<ProviderModelSetting> {
        {
            let conn = self.conn.lock().await;
            conn.execute(
                "INSERT OR REPLACE INTO provider_model_settings \
                    (service, plan_tier, phase, primary_provider, primary_model, \
                     backup_provider, backup_model, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, CURRENT_TIMESTAMP)",
                duckdb::params![
                    service.as_str(),
                    tier.as_str(),
                    phase.as_str(),
                    params.primary_provider,
                    params.primary_model,
                    params.backup_provider,
                    params.backup_model,
                ],
            )?;
        }

        self.get_provider_setting(service, tier, phase)
            .await?
            .ok_or_else(|| anyhow::anyhow!("provider setting missing after upsert"))
    }

    pub async fn list_provider_settings(
        &self,
        service: Service,
    ) -> Result<Vec<ProviderModelSetting>> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {SETTING_COLUMNS} FROM provider_model_settings \
             WHERE service = ?1 ORDER BY plan_tier, phase"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(duckdb::params![service.as_str()], raw_from_row)?;
        let mut settings = Vec::new();
        for raw in rows {
            settings.push(raw?.into_setting()?);
        }
        Ok(settings)
    }
}
