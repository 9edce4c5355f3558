use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait};
use tracing::{info, warn};

use crate::{
    config::{AppConfig, DEFAULT_EXPIRY_CRITICAL_DAYS, DEFAULT_EXPIRY_WARNING_DAYS},
    db::DbPool,
    entities::app_setting,
    errors::ServiceError,
};

pub const EXPIRY_WARNING_DAYS_KEY: &str = "expiry_warning_days";
pub const EXPIRY_CRITICAL_DAYS_KEY: &str = "expiry_critical_days";

/// Days-until-expiry thresholds used by admission control and the
/// near-expiry report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryWindows {
    pub warning_days: i64,
    pub critical_days: i64,
}

/// Runtime configuration lookup. Injected wherever a tunable is read so
/// callers never reach for process-global state; `invalidate` makes an
/// updated value visible immediately.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError>;
    fn invalidate(&self, key: Option<&str>);
}

/// Database-backed provider with an in-process cache. Resolution order:
/// cache, `app_settings` row, compiled default.
pub struct DbSettingsProvider {
    db: Arc<DbPool>,
    cache: DashMap<String, String>,
    defaults: HashMap<String, String>,
}

impl DbSettingsProvider {
    pub fn new(db: Arc<DbPool>, config: &AppConfig) -> Self {
        let mut defaults = HashMap::new();
        defaults.insert(
            EXPIRY_WARNING_DAYS_KEY.to_string(),
            config.expiry_warning_days.to_string(),
        );
        defaults.insert(
            EXPIRY_CRITICAL_DAYS_KEY.to_string(),
            config.expiry_critical_days.to_string(),
        );

        Self {
            db,
            cache: DashMap::new(),
            defaults,
        }
    }

    /// Writes a setting and drops the cached value so the next read sees it.
    pub async fn set(&self, key: &str, value: &str) -> Result<(), ServiceError> {
        let db = &*self.db;
        let existing = app_setting::Entity::find_by_id(key.to_string()).one(db).await?;

        match existing {
            Some(row) => {
                let mut active: app_setting::ActiveModel = row.into();
                active.setting_value = Set(value.to_string());
                active.updated_at = Set(Utc::now());
                active.update(db).await?;
            }
            None => {
                app_setting::ActiveModel {
                    setting_key: Set(key.to_string()),
                    setting_value: Set(value.to_string()),
                    description: Set(None),
                    updated_at: Set(Utc::now()),
                }
                .insert(db)
                .await?;
            }
        }

        self.invalidate(Some(key));
        info!(key, value, "setting updated");
        Ok(())
    }
}

#[async_trait]
impl SettingsProvider for DbSettingsProvider {
    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        if let Some(cached) = self.cache.get(key) {
            return Ok(Some(cached.value().clone()));
        }

        let row = app_setting::Entity::find_by_id(key.to_string())
            .one(&*self.db)
            .await?;

        if let Some(row) = row {
            self.cache.insert(key.to_string(), row.setting_value.clone());
            return Ok(Some(row.setting_value));
        }

        Ok(self.defaults.get(key).cloned())
    }

    fn invalidate(&self, key: Option<&str>) {
        match key {
            Some(key) => {
                self.cache.remove(key);
            }
            None => self.cache.clear(),
        }
    }
}

/// Resolves the expiry thresholds, falling back to compiled defaults when a
/// stored value is absent or unparseable. An inverted pair is clamped so the
/// red window never exceeds the yellow one.
pub async fn expiry_windows(provider: &dyn SettingsProvider) -> Result<ExpiryWindows, ServiceError> {
    let warning_days =
        int_setting(provider, EXPIRY_WARNING_DAYS_KEY, DEFAULT_EXPIRY_WARNING_DAYS).await?;
    let mut critical_days = int_setting(
        provider,
        EXPIRY_CRITICAL_DAYS_KEY,
        DEFAULT_EXPIRY_CRITICAL_DAYS,
    )
    .await?;

    if critical_days > warning_days {
        warn!(
            warning_days,
            critical_days, "critical window exceeds warning window, clamping"
        );
        critical_days = warning_days;
    }

    Ok(ExpiryWindows {
        warning_days,
        critical_days,
    })
}

async fn int_setting(
    provider: &dyn SettingsProvider,
    key: &str,
    default: i64,
) -> Result<i64, ServiceError> {
    match provider.get(key).await? {
        Some(raw) => match raw.trim().parse::<i64>() {
            Ok(value) if value > 0 => Ok(value),
            _ => {
                warn!(key, %raw, "unusable setting value, using default");
                Ok(default)
            }
        },
        None => Ok(default),
    }
}
