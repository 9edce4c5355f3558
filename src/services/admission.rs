use chrono::NaiveDate;

use crate::errors::ServiceError;
use crate::services::settings::ExpiryWindows;

/// Admission tier for an incoming batch, derived from days until expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryTier {
    /// Comfortably within shelf life; no action needed.
    Pass,
    /// Inside the warning window; accepted, but the operator's
    /// acknowledgement travels with the receipt.
    Warning,
    /// Inside the critical window (or no expiry date at all); blocked unless
    /// a written override reason is supplied.
    Force,
}

impl ExpiryTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpiryTier::Pass => "PASS",
            ExpiryTier::Warning => "WARNING",
            ExpiryTier::Force => "FORCE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PASS" => Some(ExpiryTier::Pass),
            "WARNING" => Some(ExpiryTier::Warning),
            "FORCE" => Some(ExpiryTier::Force),
            _ => None,
        }
    }
}

/// Classifies an expiry date against the configured windows.
///
/// A missing expiry date is treated as the worst case: the batch can only be
/// admitted with an override reason.
pub fn classify(
    expiry_date: Option<NaiveDate>,
    today: NaiveDate,
    windows: ExpiryWindows,
) -> ExpiryTier {
    let Some(expiry) = expiry_date else {
        return ExpiryTier::Force;
    };

    let days_until_expiry = (expiry - today).num_days();

    if days_until_expiry >= windows.warning_days {
        ExpiryTier::Pass
    } else if days_until_expiry >= windows.critical_days {
        ExpiryTier::Warning
    } else {
        ExpiryTier::Force
    }
}

/// Blocks a FORCE-tier receipt that carries no override reason. PASS and
/// WARNING are never blocked here.
pub fn enforce(tier: ExpiryTier, override_reason: Option<&str>) -> Result<(), ServiceError> {
    if tier == ExpiryTier::Force
        && override_reason.map(str::trim).unwrap_or_default().is_empty()
    {
        return Err(ServiceError::ValidationError(
            "shelf life is inside the critical window; an override reason is required".to_string(),
        ));
    }
    Ok(())
}
