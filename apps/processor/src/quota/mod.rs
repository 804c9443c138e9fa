//! Upload quota for free-tier callers.
//!
//! The upload count lives in an injected `KeyValueStore` under `uploadCount`.
//! Paid tiers skip the check entirely; the count is bumped after every
//! successful run for callers that are neither premium nor basic.

pub mod store;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::quota::store::{KeyValueStore, StoreError};

pub const UPLOAD_COUNT_KEY: &str = "uploadCount";
pub const DEFAULT_FREE_UPLOAD_LIMIT: u32 = 1;

/// The caller's subscription plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanTier {
    #[default]
    Free,
    Basic,
    OneDay,
    Premium,
    Enterprise,
}

impl PlanTier {
    /// Every paid tier uploads without limit.
    pub fn has_unlimited_uploads(self) -> bool {
        !matches!(self, PlanTier::Free)
    }

    /// Whether a successful run increments the stored upload count.
    pub fn counts_uploads(self) -> bool {
        !matches!(self, PlanTier::Premium | PlanTier::Basic)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Basic => "basic",
            PlanTier::OneDay => "one-day",
            PlanTier::Premium => "premium",
            PlanTier::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown plan tier '{0}' (expected free, basic, one-day, premium or enterprise)")]
pub struct UnknownTier(String);

impl FromStr for PlanTier {
    type Err = UnknownTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(PlanTier::Free),
            "basic" => Ok(PlanTier::Basic),
            "one-day" | "oneday" | "trial" => Ok(PlanTier::OneDay),
            "premium" => Ok(PlanTier::Premium),
            "enterprise" => Ok(PlanTier::Enterprise),
            other => Err(UnknownTier(other.to_string())),
        }
    }
}

/// Reads and updates the persisted upload count.
#[derive(Clone)]
pub struct UploadQuota {
    store: Arc<dyn KeyValueStore>,
    free_limit: u32,
}

impl UploadQuota {
    pub fn new(store: Arc<dyn KeyValueStore>, free_limit: u32) -> Self {
        Self { store, free_limit }
    }

    pub fn free_limit(&self) -> u32 {
        self.free_limit
    }

    /// Stored count. A missing or unparseable value counts as zero.
    pub fn upload_count(&self) -> Result<u32, StoreError> {
        let raw = self.store.get(UPLOAD_COUNT_KEY)?;
        Ok(raw.and_then(|v| v.trim().parse().ok()).unwrap_or(0))
    }

    /// Whether `tier` may start another run.
    pub fn allows(&self, tier: PlanTier) -> Result<bool, StoreError> {
        if tier.has_unlimited_uploads() {
            return Ok(true);
        }
        Ok(self.upload_count()? < self.free_limit)
    }

    /// Records a successful run. Returns the new count, or `None` when `tier`
    /// is not counted.
    pub fn record_upload(&self, tier: PlanTier) -> Result<Option<u32>, StoreError> {
        if !tier.counts_uploads() {
            debug!("Upload not counted for {tier} tier");
            return Ok(None);
        }
        let count = self.upload_count()?.saturating_add(1);
        self.store.set(UPLOAD_COUNT_KEY, &count.to_string())?;
        debug!("Upload count is now {count}");
        Ok(Some(count))
    }

    /// Like `allows`, but a store failure is logged and treated as an empty count.
    pub(crate) fn allows_or_default(&self, tier: PlanTier) -> bool {
        self.allows(tier).unwrap_or_else(|e| {
            warn!("Could not read upload count, assuming none: {e}");
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quota::store::MemoryStore;

    fn quota_with_count(count: Option<&str>) -> UploadQuota {
        let store = Arc::new(MemoryStore::new());
        if let Some(count) = count {
            store.set(UPLOAD_COUNT_KEY, count).unwrap();
        }
        UploadQuota::new(store, DEFAULT_FREE_UPLOAD_LIMIT)
    }

    #[test]
    fn test_free_tier_first_upload_allowed() {
        let quota = quota_with_count(None);
        assert!(quota.allows(PlanTier::Free).unwrap());
    }

    #[test]
    fn test_free_tier_blocked_at_limit() {
        let quota = quota_with_count(Some("1"));
        assert!(!quota.allows(PlanTier::Free).unwrap());
    }

    #[test]
    fn test_paid_tiers_bypass_limit() {
        let quota = quota_with_count(Some("40"));
        for tier in [
            PlanTier::Basic,
            PlanTier::OneDay,
            PlanTier::Premium,
            PlanTier::Enterprise,
        ] {
            assert!(quota.allows(tier).unwrap(), "{tier} should bypass the quota");
        }
    }

    #[test]
    fn test_garbage_count_reads_as_zero() {
        let quota = quota_with_count(Some("NaN"));
        assert_eq!(quota.upload_count().unwrap(), 0);
    }

    #[test]
    fn test_record_upload_counts_free_but_not_premium_or_basic() {
        let quota = quota_with_count(None);
        assert_eq!(quota.record_upload(PlanTier::Free).unwrap(), Some(1));
        assert_eq!(quota.record_upload(PlanTier::Premium).unwrap(), None);
        assert_eq!(quota.record_upload(PlanTier::Basic).unwrap(), None);
        assert_eq!(quota.record_upload(PlanTier::Enterprise).unwrap(), Some(2));
        assert_eq!(quota.upload_count().unwrap(), 2);
    }

    #[test]
    fn test_tier_parsing() {
        assert_eq!("Premium".parse::<PlanTier>().unwrap(), PlanTier::Premium);
        assert_eq!("trial".parse::<PlanTier>().unwrap(), PlanTier::OneDay);
        assert!("gold".parse::<PlanTier>().is_err());
    }
}
