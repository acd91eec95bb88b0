//! Metric Store Adapter - read-only access to per-day rollups.
//!
//! The concrete store is an external collaborator; this trait is the read
//! contract the orchestrator fetches through. Implementations may block or
//! fail — the orchestrator wraps every call in a bounded timeout and treats
//! a timeout as data-unavailable for that family.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::StoreError;
use crate::types::{AnalyticsDailyRollup, PageCheck, SearchDailyRollup, SiteFixture};

/// Read contract for daily rollups and page checks.
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Search-visibility rollups for an inclusive date range.
    async fn fetch_search_rollups(
        &self,
        site_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SearchDailyRollup>, StoreError>;

    /// Analytics rollups for an inclusive date range.
    async fn fetch_analytics_rollups(
        &self,
        site_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AnalyticsDailyRollup>, StoreError>;

    /// Page-level technical checks for an inclusive date range.
    async fn fetch_page_checks(
        &self,
        site_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PageCheck>, StoreError>;
}

/// In-memory metric store backed by a [`SiteFixture`].
///
/// Used by tests and the `diagnose` binary; a production deployment plugs a
/// database-backed implementation into the same trait.
pub struct InMemoryMetricStore {
    fixture: SiteFixture,
}

impl InMemoryMetricStore {
    pub fn new(fixture: SiteFixture) -> Self {
        Self { fixture }
    }

    fn check_site(&self, site_id: &str) -> Result<(), StoreError> {
        if self.fixture.site_id == site_id {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!(
                "no data for site '{site_id}'"
            )))
        }
    }
}

#[async_trait]
impl MetricStore for InMemoryMetricStore {
    async fn fetch_search_rollups(
        &self,
        site_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SearchDailyRollup>, StoreError> {
        self.check_site(site_id)?;
        Ok(self
            .fixture
            .search
            .iter()
            .filter(|r| r.date >= start && r.date <= end)
            .cloned()
            .collect())
    }

    async fn fetch_analytics_rollups(
        &self,
        site_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AnalyticsDailyRollup>, StoreError> {
        self.check_site(site_id)?;
        Ok(self
            .fixture
            .analytics
            .iter()
            .filter(|r| r.date >= start && r.date <= end)
            .cloned()
            .collect())
    }

    async fn fetch_page_checks(
        &self,
        site_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PageCheck>, StoreError> {
        self.check_site(site_id)?;
        Ok(self
            .fixture
            .checks
            .iter()
            .filter(|c| c.date >= start && c.date <= end)
            .cloned()
            .collect())
    }
}
