//! Query builder for stored log rows.
//!
//! # Example
//!
//! ```
//! use envsensor_store::{RowQuery, Store};
//! use time::{Duration, OffsetDateTime};
//!
//! let store = Store::open_in_memory()?;
//! let yesterday = OffsetDateTime::now_utc() - Duration::hours(24);
//!
//! let query = RowQuery::new()
//!     .device("C1:2A:3B:4C:5D:6E")
//!     .since(yesterday)
//!     .limit(50);
//!
//! let rows = store.query_rows(&query)?;
//! # Ok::<(), envsensor_store::Error>(())
//! ```

use time::OffsetDateTime;

/// Filters for [`Store::query_rows`](crate::Store::query_rows).
///
/// Results are ordered by sample time, oldest first unless
/// [`newest_first`](RowQuery::newest_first) is set.
#[derive(Debug, Default, Clone)]
pub struct RowQuery {
    /// Filter by device address.
    pub device: Option<String>,
    /// Include only rows sampled at or after this time.
    pub since: Option<OffsetDateTime>,
    /// Include only rows sampled at or before this time.
    pub until: Option<OffsetDateTime>,
    /// Include only rows from this ring page.
    pub page: Option<u16>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub newest_first: bool,
}

impl RowQuery {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn device(mut self, address: &str) -> Self {
        self.device = Some(address.to_string());
        self
    }

    #[must_use]
    pub fn since(mut self, time: OffsetDateTime) -> Self {
        self.since = Some(time);
        self
    }

    #[must_use]
    pub fn until(mut self, time: OffsetDateTime) -> Self {
        self.until = Some(time);
        self
    }

    #[must_use]
    pub fn page(mut self, page: u16) -> Self {
        self.page = Some(page);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub fn newest_first(mut self) -> Self {
        self.newest_first = true;
        self
    }

    #[must_use]
    pub fn oldest_first(mut self) -> Self {
        self.newest_first = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_query_builder() {
        let now = OffsetDateTime::now_utc();
        let query = RowQuery::new()
            .device("C1:2A:3B:4C:5D:6E")
            .since(now)
            .page(7)
            .limit(10)
            .offset(5)
            .newest_first();

        assert_eq!(query.device.as_deref(), Some("C1:2A:3B:4C:5D:6E"));
        assert_eq!(query.since, Some(now));
        assert_eq!(query.page, Some(7));
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.offset, Some(5));
        assert!(query.newest_first);
        assert!(!query.oldest_first().newest_first);
    }

    #[test]
    fn test_row_query_default() {
        let query = RowQuery::default();
        assert!(query.device.is_none());
        assert!(query.until.is_none());
        assert!(!query.newest_first);
    }
}
