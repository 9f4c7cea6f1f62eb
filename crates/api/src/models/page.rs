//! Pagination parameters and envelopes.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Default page size.
pub const DEFAULT_PER_PAGE: i64 = 24;

/// Largest page size a client may ask for.
pub const MAX_PER_PAGE: i64 = 100;

/// Raw `page` / `per_page` query values.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Validated pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl PageParams {
    /// Validate and fill in defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if `page < 1` or `per_page` is outside
    /// `1..=100`.
    pub fn resolve(self) -> Result<Pagination, AppError> {
        let page = self.page.unwrap_or(1);
        if page < 1 {
            return Err(AppError::BadRequest("page must be at least 1".to_string()));
        }
        let per_page = self.per_page.unwrap_or(DEFAULT_PER_PAGE);
        if !(1..=MAX_PER_PAGE).contains(&per_page) {
            return Err(AppError::BadRequest(format!(
                "per_page must be between 1 and {MAX_PER_PAGE}"
            )));
        }
        Ok(Pagination { page, per_page })
    }
}

impl Pagination {
    /// SQL `LIMIT`.
    #[must_use]
    pub const fn limit(self) -> i64 {
        self.per_page
    }

    /// SQL `OFFSET`.
    #[must_use]
    pub const fn offset(self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
}

impl<T> Page<T> {
    #[must_use]
    pub const fn new(items: Vec<T>, pagination: Pagination, total: i64) -> Self {
        Self {
            items,
            page: pagination.page,
            per_page: pagination.per_page,
            total,
        }
    }

    /// Convert every item, keeping the page metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = PageParams::default().resolve().unwrap();
        assert_eq!(p, Pagination { page: 1, per_page: 24 });
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_offset() {
        let p = PageParams { page: Some(3), per_page: Some(10) }.resolve().unwrap();
        assert_eq!(p.offset(), 20);
        assert_eq!(p.limit(), 10);
    }

    #[test]
    fn test_bounds() {
        assert!(PageParams { page: Some(0), per_page: None }.resolve().is_err());
        assert!(PageParams { page: None, per_page: Some(0) }.resolve().is_err());
        assert!(PageParams { page: None, per_page: Some(101) }.resolve().is_err());
        assert!(PageParams { page: None, per_page: Some(100) }.resolve().is_ok());
    }
}
