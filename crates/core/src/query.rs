//! Listing query inputs: filters, pagination, sorting, and the page shape returned.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::ValueObject;

/// Filter criteria for the listing query.
///
/// Absent fields are omitted from the request entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub profession: Option<String>,
}

impl ValueObject for FilterCriteria {}

impl FilterCriteria {
    pub fn new(
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        profession: Option<String>,
    ) -> Self {
        Self { start_date, end_date, profession }.normalized()
    }

    /// Blank profession text means "no profession filter".
    pub fn normalized(mut self) -> Self {
        self.profession = self
            .profession
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.start_date.is_none() && self.end_date.is_none() && self.profession.is_none()
    }

    /// Query-string pairs in wire format (`yyyy-MM-dd` dates).
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(3);
        if let Some(d) = self.start_date {
            pairs.push(("startDate", d.format("%Y-%m-%d").to_string()));
        }
        if let Some(d) = self.end_date {
            pairs.push(("endDate", d.format("%Y-%m-%d").to_string()));
        }
        if let Some(p) = &self.profession {
            pairs.push(("profession", p.clone()));
        }
        pairs
    }
}

/// Offset/limit pagination with the server-reported total.
///
/// `offset` is always a multiple of the limit in force when it was set.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPagination")]
pub struct Pagination {
    offset: u64,
    limit: u32,
    total: u64,
}

#[derive(Deserialize)]
struct RawPagination {
    offset: u64,
    limit: u32,
    total: u64,
}

impl TryFrom<RawPagination> for Pagination {
    type Error = DomainError;

    fn try_from(raw: RawPagination) -> DomainResult<Self> {
        let fresh = Self::new(raw.limit)?;
        if raw.offset % u64::from(raw.limit) != 0 {
            return Err(DomainError::validation("offset must be a multiple of the page size"));
        }
        Ok(Self { offset: raw.offset, total: raw.total, ..fresh })
    }
}

impl ValueObject for Pagination {}

impl Pagination {
    pub const DEFAULT_LIMIT: u32 = 10;

    /// Page sizes offered to the user.
    pub const PAGE_SIZE_OPTIONS: [u32; 3] = [10, 25, 50];

    pub fn new(limit: u32) -> DomainResult<Self> {
        if limit == 0 {
            return Err(DomainError::validation("page size must be greater than zero"));
        }
        Ok(Self { offset: 0, limit, total: 0 })
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Zero-based page index (`offset / limit`).
    pub fn page(&self) -> u64 {
        self.offset / u64::from(self.limit)
    }

    pub fn page_count(&self) -> u64 {
        self.total.div_ceil(u64::from(self.limit))
    }

    /// Move to a zero-based page under the current limit.
    pub fn with_page(self, page: u64) -> DomainResult<Self> {
        let offset = page
            .checked_mul(u64::from(self.limit))
            .ok_or_else(|| DomainError::validation(format!("page {page} is out of range")))?;
        Ok(Self { offset, ..self })
    }

    pub fn first_page(self) -> Self {
        Self { offset: 0, ..self }
    }

    /// Change the page size. Always resets to the first page.
    pub fn with_limit(self, limit: u32) -> DomainResult<Self> {
        let fresh = Self::new(limit)?;
        Ok(Self { total: self.total, ..fresh })
    }

    pub fn with_total(self, total: u64) -> Self {
        Self { total, ..self }
    }

    /// Same position, ignoring the server-reported total.
    pub fn same_window(&self, other: &Self) -> bool {
        self.offset == other.offset && self.limit == other.limit
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self { offset: 0, limit: Self::DEFAULT_LIMIT, total: 0 }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Optional server-side ordering (`sortBy` / `sortDirection`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub by: String,
    pub direction: SortDirection,
}

impl ValueObject for SortOrder {}

impl SortOrder {
    pub fn query_pairs(&self) -> [(&'static str, String); 2] {
        [
            ("sortBy", self.by.clone()),
            ("sortDirection", self.direction.as_str().to_string()),
        ]
    }
}

/// One page of a listing (the subset of the API page body the client reads).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_elements: u64,
}
