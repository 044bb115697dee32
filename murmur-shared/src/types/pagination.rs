use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult, ErrorCode};

pub const MAX_PAGE_SIZE: u64 = 100;

/// Highest page whose offset still fits a signed 64-bit SQL OFFSET.
pub const MAX_PAGE: u64 = i64::MAX as u64 / MAX_PAGE_SIZE;

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_size")]
    pub size: u64,
}

fn default_page() -> u64 { 1 }
fn default_size() -> u64 { 15 }

impl PaginationParams {
    pub fn new(page: u64, size: u64) -> Self {
        Self { page, size }
    }

    /// Pages are 1-based up to `MAX_PAGE`; the size must lie in `1..=MAX_PAGE_SIZE`.
    pub fn validate(&self) -> AppResult<()> {
        if self.page < 1 || self.page > MAX_PAGE {
            return Err(AppError::new(
                ErrorCode::ValidationError,
                format!("page must be between 1 and {MAX_PAGE}"),
            ));
        }
        if self.size < 1 || self.size > MAX_PAGE_SIZE {
            return Err(AppError::new(
                ErrorCode::ValidationError,
                format!("size must be between 1 and {MAX_PAGE_SIZE}"),
            ));
        }
        Ok(())
    }

    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit())
    }

    pub fn limit(&self) -> u64 {
        self.size.clamp(1, MAX_PAGE_SIZE)
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: default_page(), size: default_size() }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Paginated<T: Serialize> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub size: u64,
    pub pages: u64,
}

impl<T: Serialize> Paginated<T> {
    pub fn new(items: Vec<T>, total: u64, params: &PaginationParams) -> Self {
        let size = params.limit();
        let pages = if total == 0 { 0 } else { total.div_ceil(size) };
        Self {
            items,
            total,
            page: params.page,
            size,
            pages,
        }
    }

    pub fn empty(params: &PaginationParams) -> Self {
        Self::new(Vec::new(), 0, params)
    }
}
