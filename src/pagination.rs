use serde::Serialize;

use crate::error::ValidationErrors;

pub const DEFAULT_PER_PAGE: i64 = 15;
pub const MAX_PER_PAGE: i64 = 100;

/// One-based page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub per_page: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PageRequest {
    /// Parses raw `page` / `per_page` values. Out-of-range values are
    /// rejected, never clamped.
    pub fn parse(page: Option<&str>, per_page: Option<&str>) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut request = Self::default();

        if let Some(raw) = per_page {
            match raw.trim().parse::<i64>() {
                Ok(n) if (1..=MAX_PER_PAGE).contains(&n) => request.per_page = n,
                Ok(_) => errors.add(
                    "per_page",
                    format!("The per page field must be between 1 and {MAX_PER_PAGE}."),
                ),
                Err(_) => errors.add("per_page", "The per page field must be an integer."),
            }
        }

        if let Some(raw) = page {
            match raw.trim().parse::<i64>() {
                Ok(n) if n >= 1 => request.page = n,
                Ok(_) => errors.add("page", "The page field must be at least 1."),
                Err(_) => errors.add("page", "The page field must be an integer."),
            }
        }

        if errors.is_empty() {
            Ok(request)
        } else {
            Err(errors)
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub current_page: i64,
    pub per_page: i64,
    pub total: i64,
    pub last_page: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: i64) -> Self {
        let last_page = ((total + request.per_page - 1) / request.per_page).max(1);
        Self {
            items,
            current_page: request.page,
            per_page: request.per_page,
            total,
            last_page,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            current_page: self.current_page,
            per_page: self.per_page,
            total: self.total,
            last_page: self.last_page,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PageMeta {
    pub current_page: i64,
    pub per_page: i64,
    pub total: i64,
    pub last_page: i64,
}

/// Listing envelope: `{ "data": [...], "meta": {...} }`.
#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> From<Page<T>> for PageResponse<T> {
    fn from(page: Page<T>) -> Self {
        Self {
            meta: PageMeta {
                current_page: page.current_page,
                per_page: page.per_page,
                total: page.total,
                last_page: page.last_page,
            },
            data: page.items,
        }
    }
}
