use serde::{Deserialize, Serialize};

use crate::config::ApiConfig;

/// `?page=&per_page=` on list endpoints. Pages are 1-based.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Resolved window after clamping to configured limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub per_page: u32,
}

impl PageWindow {
    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.per_page as i64
    }
}

impl ListQuery {
    pub fn window(&self, api: &ApiConfig) -> PageWindow {
        let per_page = self
            .per_page
            .unwrap_or(api.default_page_size)
            .clamp(1, api.max_page_size.max(1));
        let page = self.page.unwrap_or(1).max(1);
        PageWindow { page, per_page }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T: Serialize> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

impl<T: Serialize> Page<T> {
    pub fn new(items: Vec<T>, window: PageWindow, total: i64) -> Self {
        Self {
            items,
            page: window.page,
            per_page: window.per_page,
            total,
        }
    }
}
