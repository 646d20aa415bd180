//! Paginated response envelope shared by list endpoints

use serde::{Deserialize, Serialize};

/// A page of results. `total_size` is the count of items matching the query
/// before pagination was applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    pub contents: Vec<T>,
    pub start: usize,
    pub size: usize,
    pub total_size: usize,
}

impl<T> PaginatedResponse<T> {
    pub fn new(contents: Vec<T>, start: usize, total_size: usize) -> Self {
        let size = contents.len();
        Self {
            contents,
            start,
            size,
            total_size,
        }
    }
}
