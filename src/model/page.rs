use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_LIMIT: u64 = 50;
pub const MAX_LIMIT: u64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Offset/limit window over a listing ordered by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(default)]
pub struct PageRequest {
    /// Number of matching records to skip.
    pub offset: u64,
    /// Page size, `1..=200`.
    pub limit: u64,
    /// Id ordering, ascending unless `desc`.
    pub order: SortOrder,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_LIMIT,
            order: SortOrder::Asc,
        }
    }
}

/// One page of a listing plus the total number of matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

impl<T> Page<T> {
    /// Whether more matches exist after this page.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.offset.saturating_add(self.items.len() as u64) < self.total
    }

    /// Request for the page that follows this one, if any.
    #[must_use]
    pub fn next(&self, order: SortOrder) -> Option<PageRequest> {
        self.has_more().then(|| PageRequest {
            offset: self.offset + self.items.len() as u64,
            limit: self.limit,
            order,
        })
    }
}
