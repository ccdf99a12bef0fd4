const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;

/// Pagination parameters for listing persisted runs.
///
/// Results are ordered by start time, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunQuery {
    pub limit: usize,
    pub offset: usize,
}

/// One page of a run listing.
#[derive(Debug, Clone)]
pub struct RunPage<T> {
    pub items: Vec<T>,
    /// Number of stored runs, independent of pagination.
    pub total: usize,
}

impl RunQuery {
    pub fn new() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }

    /// Set page size, clamped to `1..=100`.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.clamp(1, MAX_LIMIT);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

impl Default for RunQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RunPage<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}
