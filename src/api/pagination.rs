use serde::Deserialize;

/// `?skip=N&limit=M` query parameters for list endpoints. Repositories
/// clamp the values; out-of-range input is never an error.
#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct Pagination {
    #[serde(default)]
    pub(crate) skip: i64,
    #[serde(default = "default_page_size")]
    pub(crate) limit: i64,
}

const fn default_page_size() -> i64 {
    100
}
