//! Paged and cursor-paged results.

use base64ct::{Base64UrlUnpadded, Encoding};

use crate::DataType;
use crate::error::{Error, Result};

/// One page of an offset-paged query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagedList<T> {
    /// Rows on this page, in query order.
    pub items: Vec<T>,
    /// One-based page index.
    pub page: u64,
    /// Requested page size; the last page may hold fewer items.
    pub items_per_page: u64,
    /// Rows matching the query across all pages.
    pub total_items: u64,
}

impl<T> PagedList<T> {
    /// Number of pages needed to hold `total_items`.
    #[must_use]
    pub const fn total_pages(&self) -> u64 {
        if self.items_per_page == 0 {
            return 0;
        }
        self.total_items.div_ceil(self.items_per_page)
    }

    /// Whether a page follows this one.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }
}

/// One page of a cursor-paged query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorPage<T> {
    /// Rows on this page, in sort order.
    pub items: Vec<T>,
    /// Maximum rows per page.
    pub page_size: u64,
    /// More rows follow the last item.
    pub has_next: bool,
    /// Token for the following page, present when `has_next` is set.
    pub next_cursor: Option<String>,
}

/// Encode a sort value as an opaque cursor token.
///
/// # Errors
///
/// Returns [`Error::InvalidCursor`] if the value cannot be serialized.
pub fn encode_cursor(value: &DataType) -> Result<String> {
    let json = serde_json::to_vec(value).map_err(|e| Error::InvalidCursor(e.to_string()))?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

/// Decode a token produced by [`encode_cursor`].
///
/// # Errors
///
/// Returns [`Error::InvalidCursor`] if the token is not valid base64 or does
/// not hold a value.
pub fn decode_cursor(token: &str) -> Result<DataType> {
    let json = Base64UrlUnpadded::decode_vec(token)
        .map_err(|e| Error::InvalidCursor(format!("cursor is not base64url: {e}")))?;
    let value: DataType = serde_json::from_slice(&json)
        .map_err(|e| Error::InvalidCursor(format!("cursor does not hold a value: {e}")))?;
    if value.is_null() {
        return Err(Error::InvalidCursor("cursor value is null".to_string()));
    }
    Ok(value)
}
