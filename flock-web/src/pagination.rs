//! Pagination for list endpoints
//!
//! Page size comes from the `list_page_size` setting.

use serde::Serialize;

/// Page position of a list response
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    /// Total number of pages
    pub total_pages: i64,
    pub page_size: i64,
    pub total_results: i64,
    /// Offset for SQL LIMIT/OFFSET query
    #[serde(skip)]
    pub offset: i64,
}

/// Clamp the requested page into `[1, total_pages]` and work out the offset
///
/// A page size below 1 is treated as 1.
///
/// ```
/// use flock_web::pagination::calculate_pagination;
///
/// // 45 sheep at 20 per page: 20 + 20 + 5
/// let p = calculate_pagination(45, 3, 20);
/// assert_eq!((p.page, p.total_pages, p.offset), (3, 3, 40));
///
/// // Past the end lands on the last page
/// assert_eq!(calculate_pagination(45, 7, 20).page, 3);
/// ```
pub fn calculate_pagination(total_results: i64, requested_page: i64, page_size: i64) -> Pagination {
    let page_size = page_size.max(1);
    let total_pages = (total_results + page_size - 1) / page_size;
    let page = requested_page.max(1).min(total_pages.max(1));

    Pagination {
        page,
        total_pages,
        page_size,
        total_results,
        offset: (page - 1) * page_size,
    }
}
