//! Pagination utilities for the flag listing endpoint

/// Default page size when `page` is given without `pageSize`
pub const DEFAULT_PAGE_SIZE: i64 = 25;
/// Upper bound on client-requested page sizes
pub const MAX_PAGE_SIZE: i64 = 500;

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    /// Effective page size
    pub page_size: i64,
    /// Total number of pages
    pub total_pages: i64,
    /// Offset for SQL LIMIT/OFFSET query
    pub offset: i64,
}

/// Calculate pagination metadata from total results and the requested window
///
/// Ensures the page is within valid bounds [1, total_pages] and the page
/// size within [1, MAX_PAGE_SIZE].
///
/// # Examples
/// ```
/// use vigil_server::pagination::calculate_pagination;
///
/// // 250 total results at 100/page = 3 pages (100 + 100 + 50)
/// let p = calculate_pagination(250, 2, Some(100));
/// assert_eq!(p.page, 2);
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset, 100);
///
/// // Requesting an out-of-bounds page gets clamped
/// let p = calculate_pagination(250, 99, Some(100));
/// assert_eq!(p.page, 3);
/// assert_eq!(p.offset, 200);
/// ```
pub fn calculate_pagination(total_results: i64, requested_page: i64, requested_size: Option<i64>) -> Pagination {
    let page_size = requested_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let total_pages = (total_results + page_size - 1) / page_size;
    let page = requested_page.max(1).min(total_pages.max(1));
    let offset = (page - 1) * page_size;

    Pagination {
        page,
        page_size,
        total_pages,
        offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_normal() {
        let p = calculate_pagination(250, 2, Some(100));
        assert_eq!(p.page, 2);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.offset, 100);
    }

    #[test]
    fn test_pagination_default_size() {
        let p = calculate_pagination(60, 1, None);
        assert_eq!(p.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(p.total_pages, 3);
    }

    #[test]
    fn test_pagination_out_of_bounds_high() {
        let p = calculate_pagination(150, 99, Some(100));
        assert_eq!(p.page, 2); // Clamped to last page
        assert_eq!(p.offset, 100);
    }

    #[test]
    fn test_pagination_out_of_bounds_low() {
        let p = calculate_pagination(150, 0, Some(100));
        assert_eq!(p.page, 1);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn test_pagination_empty() {
        let p = calculate_pagination(0, 1, Some(100));
        assert_eq!(p.page, 1);
        assert_eq!(p.total_pages, 0);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn test_pagination_size_clamped() {
        let p = calculate_pagination(100, 1, Some(10_000));
        assert_eq!(p.page_size, MAX_PAGE_SIZE);
        let p = calculate_pagination(100, 1, Some(0));
        assert_eq!(p.page_size, 1);
    }
}
