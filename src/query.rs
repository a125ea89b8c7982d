use crate::table::{Row, Table};

/// Split a search string into lowercase keywords.
///
/// Keywords are comma separated; surrounding whitespace and empty entries
/// are dropped.
pub fn parse_keywords(search: &str) -> Vec<String> {
    search
        .split(',')
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

/// Parse a page or page size query value, clamping to at least 1.
pub fn parse_positive(raw: Option<&str>, default: usize) -> usize {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .map(|n| n.max(1) as usize)
        .unwrap_or_else(|| default.max(1))
}

/// One page of a filtered table, as shown on the dashboard.
#[derive(Debug, Clone)]
pub struct PageView {
    /// Data columns; `_id` is never listed.
    pub columns: Vec<String>,
    /// Rows on this page, each still carrying its id.
    pub rows: Vec<Row>,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub filtered_count: usize,
    pub total_count_all: usize,
}

/// Filter `table` by `search` and cut out page `page` of size `page_size`.
///
/// Pages are 1-based; a page past the end is empty rather than an error.
pub fn view(table: &Table, search: &str, page: usize, page_size: usize) -> PageView {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let filtered = table.filtered(&parse_keywords(search));
    let filtered_count = filtered.len();

    PageView {
        columns: table.columns().to_vec(),
        rows: filtered
            .slice((page - 1).saturating_mul(page_size), page_size)
            .to_vec(),
        page,
        page_size,
        total_pages: filtered_count.div_ceil(page_size).max(1),
        filtered_count,
        total_count_all: table.len(),
    }
}
