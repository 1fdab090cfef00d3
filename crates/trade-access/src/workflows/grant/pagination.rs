use serde::Serialize;
use serde_json::json;

pub(crate) const PAGE_SIZE: usize = 25;

/// Pagination is opt-in: without a `page` query parameter the collection is
/// returned as a bare array; with one, the response gains `total_pages`.
pub(crate) fn paginate<T: Serialize>(items: Vec<T>, page: Option<usize>) -> serde_json::Value {
    match page {
        None => json!(items),
        Some(page) => {
            let total_pages = items.len().div_ceil(PAGE_SIZE).max(1);
            let page = page.max(1);
            let start = (page - 1).saturating_mul(PAGE_SIZE);
            let window: Vec<&T> = items.iter().skip(start).take(PAGE_SIZE).collect();
            json!({
                "results": window,
                "total_pages": total_pages,
            })
        }
    }
}
