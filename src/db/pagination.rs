use serde::Serialize;

/// One page of an ordered result. Pages are 1-based.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub has_next: bool,
    pub has_prev: bool,
    pub next_num: Option<i64>,
    pub prev_num: Option<i64>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: i64, per_page: i64, total: i64) -> Self {
        let page = Self::clamp_page(page);
        let per_page = Self::clamp_per_page(per_page);
        let has_next = page.saturating_mul(per_page) < total;
        let has_prev = page > 1;

        Page {
            items,
            page,
            per_page,
            total,
            has_next,
            has_prev,
            next_num: has_next.then(|| page + 1),
            prev_num: has_prev.then(|| page - 1),
        }
    }

    pub fn clamp_page(page: i64) -> i64 {
        page.max(1)
    }

    pub fn clamp_per_page(per_page: i64) -> i64 {
        per_page.max(1)
    }

    pub fn offset(page: i64, per_page: i64) -> i64 {
        (Self::clamp_page(page) - 1).saturating_mul(Self::clamp_per_page(per_page))
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            has_next: self.has_next,
            has_prev: self.has_prev,
            next_num: self.next_num,
            prev_num: self.prev_num,
        }
    }
}
