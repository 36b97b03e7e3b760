use serde::{Deserialize, Serialize};

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

/// `page` (0-based) and `size` query parameters for paginated listings.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub size: Option<i64>,
}

impl PageParams {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(0).max(0)
    }

    pub fn size(&self) -> i64 {
        self.size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        // Caller-supplied page numbers can be arbitrarily large; an
        // absurd page must read past the end, not overflow.
        self.page().saturating_mul(self.size())
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: i64,
    pub size: i64,
    pub total_elements: i64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, params: &PageParams, total_elements: i64) -> Self {
        Self {
            content,
            page: params.page(),
            size: params.size(),
            total_elements,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let params = PageParams::default();
        assert_eq!(params.page(), 0);
        assert_eq!(params.size(), DEFAULT_PAGE_SIZE);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn size_is_clamped_and_negative_page_floored() {
        let params = PageParams {
            page: Some(-3),
            size: Some(10_000),
        };
        assert_eq!(params.page(), 0);
        assert_eq!(params.size(), MAX_PAGE_SIZE);
    }

    #[test]
    fn offset_saturates_instead_of_overflowing() {
        let params = PageParams {
            page: Some(i64::MAX),
            size: Some(100),
        };
        assert_eq!(params.offset(), i64::MAX);

        let params = PageParams {
            page: Some(i64::MAX / 2),
            size: Some(MAX_PAGE_SIZE),
        };
        assert_eq!(params.offset(), i64::MAX);
    }

    #[test]
    fn offset_multiplies_page_by_size() {
        let params = PageParams {
            page: Some(3),
            size: Some(25),
        };
        assert_eq!(params.offset(), 75);
    }
}
