use crate::models::{Page, Pagination};

/// One cached page of a listing, as shown by a list screen
#[derive(Debug, Clone, PartialEq)]
pub struct ListState<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
    pub loading: bool,
}

impl<T> Default for ListState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            pagination: Pagination {
                total: 0,
                page: 1,
                pages: 0,
                per_page: 0,
            },
            loading: false,
        }
    }
}

impl<T> ListState<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached page with a freshly fetched one
    pub fn apply(&mut self, page: Page<T>) {
        self.items = page.data;
        self.pagination = page.pagination;
    }

    /// Drop cached items matching `pred`, e.g. after a delete
    pub fn remove_where(&mut self, pred: impl Fn(&T) -> bool) -> usize {
        let before = self.items.len();
        self.items.retain(|item| !pred(item));
        before - self.items.len()
    }

    /// Mutate the first cached item matching `pred` in place
    pub fn update_where(&mut self, pred: impl Fn(&T) -> bool, update: impl FnOnce(&mut T)) -> bool {
        match self.items.iter_mut().find(|item| pred(item)) {
            Some(item) => {
                update(item);
                true
            }
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
