//! Output filters applied by `fig:filter`

use std::collections::HashMap;
use std::sync::Arc;

/// Transforms the rendered content of a tag
pub trait Filter: Send + Sync {
    fn transform(&self, input: &str) -> String;
}

impl<F> Filter for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn transform(&self, input: &str) -> String {
        self(input)
    }
}

/// Resolves filter names
pub trait FilterFactory: Send + Sync {
    fn create(&self, name: &str) -> Option<Arc<dyn Filter>>;
}

/// Factory backed by a name → filter map
#[derive(Default, Clone)]
pub struct FilterMap {
    filters: HashMap<String, Arc<dyn Filter>>,
}

impl FilterMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<F: Filter + 'static>(&mut self, name: &str, filter: F) -> &mut Self {
        self.filters.insert(name.to_string(), Arc::new(filter));
        self
    }
}

impl FilterFactory for FilterMap {
    fn create(&self, name: &str) -> Option<Arc<dyn Filter>> {
        self.filters.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_filters() {
        let mut filters = FilterMap::new();
        filters.insert("upper", |s: &str| s.to_uppercase());
        let filter = filters.create("upper").unwrap();
        assert_eq!(filter.transform("abc"), "ABC");
        assert!(filters.create("lower").is_none());
    }
}
