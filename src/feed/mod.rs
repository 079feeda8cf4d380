//! Data feeds
//!
//! A `fig:feed` tag asks the registered factories for a feed of the given
//! class, hands it the evaluated plain attributes of the tag and mounts the
//! result. Factories are queried most recently registered first.

use crate::value::Value;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Error type returned by feeds
pub type FeedError = Box<dyn std::error::Error + Send + Sync>;

/// Feed parameters, in attribute order
pub type Parameters = IndexMap<String, Value>;

/// A data provider invoked by `fig:feed`
pub trait Feed {
    fn set_parameters(&mut self, parameters: Parameters);
    fn run(&mut self) -> Result<Value, FeedError>;
}

/// Creates feeds by class name
pub trait FeedFactory: Send + Sync {
    fn create(&self, class: &str, parameters: &Parameters) -> Option<Box<dyn Feed>>;
}

type FeedFn = dyn Fn(&Parameters) -> Result<Value, FeedError> + Send + Sync;

/// Feed built from a closure
pub struct FnFeed {
    run: Arc<FeedFn>,
    parameters: Parameters,
}

impl Feed for FnFeed {
    fn set_parameters(&mut self, parameters: Parameters) {
        self.parameters = parameters;
    }

    fn run(&mut self) -> Result<Value, FeedError> {
        (self.run)(&self.parameters)
    }
}

/// Factory backed by a class → closure map
#[derive(Default, Clone)]
pub struct FeedMap {
    feeds: HashMap<String, Arc<FeedFn>>,
}

impl FeedMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<F>(&mut self, class: &str, feed: F) -> &mut Self
    where
        F: Fn(&Parameters) -> Result<Value, FeedError> + Send + Sync + 'static,
    {
        self.feeds.insert(class.to_string(), Arc::new(feed));
        self
    }
}

impl FeedFactory for FeedMap {
    fn create(&self, class: &str, _parameters: &Parameters) -> Option<Box<dyn Feed>> {
        self.feeds.get(class).map(|run| {
            Box::new(FnFeed {
                run: Arc::clone(run),
                parameters: Parameters::new(),
            }) as Box<dyn Feed>
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_map_passes_parameters() {
        let mut feeds = FeedMap::new();
        feeds.insert("Echo", |params: &Parameters| {
            Ok(params.get("value").cloned().unwrap_or_default())
        });

        let mut feed = feeds.create("Echo", &Parameters::new()).unwrap();
        let mut params = Parameters::new();
        params.insert("value".to_string(), Value::Int(7));
        feed.set_parameters(params);
        assert_eq!(feed.run().unwrap(), Value::Int(7));
        assert!(feeds.create("Other", &Parameters::new()).is_none());
    }
}
