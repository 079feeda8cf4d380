use crate::value::Value;

/// Progress of one `fig:walk` loop
#[derive(Debug, Clone, Default)]
pub struct Iteration {
    count: usize,
    position: usize,
    key: Value,
}

impl Iteration {
    pub fn new(count: usize) -> Self {
        Self {
            count,
            ..Default::default()
        }
    }

    /// Move to the next item
    pub fn advance(&mut self, key: Value) {
        self.position += 1;
        self.key = key;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// 1-based position of the current item, 0 before the first
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn key(&self) -> &Value {
        &self.key
    }
}
