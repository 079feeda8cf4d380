//! Function providers
//!
//! Expressions call functions by name. Names are resolved through an ordered
//! list of [`FunctionFactory`] implementations, most recently registered
//! first, with the built-in [`NativeFunctionFactory`] consulted last. The
//! render context memoizes each resolved name for the rest of the render.

pub mod date;
mod native;

pub use native::NativeFunctionFactory;

use crate::error::{Location, Result};
use crate::render::Iteration;
use crate::value::Value;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Calling-site information handed to every function
pub struct Anchor<'a> {
    pub location: Location,
    /// Innermost active iteration (empty outside of any walk)
    pub iteration: &'a Iteration,
    pub language: Option<&'a str>,
    /// Constants registered on the engine
    pub constants: &'a IndexMap<String, Value>,
}

/// A function callable from expressions
pub trait FigFunction: Send + Sync {
    fn evaluate(&self, anchor: &Anchor<'_>, arity: usize, args: &[Value]) -> Result<Value>;
}

impl<F> FigFunction for F
where
    F: Fn(&Anchor<'_>, usize, &[Value]) -> Result<Value> + Send + Sync,
{
    fn evaluate(&self, anchor: &Anchor<'_>, arity: usize, args: &[Value]) -> Result<Value> {
        self(anchor, arity, args)
    }
}

/// Resolves function names
pub trait FunctionFactory: Send + Sync {
    fn create(&self, name: &str) -> Option<Arc<dyn FigFunction>>;
}

/// Factory backed by a name → function map
#[derive(Default, Clone)]
pub struct FunctionMap {
    functions: HashMap<String, Arc<dyn FigFunction>>,
}

impl FunctionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<F: FigFunction + 'static>(&mut self, name: &str, function: F) -> &mut Self {
        self.functions.insert(name.to_string(), Arc::new(function));
        self
    }
}

impl FunctionFactory for FunctionMap {
    fn create(&self, name: &str) -> Option<Arc<dyn FigFunction>> {
        self.functions.get(name).cloned()
    }
}
