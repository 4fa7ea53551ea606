//! the table of operations, built once at startup.

use std::sync::Arc;

use crate::operation::Operation;
use crate::operations;

/// operations by name and alias.
#[derive(Default)]
pub struct Registry {
    operations: Vec<Arc<dyn Operation>>,
}

impl Registry {
    /// an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// a registry holding every built-in operation.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        operations::register_builtins(&mut registry);
        registry
    }

    /// add an operation.
    pub fn register(&mut self, operation: impl Operation + 'static) -> &mut Self {
        self.operations.push(Arc::new(operation));
        self
    }

    /// the operation registered under `name` or an alias of it.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Operation>> {
        self.operations
            .iter()
            .find(|op| {
                let spec = op.spec();
                spec.name == name || spec.aliases.contains(&name)
            })
            .cloned()
    }

    /// the operation named by the longest leading run of `words`, with the
    /// number of words its name used.
    pub fn lookup(&self, words: &[String]) -> Option<(Arc<dyn Operation>, usize)> {
        (1..=words.len())
            .rev()
            .find_map(|n| self.get(&words[..n].join(" ")).map(|op| (op, n)))
    }

    /// whether `word` collides with an operation name, so it cannot be used
    /// as a host or alias.
    pub fn is_reserved(&self, word: &str) -> bool {
        self.operations.iter().any(|op| {
            let spec = op.spec();
            spec.name == word
                || spec.name.split(' ').next() == Some(word)
                || spec.aliases.contains(&word)
        })
    }

    /// every operation in registration order.
    pub fn operations(&self) -> impl Iterator<Item = &Arc<dyn Operation>> {
        self.operations.iter()
    }
}
