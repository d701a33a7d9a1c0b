use std::collections::HashMap;

type Handler<V, C> = Box<dyn Fn(V, &C) -> V + Send + Sync>;

struct FilterEntry<V, C> {
    priority: i64,
    handler: Handler<V, C>,
}

/// Deterministic replacement for ambient hook registration: handlers are
/// attached to an event name and run in (priority, registration order).
pub struct FilterRegistry<V, C> {
    filters: HashMap<String, Vec<FilterEntry<V, C>>>,
}

impl<V, C> FilterRegistry<V, C> {
    pub fn new() -> Self {
        Self {
            filters: HashMap::new(),
        }
    }

    /// Registers `handler` for `event`. Lower priorities run first; handlers
    /// sharing a priority run in the order they were added.
    pub fn add_filter<F>(&mut self, event: &str, priority: i64, handler: F)
    where
        F: Fn(V, &C) -> V + Send + Sync + 'static,
    {
        let entry = FilterEntry {
            priority,
            handler: Box::new(handler),
        };
        let handlers = self.filters.entry(event.to_string()).or_default();
        let pos = handlers
            .iter()
            .position(|e| e.priority > priority)
            .unwrap_or(handlers.len());
        handlers.insert(pos, entry);
    }

    /// Threads `value` through every handler registered for `event`. Events
    /// with no handlers return the value unchanged.
    pub fn apply(&self, event: &str, value: V, ctx: &C) -> V {
        match self.filters.get(event) {
            Some(handlers) => handlers
                .iter()
                .fold(value, |acc, entry| (entry.handler)(acc, ctx)),
            None => value,
        }
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.filters.get(event).map(|h| h.len()).unwrap_or(0)
    }
}

impl<V, C> Default for FilterRegistry<V, C> {
    fn default() -> Self {
        Self::new()
    }
}
