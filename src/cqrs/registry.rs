use std::any::Any;
use std::collections::HashMap;

use crate::event_sourcing::core::{EsError, EsResult};

// ============================================================================
// Handler Registry - name-keyed, type-checked storage shared by both buses
// ============================================================================
//
// Each entry holds an `Arc<dyn XHandler<M>>` behind `dyn Any`. The name is
// checked for duplicates at registration; the message type is checked by
// downcasting at lookup, so a handler can only ever receive the message
// type it was registered for.
//
// ============================================================================

pub(crate) struct HandlerRegistry {
    kind: &'static str,
    handlers: HashMap<&'static str, Box<dyn Any + Send + Sync>>,
}

impl HandlerRegistry {
    pub(crate) fn new(kind: &'static str) -> Self {
        Self { kind, handlers: HashMap::new() }
    }

    pub(crate) fn insert<T: Any + Send + Sync>(&mut self, name: &'static str, handler: T) -> EsResult<()> {
        if self.handlers.contains_key(name) {
            tracing::error!(kind = self.kind, name, "Duplicate handler registration");
            return Err(EsError::DuplicateHandler(format!("{} {}", self.kind, name)));
        }

        self.handlers.insert(name, Box::new(handler));
        tracing::debug!(kind = self.kind, name, "Registered handler");
        Ok(())
    }

    pub(crate) fn get<T: Any>(&self, name: &'static str) -> EsResult<&T> {
        self.handlers
            .get(name)
            .and_then(|handler| handler.downcast_ref::<T>())
            .ok_or_else(|| EsError::HandlerNotFound(format!("{} {}", self.kind, name)))
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub(crate) fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_name_is_rejected() {
        let mut registry = HandlerRegistry::new("command");
        registry.insert("user.create", 1u8).unwrap();

        let result = registry.insert("user.create", 2u8);
        assert!(matches!(result, Err(EsError::DuplicateHandler(ref name)) if name == "command user.create"));
        assert_eq!(*registry.get::<u8>("user.create").unwrap(), 1);
    }

    #[test]
    fn test_lookup_checks_name_and_type() {
        let mut registry = HandlerRegistry::new("query");
        registry.insert("user.get", String::from("handler")).unwrap();

        assert!(registry.get::<String>("user.get").is_ok());
        assert!(matches!(registry.get::<u32>("user.get"), Err(EsError::HandlerNotFound(_))));
        assert!(matches!(registry.get::<String>("user.list"), Err(EsError::HandlerNotFound(_))));
        assert!(registry.contains("user.get"));
        assert_eq!(registry.names(), vec!["user.get"]);
    }
}
