//! Name-keyed factory tables.
//!
//! A [`Registry`] maps a name to a factory producing a boxed capability `P`.
//! The same type backs the component, system and state tables: each table is
//! populated explicitly at startup and handed to the manager that consumes it,
//! so construction order stays visible and testable.

use std::collections::BTreeMap;
use std::fmt;

use tracing::error;

/// A string-keyed table of factories producing `Box<P>` from constructor
/// arguments `&A`.
pub struct Registry<P: ?Sized, A: ?Sized = ()> {
    kind: &'static str,
    factories: BTreeMap<String, Box<dyn Fn(&A) -> Box<P>>>,
}

impl<P: ?Sized, A: ?Sized> Registry<P, A> {
    /// Create an empty registry. `kind` only labels diagnostics
    /// (e.g. "component", "system").
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            factories: BTreeMap::new(),
        }
    }

    /// Label used in diagnostics.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Record `factory` under `name`.
    ///
    /// Registering a name twice is a programming error: it is reported at
    /// `error` level, the first factory is kept and `false` is returned.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> bool
    where
        F: Fn(&A) -> Box<P> + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            error!(
                kind = self.kind,
                name = %name,
                "factory registered twice, keeping the first registration"
            );
            return false;
        }
        self.factories.insert(name, Box::new(factory));
        true
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&A) -> Box<P> + 'static,
    {
        self.register(name, factory);
        self
    }

    /// Build a fresh instance of `name`, or `None` if nothing is registered
    /// under it.
    pub fn create(&self, name: &str, args: &A) -> Option<Box<P>> {
        self.factories.get(name).map(|factory| factory(args))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl<P: ?Sized, A: ?Sized> fmt::Debug for Registry<P, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("names", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Counter {
        fn bump(&mut self) -> u32;
    }

    struct Simple(u32);

    impl Counter for Simple {
        fn bump(&mut self) -> u32 {
            self.0 += 1;
            self.0
        }
    }

    fn registry() -> Registry<dyn Counter> {
        Registry::new("counter").with("simple", |_: &()| Box::new(Simple(0)) as Box<dyn Counter>)
    }

    #[test]
    fn create_returns_fresh_instances() {
        let registry = registry();
        let mut a = registry.create("simple", &()).unwrap();
        let mut b = registry.create("simple", &()).unwrap();
        assert_eq!(a.bump(), 1);
        assert_eq!(a.bump(), 2);
        // `b` does not share state with `a`
        assert_eq!(b.bump(), 1);
    }

    #[test]
    fn unknown_name_yields_none() {
        let registry = registry();
        assert!(registry.create("unregistered", &()).is_none());
        assert!(!registry.contains("unregistered"));
    }

    #[test]
    fn duplicate_registration_keeps_first() {
        let mut registry = registry();
        let accepted = registry.register("simple", |_: &()| Box::new(Simple(100)) as Box<dyn Counter>);
        assert!(!accepted);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.create("simple", &()).unwrap().bump(), 1);
    }

    #[test]
    fn factories_receive_constructor_arguments() {
        let registry: Registry<dyn Counter, u32> =
            Registry::new("counter").with("seeded", |seed: &u32| Box::new(Simple(*seed)) as Box<dyn Counter>);
        assert_eq!(registry.create("seeded", &41).unwrap().bump(), 42);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["seeded"]);
    }
}
