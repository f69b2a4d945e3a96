use std::collections::HashMap;
use std::sync::Arc;

use crate::codec::Codec;

/// Immutable name → codec map.
///
/// Built once through [`RegistryBuilder`] and read-only afterwards, so it can
/// be shared across threads without locking. The registry never fails on its
/// own: an unknown name is reported as `None` and the caller decides how to
/// surface it.
#[derive(Clone, Default)]
pub struct Registry {
    codecs: HashMap<&'static str, Arc<dyn Codec>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Resolve the codec registered under `name`.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Codec>> {
        self.codecs.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.codecs.contains_key(name)
    }

    /// Registered algorithm names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.codecs.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("codecs", &self.names())
            .finish()
    }
}

/// Collects codecs before freezing them into a [`Registry`].
#[derive(Default)]
pub struct RegistryBuilder {
    codecs: HashMap<&'static str, Arc<dyn Codec>>,
}

impl RegistryBuilder {
    /// Register `codec` under its own name. A later registration under the same
    /// name replaces the earlier one.
    pub fn register(mut self, codec: impl Codec + 'static) -> Self {
        self.codecs.insert(codec.name(), Arc::new(codec));
        self
    }

    pub fn build(self) -> Registry {
        Registry {
            codecs: self.codecs,
        }
    }
}
