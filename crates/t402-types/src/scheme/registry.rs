use std::fmt;
use std::sync::Arc;

use crate::chain::{ChainId, ChainIdPattern};

/// Registration key: a scheme name on a network pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemeKey {
    pub scheme: String,
    pub pattern: ChainIdPattern,
}

impl fmt::Display for SchemeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.scheme, self.pattern)
    }
}

/// Scheme implementations keyed by `(scheme, network pattern)`.
///
/// Registering an equal key again replaces the earlier entry. Resolution picks
/// the most specific matching pattern (exact, then set, then wildcard); among
/// equally specific patterns the earliest registration wins.
pub struct SchemeRegistry<T: ?Sized> {
    entries: Vec<(SchemeKey, Arc<T>)>,
}

impl<T: ?Sized> Default for SchemeRegistry<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: ?Sized> SchemeRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<S: Into<String>>(&mut self, scheme: S, pattern: ChainIdPattern, handler: Arc<T>) {
        let key = SchemeKey {
            scheme: scheme.into(),
            pattern,
        };
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = handler,
            None => self.entries.push((key, handler)),
        }
    }

    pub fn and_register<S: Into<String>>(
        mut self,
        scheme: S,
        pattern: ChainIdPattern,
        handler: Arc<T>,
    ) -> Self {
        self.register(scheme, pattern, handler);
        self
    }

    /// The handler for a scheme on a concrete network.
    pub fn resolve(&self, scheme: &str, chain_id: &ChainId) -> Option<Arc<T>> {
        let mut best: Option<&(SchemeKey, Arc<T>)> = None;
        for entry in &self.entries {
            let (key, _) = entry;
            if key.scheme != scheme || !key.pattern.matches(chain_id) {
                continue;
            }
            let better = match best {
                None => true,
                Some((current, _)) => key.pattern.specificity() > current.pattern.specificity(),
            };
            if better {
                best = Some(entry);
            }
        }
        best.map(|(_, handler)| handler.clone())
    }

    /// Whether any registration exists for the scheme, on any network.
    pub fn has_scheme(&self, scheme: &str) -> bool {
        self.entries.iter().any(|(key, _)| key.scheme == scheme)
    }

    pub fn keys(&self) -> impl Iterator<Item = &SchemeKey> {
        self.entries.iter().map(|(key, _)| key)
    }

    pub fn values(&self) -> impl Iterator<Item = &Arc<T>> {
        self.entries.iter().map(|(_, handler)| handler)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: ?Sized> fmt::Debug for SchemeRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.entries.iter().map(|(key, _)| key.to_string()).collect();
        f.debug_struct("SchemeRegistry")
            .field("schemes", &keys)
            .finish()
    }
}
