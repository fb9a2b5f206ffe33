//! lookup of supported resource types
use crate::schema::TypeDescriptor;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Maximum edit distance for "Did you mean" suggestions
const SUGGESTION_DISTANCE: usize = 2;

/// Immutable map from resource type name to [TypeDescriptor]
///
/// Built once and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    types: BTreeMap<String, Arc<TypeDescriptor>>,
}

impl Registry {
    pub fn new(descriptors: impl IntoIterator<Item = TypeDescriptor>) -> Self {
        descriptors.into_iter().collect()
    }

    pub fn lookup(&self, name: &str) -> Option<&Arc<TypeDescriptor>> {
        self.types.get(name)
    }

    /// Registered type names in lexicographic order
    pub fn type_names(&self) -> Vec<&str> {
        self.types.keys().map(String::as_str).collect()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<TypeDescriptor>> {
        self.types.values()
    }

    /// Closest registered type name, if any is close enough to be a likely typo
    ///
    /// Ties are broken by lexicographic order.
    pub fn suggest(&self, name: &str) -> Option<&str> {
        self.types
            .keys()
            .map(|candidate| (strsim::levenshtein(name, candidate), candidate.as_str()))
            .filter(|(distance, _)| *distance <= SUGGESTION_DISTANCE)
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, candidate)| candidate)
    }
}

impl FromIterator<TypeDescriptor> for Registry {
    fn from_iter<T: IntoIterator<Item = TypeDescriptor>>(iter: T) -> Self {
        let mut types = BTreeMap::new();
        for descriptor in iter {
            let name = descriptor.name().to_owned();
            assert!(
                !types.contains_key(&name),
                "resource type {name:?} registered twice"
            );
            types.insert(name, Arc::new(descriptor));
        }

        Self { types }
    }
}
