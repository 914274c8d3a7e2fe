//! Type-indexed registry of opaque state propagated alongside a context.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
struct ExtraEntry {
    tag: TypeId,
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl ExtraEntry {
    fn new<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            tag: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value,
        }
    }

    fn same_instance(&self, other: &ExtraEntry) -> bool {
        Arc::as_ptr(&self.value).cast::<()>() == Arc::as_ptr(&other.value).cast::<()>()
    }
}

/// Immutable, ordered extra state holding at most one instance per concrete type.
///
/// Cloning is a reference-count bump. Insertion returns a new registry:
/// adding the same instance twice is a no-op and adding a different
/// instance of an already present type replaces it in place.
#[derive(Clone, Default)]
pub struct Extra {
    entries: Option<Arc<[ExtraEntry]>>,
}

impl Extra {
    /// Registry with no entries.
    pub const EMPTY: Extra = Extra { entries: None };

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |e| e.len())
    }

    /// True when nothing is attached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the instance whose concrete type is exactly `T`.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let tag = TypeId::of::<T>();
        self.entries
            .as_ref()?
            .iter()
            .find(|entry| entry.tag == tag)
            .and_then(|entry| Arc::clone(&entry.value).downcast::<T>().ok())
    }

    /// Returns a registry that also holds `value`.
    #[must_use]
    pub fn with<T: Any + Send + Sync>(&self, value: Arc<T>) -> Extra {
        self.with_entry(ExtraEntry::new(value))
    }

    /// Returns a registry holding the entries of both, `other` winning per type.
    #[must_use]
    pub fn merge(&self, other: &Extra) -> Extra {
        match &other.entries {
            None => self.clone(),
            Some(entries) if self.is_empty() => Extra {
                entries: Some(Arc::clone(entries)),
            },
            Some(entries) => entries
                .iter()
                .fold(self.clone(), |acc, entry| acc.with_entry(entry.clone())),
        }
    }

    /// Type names of the entries, in insertion order.
    pub fn type_names(&self) -> Vec<&'static str> {
        self.entries
            .as_ref()
            .map(|e| e.iter().map(|entry| entry.type_name).collect())
            .unwrap_or_default()
    }

    fn with_entry(&self, entry: ExtraEntry) -> Extra {
        let mut entries: Vec<ExtraEntry> = match &self.entries {
            None => {
                return Extra {
                    entries: Some(Arc::from(vec![entry])),
                }
            }
            Some(existing) => existing.to_vec(),
        };

        match entries.iter().position(|e| e.tag == entry.tag) {
            Some(index) if entries[index].same_instance(&entry) => return self.clone(),
            Some(index) => entries[index] = entry,
            None => entries.push(entry),
        }
        Extra {
            entries: Some(Arc::from(entries)),
        }
    }
}

/// Equal when both hold the same instances in the same order.
impl PartialEq for Extra {
    fn eq(&self, other: &Self) -> bool {
        match (&self.entries, &other.entries) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.same_instance(y))
            }
            (Some(a), None) | (None, Some(a)) => a.is_empty(),
        }
    }
}

impl fmt::Debug for Extra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.type_names()).finish()
    }
}
