//! Per-context container holding the values of configured baggage fields.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::field::BaggageField;

#[derive(Clone, Default)]
struct State {
    /// (trace id, span id) of the context that claimed this container.
    owner: Option<(u64, u64)>,
    values: Vec<Option<String>>,
}

/// Values of a fixed, ordered field list, stored in a context's extra.
///
/// One container belongs to one context. A child that inherits its
/// parent's container gets a [`fork`](Self::fork) so updates in the child
/// do not leak upward.
pub struct BaggageFields {
    fields: Arc<[BaggageField]>,
    state: Mutex<State>,
}

impl BaggageFields {
    /// Empty values for the given fields.
    pub fn new(fields: impl IntoIterator<Item = BaggageField>) -> Self {
        let fields: Arc<[BaggageField]> = fields.into_iter().collect();
        Self::with_fields(fields)
    }

    pub(crate) fn with_fields(fields: Arc<[BaggageField]>) -> Self {
        let values = vec![None; fields.len()];
        Self {
            fields,
            state: Mutex::new(State { owner: None, values }),
        }
    }

    fn index_of(&self, field: &BaggageField) -> Option<usize> {
        self.fields.iter().position(|f| f == field)
    }

    /// Value of `field`, `None` when unset or unknown.
    pub fn get_value(&self, field: &BaggageField) -> Option<String> {
        let index = self.index_of(field)?;
        self.state.lock().values[index].clone()
    }

    /// Returns false for unconfigured fields or unchanged values.
    pub fn update_value(&self, field: &BaggageField, value: Option<&str>) -> bool {
        let Some(index) = self.index_of(field) else {
            return false;
        };
        let mut state = self.state.lock();
        if state.values[index].as_deref() == value {
            return false;
        }
        state.values[index] = value.map(str::to_string);
        true
    }

    /// All fields, set or not.
    pub fn get_all_fields(&self) -> Vec<BaggageField> {
        self.fields.to_vec()
    }

    /// Name and value of each field with a non-empty value, in configuration order.
    pub fn get_all_values(&self) -> Vec<(String, String)> {
        let state = self.state.lock();
        self.fields
            .iter()
            .zip(state.values.iter())
            .filter_map(|(field, value)| match value.as_deref() {
                Some(v) if !v.is_empty() => Some((field.name().to_string(), v.to_string())),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn find_by_name(&self, name: &str) -> Option<BaggageField> {
        let lc_name = name.to_lowercase();
        self.fields.iter().find(|f| f.lc_name() == lc_name).cloned()
    }

    /// Unclaimed copy of the current values.
    pub fn fork(&self) -> Self {
        let values = self.state.lock().values.clone();
        Self {
            fields: Arc::clone(&self.fields),
            state: Mutex::new(State { owner: None, values }),
        }
    }

    /// Claims the container for a context. True when it was unclaimed or already ours.
    pub(crate) fn try_to_claim(&self, trace_id: u64, span_id: u64) -> bool {
        let mut state = self.state.lock();
        match state.owner {
            None => {
                state.owner = Some((trace_id, span_id));
                true
            }
            Some(owner) => owner == (trace_id, span_id),
        }
    }
}

impl fmt::Debug for BaggageFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.get_all_values()).finish()
    }
}
