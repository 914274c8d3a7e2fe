//! Per-request glue consumed by a web layer's interceptor.
//!
//! The interceptor extracts inbound headers, calls [`RequestScope::start`]
//! before the handler runs and [`RequestScope::after_completion`] once the
//! response is written. Dropping the scope on any other exit path restores
//! the previous context as well.

use crate::baggage::{BaggageField, BaggagePropagation};
use crate::current::{CurrentScope, CurrentTraceContext};
use crate::propagation::{next_context, TraceContext, TraceContextOrSamplingFlags};

/// Tag holding the matched route
pub const ROUTE_TAG: &str = "http.route";
/// Tag holding the error message
pub const ERROR_TAG: &str = "error";

/// Context and attributes of one in-flight request.
#[derive(Debug)]
pub struct RequestScope {
    context: TraceContext,
    scope: CurrentScope,
    tags: Vec<(String, String)>,
    completed: bool,
}

impl RequestScope {
    /// Derives the request's context from what was extracted and makes it current.
    pub fn start(
        current: &CurrentTraceContext,
        baggage: &BaggagePropagation,
        extracted: &TraceContextOrSamplingFlags,
    ) -> Self {
        let context = baggage.decorate(next_context(extracted));
        let scope = current.new_scope(Some(&context));
        tracing::debug!(%context, sampled = ?context.sampled(), "request scope started");
        Self {
            context,
            scope,
            tags: Vec::new(),
            completed: false,
        }
    }

    /// Context made current for this request.
    pub fn context(&self) -> &TraceContext {
        &self.context
    }

    /// Records a request attribute, replacing an earlier value for the same key.
    pub fn tag(&mut self, key: &str, value: &str) {
        match self.tags.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.tags.push((key.to_string(), value.to_string())),
        }
    }

    /// Tags recorded so far.
    pub fn tags(&self) -> &[(String, String)] {
        &self.tags
    }

    /// Updates a baggage field on the request's context.
    pub fn update(&self, field: &BaggageField, value: Option<&str>) -> bool {
        field.update_value(&self.context, value)
    }

    /// Records route and error, then closes the scope. Later calls are ignored.
    pub fn after_completion(&mut self, route: Option<&str>, error: Option<&str>) {
        if self.completed {
            return;
        }
        self.completed = true;
        if let Some(route) = route {
            self.tag(ROUTE_TAG, route);
        }
        if let Some(error) = error {
            self.tag(ERROR_TAG, error);
        }
        self.scope.close();
        tracing::debug!(context = %self.context, tags = ?self.tags, "request completed");
    }

    /// True once the request has finished.
    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::SamplingFlags;

    #[test]
    fn test_lifecycle() {
        let current = CurrentTraceContext::thread_local();
        let baggage = BaggagePropagation::builder().build();
        let extracted = TraceContextOrSamplingFlags::from_flags(SamplingFlags::SAMPLED);

        let mut request = RequestScope::start(&current, &baggage, &extracted);
        assert_eq!(current.get().as_ref(), Some(request.context()));
        assert_eq!(request.context().sampled(), Some(true));

        request.tag("user", "bob");
        request.tag("user", "alice");
        request.after_completion(Some("/items/{id}"), Some("boom"));
        request.after_completion(Some("/other"), None);

        assert!(request.is_completed());
        assert_eq!(current.get(), None);
        assert_eq!(
            request.tags(),
            &[
                ("user".to_string(), "alice".to_string()),
                (ROUTE_TAG.to_string(), "/items/{id}".to_string()),
                (ERROR_TAG.to_string(), "boom".to_string()),
            ]
        );
    }

    #[test]
    fn test_drop_restores_previous() {
        let current = CurrentTraceContext::thread_local();
        let baggage = BaggagePropagation::builder().build();
        {
            let _request = RequestScope::start(&current, &baggage, &TraceContextOrSamplingFlags::EMPTY);
            assert!(current.get().is_some());
        }
        assert_eq!(current.get(), None);
    }
}
