//! Per-field value rewriting applied while normalizing records

/// Rewrites scalar values on their way into a document
///
/// `field` is the logical path of the value (e.g. `/addresses/streetName`),
/// computed the same way column selectors are matched. Implementations must
/// not fail; whatever they return ends up in the document verbatim.
pub trait FieldInterceptor {
    fn intercept(&self, field: &str, value: String) -> String;
}

impl<F> FieldInterceptor for F
where
    F: Fn(&str, String) -> String,
{
    fn intercept(&self, field: &str, value: String) -> String {
        self(field, value)
    }
}

/// Returns every value unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl FieldInterceptor for Identity {
    fn intercept(&self, _field: &str, value: String) -> String {
        value
    }
}
