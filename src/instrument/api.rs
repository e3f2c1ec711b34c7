//! The recording API instrumented bodies call into.

use serde::{Deserialize, Serialize};

use crate::{
    assembly::{MethodRef, TypeRef},
    Error, Result,
};

/// Default namespace of the recording API type.
pub const DEFAULT_API_NAMESPACE: &str = "Regression.Tracing";

/// Default simple name of the recording API type.
pub const DEFAULT_API_TYPE: &str = "TraceRecorder";

/// References to the four static entry points of the recording API.
///
/// The entry points are:
///
/// - `StartTest(string)` - Opens the trace of a test, called once in the prologue
/// - `EndTest()` - Closes the trace, called before every return
/// - `RecordVoidInstanceCall(object, string)` - Records a construction or a call without
///   a consumed result
/// - `RecordInstanceCall(object, object, string)` - Records a call and its result
///
/// # Examples
///
/// ```rust
/// use ildiff::instrument::RecordingApi;
///
/// let api = RecordingApi::default();
/// assert_eq!(api.start_test.declaring_type.full_name(), "Regression.Tracing.TraceRecorder");
///
/// let custom = RecordingApi::new("Acme.Qa", "Recorder")?;
/// assert_eq!(custom.end_test.to_string(), "System.Void Acme.Qa.Recorder::EndTest()");
/// # Ok::<(), ildiff::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingApi {
    /// `StartTest(string)`
    pub start_test: MethodRef,
    /// `EndTest()`
    pub end_test: MethodRef,
    /// `RecordVoidInstanceCall(object, string)`
    pub record_void_instance_call: MethodRef,
    /// `RecordInstanceCall(object, object, string)`
    pub record_instance_call: MethodRef,
}

impl RecordingApi {
    /// Reference the entry points on the type `namespace.name`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidArgument`] if `name` is empty.
    pub fn new(namespace: &str, name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::InvalidArgument(
                "recording API type name is empty".to_string(),
            ));
        }

        Ok(Self::for_type(TypeRef::new(namespace, name)))
    }

    fn for_type(recorder: TypeRef) -> Self {
        let entry = |method: &str, parameters: Vec<TypeRef>| {
            MethodRef::static_method(recorder.clone(), method).with_parameters(parameters)
        };

        RecordingApi {
            start_test: entry("StartTest", vec![TypeRef::string()]),
            end_test: entry("EndTest", Vec::new()),
            record_void_instance_call: entry(
                "RecordVoidInstanceCall",
                vec![TypeRef::object(), TypeRef::string()],
            ),
            record_instance_call: entry(
                "RecordInstanceCall",
                vec![TypeRef::object(), TypeRef::object(), TypeRef::string()],
            ),
        }
    }

    /// The four entry points, in declaration order.
    #[must_use]
    pub fn entry_points(&self) -> [&MethodRef; 4] {
        [
            &self.start_test,
            &self.end_test,
            &self.record_void_instance_call,
            &self.record_instance_call,
        ]
    }

    /// Returns `true` if `method` is one of the entry points.
    #[must_use]
    pub fn is_entry_point(&self, method: &MethodRef) -> bool {
        self.entry_points().contains(&method)
    }

    /// Check that every entry point names a symbol.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidArgument`] for the first entry point with an empty
    /// method or type name.
    pub fn validate(&self) -> Result<()> {
        for method in self.entry_points() {
            if method.name.is_empty() || method.declaring_type.name.is_empty() {
                return Err(Error::InvalidArgument(format!(
                    "recording API entry point '{method}' has an empty symbol"
                )));
            }
        }
        Ok(())
    }
}

impl Default for RecordingApi {
    fn default() -> Self {
        Self::for_type(TypeRef::new(DEFAULT_API_NAMESPACE, DEFAULT_API_TYPE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_targets_trace_recorder() {
        let api = RecordingApi::default();
        assert!(api.validate().is_ok());
        assert_eq!(api.record_instance_call.parameters.len(), 3);
        assert!(api
            .entry_points()
            .iter()
            .all(|method| !method.has_this && method.is_void()));
    }

    #[test]
    fn custom_type_matches_default_shape() {
        let api = RecordingApi::new(DEFAULT_API_NAMESPACE, DEFAULT_API_TYPE).unwrap();
        assert_eq!(api, RecordingApi::default());
    }

    #[test]
    fn empty_symbols_are_rejected() {
        assert!(matches!(
            RecordingApi::new("Acme", ""),
            Err(Error::InvalidArgument(_))
        ));

        let mut api = RecordingApi::default();
        api.end_test.name.clear();
        assert!(api.validate().is_err());
    }

    #[test]
    fn entry_points_are_recognised() {
        let api = RecordingApi::default();
        assert!(api.is_entry_point(&api.start_test));
        assert!(!api.is_entry_point(&MethodRef::static_method(TypeRef::object(), "StartTest")));
    }
}
