//! Rewriter configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{instrument::RecordingApi, Error, Result};

/// Settings of the [`crate::instrument::Instrumenter`].
///
/// All fields have defaults, a JSON document only needs to name what it overrides:
///
/// ```rust
/// use ildiff::instrument::InstrumentConfig;
///
/// let config = InstrumentConfig::from_json(r#"{ "temp_local_prefix": "__value" }"#)?;
/// assert_eq!(config.temp_local_prefix, "__value");
/// assert_eq!(config.min_max_stack, 3);
/// # Ok::<(), ildiff::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    /// Entry points the injected calls target
    pub api: RecordingApi,
    /// Lowest max stack of a rewritten body, the deepest injected sequence pushes three
    /// values
    pub min_max_stack: u16,
    /// Prefix of the temporaries holding popped call results, a numeric suffix keeps the
    /// names unique
    pub temp_local_prefix: String,
    /// Signature recorded for the construction of the object under test
    pub constructor_signature: String,
}

impl Default for InstrumentConfig {
    /// Creates the default configuration.
    ///
    /// See the field documentation for the meaning of the values.
    fn default() -> Self {
        Self {
            api: RecordingApi::default(),
            min_max_stack: 3,
            temp_local_prefix: "__result".to_string(),
            constructor_signature: ".ctor".to_string(),
        }
    }
}

impl InstrumentConfig {
    /// Target the recording API on `namespace.name`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidArgument`] if `name` is empty.
    pub fn with_api_type(mut self, namespace: &str, name: &str) -> Result<Self> {
        self.api = RecordingApi::new(namespace, name)?;
        Ok(self)
    }

    /// Parse a configuration from JSON and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::JsonError`] for a malformed document and everything
    /// [`InstrumentConfig::validate`] returns.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: InstrumentConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if the file can not be read, plus everything
    /// [`InstrumentConfig::from_json`] returns.
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check the configuration for empty symbols.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidArgument`] for an empty temporary prefix or
    /// constructor signature, or an incomplete recording API.
    pub fn validate(&self) -> Result<()> {
        if self.temp_local_prefix.is_empty() {
            return Err(Error::InvalidArgument(
                "temporary local prefix is empty".to_string(),
            ));
        }
        if self.constructor_signature.is_empty() {
            return Err(Error::InvalidArgument(
                "constructor signature is empty".to_string(),
            ));
        }
        self.api.validate()
    }
}
