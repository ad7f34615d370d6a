use serde::Serialize;

use crate::error::ParamError;
use crate::table::{ParameterTable, TableLimits};
use crate::types::Parameter;
use crate::validate::{AcceptanceRule, EncodingCheck, ValidationReport};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Per-request settings handed to the rendering stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestConfig {
    /// The server runs inside a chroot; stylesheet paths are relative to it.
    pub chroot: bool,
    /// The request arrived over HTTPS.
    pub https: bool,
    /// UI language code (default: `"en"`).
    pub language: String,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            chroot: false,
            https: false,
            language: "en".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// RequestContext
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Decoding,
    Validated,
}

/// The parameters of one request together with its configuration.
///
/// Input is accepted until [`RequestContext::validate`] runs; after that
/// the table is sealed and only safe-default substitution is allowed.
///
/// ```rust
/// use formtable::{RequestConfig, RequestContext, RuleSet, Utf8Check};
///
/// let mut ctx = RequestContext::new(RequestConfig::default());
/// ctx.add("port", "99999").unwrap();
///
/// let mut rules = RuleSet::new();
/// rules.add_spec("port:int=1..65535").unwrap();
/// let report = ctx.validate(&rules, &Utf8Check).unwrap();
/// assert_eq!(report.invalid, ["port"]);
///
/// ctx.replace_value("port", "80").unwrap();
/// assert_eq!(ctx.table().value("port"), Some(&b"80"[..]));
/// assert_eq!(ctx.table().original_value("port"), Some(Some(&b"99999"[..])));
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext {
    config: RequestConfig,
    table: ParameterTable,
    phase: Phase,
    report: Option<ValidationReport>,
}

impl RequestContext {
    /// Start a request with an empty table and default limits.
    pub fn new(config: RequestConfig) -> Self {
        Self::with_limits(config, TableLimits::default())
    }

    /// Start a request with an empty table and custom limits.
    pub fn with_limits(config: RequestConfig, limits: TableLimits) -> Self {
        Self {
            config,
            table: ParameterTable::with_limits(limits),
            phase: Phase::Decoding,
            report: None,
        }
    }

    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// Read-only view of the parameters.
    pub fn table(&self) -> &ParameterTable {
        &self.table
    }

    pub fn is_validated(&self) -> bool {
        self.phase == Phase::Validated
    }

    /// The outcome of the validation pass, once it has run.
    pub fn report(&self) -> Option<&ValidationReport> {
        self.report.as_ref()
    }

    fn decoding_table(&mut self) -> Result<&mut ParameterTable, ParamError> {
        match self.phase {
            Phase::Decoding => Ok(&mut self.table),
            Phase::Validated => Err(ParamError::Sealed),
        }
    }

    /// See [`ParameterTable::add`].
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::Sealed`] after validation.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        value: impl AsRef<[u8]>,
    ) -> Result<&mut Parameter, ParamError> {
        Ok(self.decoding_table()?.add(name, value))
    }

    /// See [`ParameterTable::add_multi`].
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::Sealed`] after validation.
    pub fn add_multi(
        &mut self,
        name: impl Into<String>,
    ) -> Result<&mut ParameterTable, ParamError> {
        Ok(self.decoding_table()?.add_multi(name))
    }

    /// See [`ParameterTable::append_chunk`].
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::Sealed`] after validation, or any error of
    /// the underlying append.
    pub fn append_chunk(
        &mut self,
        name: &str,
        data: &[u8],
        offset: usize,
    ) -> Result<&Parameter, ParamError> {
        self.decoding_table()?.append_chunk(name, data, offset)
    }

    /// See [`ParameterTable::set_filename`].
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::Sealed`] after validation.
    pub fn set_filename(
        &mut self,
        name: &str,
        filename: impl Into<String>,
    ) -> Result<bool, ParamError> {
        Ok(self.decoding_table()?.set_filename(name, filename))
    }

    /// Run the validation pass and seal the table.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::AlreadyValidated`] on a second call.
    pub fn validate(
        &mut self,
        rule: &dyn AcceptanceRule,
        encoding: &dyn EncodingCheck,
    ) -> Result<&ValidationReport, ParamError> {
        if self.phase == Phase::Validated {
            crate::trace_warn!("validation pass requested twice");
            return Err(ParamError::AlreadyValidated);
        }
        let report = self.table.validate(rule, encoding);
        self.phase = Phase::Validated;
        Ok(self.report.insert(report))
    }

    /// Substitute a safe default for a field after validation.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::NotScalar`] for multi-valued fields.
    pub fn replace_value(
        &mut self,
        name: &str,
        value: impl AsRef<[u8]>,
    ) -> Result<bool, ParamError> {
        self.table.replace_value(name, value)
    }

    /// Take the parameters out of the context, ending the request.
    pub fn into_table(self) -> ParameterTable {
        self.table
    }
}
