//! # formtable
//!
//! The **request-parameter model** of a form-driven web UI: a per-request
//! table of named input fields that is filled while the HTTP body streams
//! in, validated once, and then handed to a stylesheet-based renderer.
//!
//! Field values are byte buffers with an explicit length, so they may hold
//! embedded zero bytes. Large fields are reconstructed from chunks that
//! arrive at arbitrary byte offsets. Array fields are nested tables. The
//! validation pass records a verdict per field and keeps the original
//! input of rejected fields so the page can show it again.
//!
//! ## Quick start
//!
//! ```rust
//! use formtable::{RequestConfig, RequestContext, RuleSet, Utf8Check, Verdict};
//!
//! let mut ctx = RequestContext::new(RequestConfig::default());
//!
//! ctx.add("hostname", "router").unwrap();
//! ctx.append_chunk("upload", b"AB", 0).unwrap();
//! ctx.append_chunk("upload", b"CD", 2).unwrap();
//! ctx.set_filename("upload", "firmware.bin").unwrap();
//!
//! let mut rules = RuleSet::new();
//! rules.add_spec("hostname:max-len=4").unwrap();
//! let report = ctx.validate(&rules, &Utf8Check).unwrap();
//! assert_eq!(report.invalid, ["hostname"]);
//!
//! let table = ctx.table();
//! assert_eq!(table.value("upload"), Some(&b"ABCD"[..]));
//! assert_eq!(table.is_valid("hostname"), Some(Verdict::Invalid));
//! assert_eq!(table.original_value("hostname"), Some(Some(&b"router"[..])));
//! ```

#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { ::tracing::debug!($($arg)*) }
}
#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}
pub(crate) use trace_debug;

#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($($arg:tt)*) => { ::tracing::warn!($($arg)*) }
}
#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($($arg:tt)*) => {};
}
pub(crate) use trace_warn;

mod context;
mod error;
mod output;
mod table;
mod types;
mod validate;

// Re-export public API.
pub use context::{RequestConfig, RequestContext};
pub use error::ParamError;
pub use output::{
    FAILURE_PAGE, RenderError, RenderedPage, Transform, format_debug, format_json, render_page,
    to_xml,
};
pub use table::{Iter, ParameterTable, TableLimits};
pub use types::{ParamKind, Parameter, ValueBuf, Verdict};
pub use validate::{
    AcceptAll, AcceptanceRule, EncodingCheck, Rule, RuleSet, Utf8Check, ValidationReport,
};

/// Build a table from name/value pairs and validate it in one call.
///
/// A convenience wrapper around [`ParameterTable`] for inputs that are
/// already fully decoded.
pub fn validated_table<'a, I>(
    pairs: I,
    rule: &dyn AcceptanceRule,
    encoding: &dyn EncodingCheck,
) -> (ParameterTable, ValidationReport)
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut table = ParameterTable::new();
    for (name, value) in pairs {
        table.add(name, value);
    }
    let report = table.validate(rule, encoding);
    (table, report)
}
