//! The validation pass.
//!
//! Runs once per request, after the body has been consumed and before the
//! parameters are rendered. Each scalar field is judged by a pluggable
//! [`AcceptanceRule`] and an [`EncodingCheck`]; a multi-valued field is
//! valid when all of its children are. Rejected fields keep a copy of
//! their input as the original value so the page can re-display it.

use std::collections::HashMap;
use std::str::FromStr;

use crate::error::ParamError;
use crate::table::ParameterTable;
use crate::types::{Parameter, Verdict};

// ---------------------------------------------------------------------------
// Pluggable checks
// ---------------------------------------------------------------------------

/// Decides whether a scalar field's content is acceptable.
///
/// `path` is the field name, or for elements of a multi-valued field the
/// slash-joined path from the top-level name (`"dns/0"`).
pub trait AcceptanceRule {
    fn accept(&self, path: &str, param: &Parameter) -> bool;
}

impl<F> AcceptanceRule for F
where
    F: Fn(&str, &[u8]) -> bool,
{
    fn accept(&self, path: &str, param: &Parameter) -> bool {
        self(path, param.value())
    }
}

/// Accepts every field.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl AcceptanceRule for AcceptAll {
    fn accept(&self, _path: &str, _param: &Parameter) -> bool {
        true
    }
}

/// Decides whether a value is correctly encoded.
pub trait EncodingCheck {
    fn is_well_formed(&self, value: &[u8]) -> bool;
}

/// Strict UTF-8 well-formedness.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Check;

impl EncodingCheck for Utf8Check {
    fn is_well_formed(&self, value: &[u8]) -> bool {
        std::str::from_utf8(value).is_ok()
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// A single content constraint.
///
/// Textual forms (as accepted by [`FromStr`]): `non-empty`, `max-len=N`,
/// `int`, `int=MIN..MAX`, `one-of=a|b|c`, `printable`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// The value must not be empty.
    NonEmpty,
    /// The value may be at most this many bytes long.
    MaxLen(usize),
    /// The value must be a decimal integer within `min..=max`.
    Integer { min: i64, max: i64 },
    /// The value must equal one of the listed alternatives.
    OneOf(Vec<String>),
    /// The value must consist of printable ASCII and spaces only.
    Printable,
}

impl Rule {
    pub fn check(&self, value: &[u8]) -> bool {
        match self {
            Self::NonEmpty => !value.is_empty(),
            Self::MaxLen(max) => value.len() <= *max,
            Self::Integer { min, max } => std::str::from_utf8(value)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .is_some_and(|n| (*min..=*max).contains(&n)),
            Self::OneOf(options) => options.iter().any(|o| o.as_bytes() == value),
            Self::Printable => value.iter().all(|&b| (0x20..=0x7E).contains(&b)),
        }
    }
}

impl FromStr for Rule {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParamError::InvalidRule(s.to_string());
        let (kind, arg) = match s.split_once('=') {
            Some((k, a)) => (k.trim(), Some(a.trim())),
            None => (s.trim(), None),
        };

        match (kind, arg) {
            ("non-empty", None) => Ok(Self::NonEmpty),
            ("printable", None) => Ok(Self::Printable),
            ("max-len", Some(n)) => n.parse().map(Self::MaxLen).map_err(|_| invalid()),
            ("int", None) => Ok(Self::Integer {
                min: i64::MIN,
                max: i64::MAX,
            }),
            ("int", Some(range)) => {
                let (lo, hi) = range.split_once("..").ok_or_else(invalid)?;
                let min = lo.trim().parse().map_err(|_| invalid())?;
                let max = hi.trim().parse().map_err(|_| invalid())?;
                if min > max {
                    return Err(invalid());
                }
                Ok(Self::Integer { min, max })
            }
            ("one-of", Some(list)) => Ok(Self::OneOf(
                list.split('|').map(|o| o.to_string()).collect(),
            )),
            _ => Err(invalid()),
        }
    }
}

/// Rules keyed by field path. Fields without rules are accepted.
///
/// Elements of a multi-valued field are addressed by their slash-joined
/// path, so `list/1` constrains element `1` of `list` only.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: HashMap<String, Vec<Rule>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a rule to a field path.
    pub fn add(&mut self, path: impl Into<String>, rule: Rule) -> &mut Self {
        self.rules.entry(path.into()).or_default().push(rule);
        self
    }

    /// Attach a rule given as `path:rule`, e.g. `port:int=1..65535` or
    /// `dns/0:non-empty`.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::InvalidRule`] if the text cannot be parsed.
    pub fn add_spec(&mut self, spec: &str) -> Result<&mut Self, ParamError> {
        let (name, rule) = spec
            .split_once(':')
            .ok_or_else(|| ParamError::InvalidRule(spec.to_string()))?;
        if name.is_empty() {
            return Err(ParamError::InvalidRule(spec.to_string()));
        }
        let rule = rule.parse()?;
        Ok(self.add(name, rule))
    }

    pub fn rules_for(&self, path: &str) -> &[Rule] {
        self.rules.get(path).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl AcceptanceRule for RuleSet {
    fn accept(&self, path: &str, param: &Parameter) -> bool {
        self.rules_for(path).iter().all(|r| r.check(param.value()))
    }
}

// ---------------------------------------------------------------------------
// Validation pass
// ---------------------------------------------------------------------------

/// Summary of one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Number of records visited, children included.
    pub checked: usize,
    /// Slash-joined paths of rejected records, sorted.
    pub invalid: Vec<String>,
}

impl ValidationReport {
    /// `true` when no field was rejected.
    pub fn is_clean(&self) -> bool {
        self.invalid.is_empty()
    }
}

impl ParameterTable {
    /// Judge every field, recursing into child tables.
    ///
    /// Sets each field's `valid` and `valid_utf8` verdicts. A rejected
    /// field gets its current value copied into its original value; an
    /// accepted one has none. Fields are never renamed or removed.
    pub fn validate(
        &mut self,
        rule: &dyn AcceptanceRule,
        encoding: &dyn EncodingCheck,
    ) -> ValidationReport {
        let mut report = ValidationReport::default();
        validate_level(self, rule, encoding, "", &mut report);
        report.invalid.sort_unstable();
        report
    }
}

/// Validate one table level; returns the conjunction of its verdicts.
fn validate_level(
    table: &mut ParameterTable,
    rule: &dyn AcceptanceRule,
    encoding: &dyn EncodingCheck,
    prefix: &str,
    report: &mut ValidationReport,
) -> (bool, bool) {
    let mut all_valid = true;
    let mut all_utf8 = true;

    for (name, param) in table.iter_mut() {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}/{name}")
        };

        let (valid, utf8) = match param.children_mut() {
            Some(children) => validate_level(children, rule, encoding, &path, report),
            None => (rule.accept(&path, param), encoding.is_well_formed(param.value())),
        };

        param.record_verdict(Verdict::from_bool(valid), Verdict::from_bool(utf8));
        report.checked += 1;

        if !(valid && utf8) {
            crate::trace_debug!(field = path.as_str(), valid, utf8, "parameter rejected");
            report.invalid.push(path);
        }

        all_valid &= valid;
        all_utf8 &= utf8;
    }

    (all_valid, all_utf8)
}

// ---------------------------------------------------------------------------
// Tests (unit)
// ---------------------------------------------------------------------------
