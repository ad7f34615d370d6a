use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::collections::hash_map;

use crate::error::ParamError;
use crate::types::{ParamKind, Parameter, ValueBuf, Verdict};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Limits applied while a table absorbs request input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLimits {
    /// Largest value, in bytes, a chunked field may grow to (default: 10 MiB).
    pub max_value_size: usize,
}

impl Default for TableLimits {
    fn default() -> Self {
        Self {
            max_value_size: 10 * 1024 * 1024,
        }
    }
}

// ---------------------------------------------------------------------------
// ParameterTable
// ---------------------------------------------------------------------------

/// The named input fields of one request.
///
/// Names are unique. Adding a name that is already present replaces the
/// old record and drops everything it owned, including child tables.
/// Iteration order is unspecified.
///
/// ```rust
/// use formtable::ParameterTable;
///
/// let mut table = ParameterTable::new();
/// table.append_chunk("upload", b"AB", 0).unwrap();
/// table.append_chunk("upload", b"CD", 2).unwrap();
///
/// assert_eq!(table.value("upload"), Some(&b"ABCD"[..]));
/// assert_eq!(table.value_size("upload"), Some(4));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterTable {
    params: HashMap<String, Parameter>,
    limits: TableLimits,
}

impl ParameterTable {
    /// Create an empty table with default limits.
    pub fn new() -> Self {
        Self::with_limits(TableLimits::default())
    }

    /// Create an empty table with custom limits.
    pub fn with_limits(limits: TableLimits) -> Self {
        Self {
            params: HashMap::new(),
            limits,
        }
    }

    pub fn limits(&self) -> &TableLimits {
        &self.limits
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    // ----- mutation ---------------------------------------------------------

    /// Insert or replace a scalar field holding a copy of `value`.
    ///
    /// The new record is unvalidated and has no original value, filename
    /// or children.
    pub fn add(&mut self, name: impl Into<String>, value: impl AsRef<[u8]>) -> &mut Parameter {
        self.insert(name.into(), Parameter::scalar(value.as_ref()))
    }

    /// Like [`ParameterTable::add`], treating a missing name or value as
    /// the empty string.
    pub fn add_optional(&mut self, name: Option<&str>, value: Option<&[u8]>) -> &mut Parameter {
        self.add(name.unwrap_or_default(), value.unwrap_or_default())
    }

    /// Insert or replace a multi-valued field and return its child table.
    ///
    /// The child table inherits this table's limits.
    pub fn add_multi(&mut self, name: impl Into<String>) -> &mut ParameterTable {
        let children = ParameterTable::with_limits(self.limits.clone());
        let param = self.insert(name.into(), Parameter::from_kind(ParamKind::Multi(children)));
        match param.kind_mut() {
            ParamKind::Multi(table) => table,
            ParamKind::Scalar(_) => unreachable!("record was just inserted as multi-valued"),
        }
    }

    fn insert(&mut self, name: String, param: Parameter) -> &mut Parameter {
        match self.params.entry(name) {
            hash_map::Entry::Occupied(mut slot) => {
                crate::trace_debug!(name = slot.key().as_str(), "replacing parameter");
                slot.insert(param);
                slot.into_mut()
            }
            hash_map::Entry::Vacant(slot) => slot.insert(param),
        }
    }

    /// Absorb a chunk of a field's value delivered at byte `offset`.
    ///
    /// The first chunk for a name creates the field with an allocation of
    /// `offset + data.len() + 1` bytes and a length of `data.len()`, even
    /// when `offset` is non-zero. Later chunks grow the allocation, copy
    /// the data at `offset`, write a terminator byte after it, and add
    /// `data.len()` to the length. Chunks must arrive in non-decreasing
    /// offset order and cover the value for it to come out contiguous.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::GrowthFailure`] when the buffer cannot grow,
    /// leaving the field exactly as it was, and
    /// [`ParamError::NotScalar`] when the name holds a multi-valued field.
    pub fn append_chunk(
        &mut self,
        name: &str,
        data: &[u8],
        offset: usize,
    ) -> Result<&Parameter, ParamError> {
        let limit = self.limits.max_value_size;
        let growth_failure = |requested: usize| {
            crate::trace_warn!(name, requested, "parameter growth failed");
            ParamError::GrowthFailure {
                name: name.to_string(),
                requested,
            }
        };

        match self.params.entry(name.to_string()) {
            hash_map::Entry::Vacant(slot) => {
                let buf = ValueBuf::first_chunk(data, offset, limit).map_err(growth_failure)?;
                Ok(slot.insert(Parameter::from_kind(ParamKind::Scalar(buf))))
            }
            hash_map::Entry::Occupied(slot) => {
                let param = slot.into_mut();
                match param.kind_mut() {
                    ParamKind::Scalar(buf) => {
                        buf.absorb_chunk(data, offset, limit).map_err(growth_failure)?;
                    }
                    ParamKind::Multi(_) => return Err(ParamError::NotScalar(name.to_string())),
                }
                Ok(param)
            }
        }
    }

    /// Mark a field as an uploaded file. Returns `false` for unknown names.
    pub fn set_filename(&mut self, name: &str, filename: impl Into<String>) -> bool {
        match self.params.get_mut(name) {
            Some(param) => {
                param.set_filename(filename);
                true
            }
            None => false,
        }
    }

    /// Overwrite a scalar's value, keeping its verdicts and original value.
    ///
    /// Used to substitute a safe default for a field the validation pass
    /// rejected. Returns `Ok(false)` for unknown names.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::NotScalar`] for multi-valued fields.
    pub fn replace_value(
        &mut self,
        name: &str,
        value: impl AsRef<[u8]>,
    ) -> Result<bool, ParamError> {
        let Some(param) = self.params.get_mut(name) else {
            return Ok(false);
        };
        match param.kind_mut() {
            ParamKind::Scalar(buf) => {
                buf.replace(value.as_ref());
                Ok(true)
            }
            ParamKind::Multi(_) => Err(ParamError::NotScalar(name.to_string())),
        }
    }

    /// Remove every field.
    pub fn clear(&mut self) {
        self.params.clear();
    }

    // ----- lookup -----------------------------------------------------------

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.params.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    /// Value bytes of a field; an empty field yields an empty slice.
    pub fn value(&self, name: &str) -> Option<&[u8]> {
        self.get(name).map(Parameter::value)
    }

    /// Value of a field as UTF-8, when present and valid UTF-8.
    pub fn value_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Parameter::value_as_str)
    }

    pub fn value_size(&self, name: &str) -> Option<usize> {
        self.get(name).map(Parameter::value_size)
    }

    /// `true` when the field is present and its value is not `"0"`.
    pub fn value_as_bool(&self, name: &str) -> bool {
        self.get(name).is_some_and(Parameter::value_as_bool)
    }

    /// `None` for unknown names; `Some(None)` when the field has no
    /// original value.
    pub fn original_value(&self, name: &str) -> Option<Option<&[u8]>> {
        self.get(name).map(Parameter::original_value)
    }

    /// `None` for unknown names; `Some(None)` when the field is not an upload.
    pub fn filename(&self, name: &str) -> Option<Option<&str>> {
        self.get(name).map(Parameter::filename)
    }

    /// `None` for unknown names; `Some(None)` for scalar fields.
    pub fn children(&self, name: &str) -> Option<Option<&ParameterTable>> {
        self.get(name).map(Parameter::children)
    }

    /// `None` for unknown names; otherwise the acceptance verdict.
    pub fn is_valid(&self, name: &str) -> Option<Verdict> {
        self.get(name).map(Parameter::valid)
    }

    /// `None` for unknown names; otherwise the encoding verdict.
    pub fn is_valid_utf8(&self, name: &str) -> Option<Verdict> {
        self.get(name).map(Parameter::valid_utf8)
    }

    /// Iterate over all fields. Order is unspecified.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.params.iter(),
        }
    }

    pub(crate) fn iter_mut(&mut self) -> hash_map::IterMut<'_, String, Parameter> {
        self.params.iter_mut()
    }

    /// Fields sorted by name, for stable output.
    pub fn sorted(&self) -> Vec<(&str, &Parameter)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

/// Iterator over the fields of a [`ParameterTable`].
pub struct Iter<'a> {
    inner: hash_map::Iter<'a, String, Parameter>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a Parameter);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k.as_str(), v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a ParameterTable {
    type Item = (&'a str, &'a Parameter);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Serialize for ParameterTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.sorted())
    }
}

// ---------------------------------------------------------------------------
// Tests (unit)
// ---------------------------------------------------------------------------
