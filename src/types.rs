use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;

use crate::table::ParameterTable;

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Outcome of the validation pass for one check on one parameter.
///
/// Displayed and serialized as `"true"`, `"false"` or `"unvalidated"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Verdict {
    /// The validation pass has not looked at this parameter yet.
    #[default]
    Unvalidated,
    /// The check accepted the parameter.
    Valid,
    /// The check rejected the parameter.
    Invalid,
}

impl Verdict {
    /// Map a boolean check result to a verdict.
    pub fn from_bool(ok: bool) -> Self {
        if ok { Self::Valid } else { Self::Invalid }
    }

    /// `true` only for [`Verdict::Valid`].
    pub fn is_valid(self) -> bool {
        self == Self::Valid
    }

    /// Return the verdict as a static string slice.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unvalidated => "unvalidated",
            Self::Valid => "true",
            Self::Invalid => "false",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Verdict {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ValueBuf
// ---------------------------------------------------------------------------

/// A growable value buffer whose logical length is tracked apart from its
/// allocation.
///
/// The allocation is always at least one byte longer than the logical
/// length, so there is room for a terminator after the value. Values may
/// contain embedded zero bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueBuf {
    buf: Vec<u8>,
    len: usize,
}

impl ValueBuf {
    /// Copy `bytes` into a new buffer followed by a terminator byte.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buf = Vec::with_capacity(bytes.len() + 1);
        buf.extend_from_slice(bytes);
        buf.push(0);
        Self {
            buf,
            len: bytes.len(),
        }
    }

    /// The logical value.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// The whole allocation, including terminator and any padding.
    pub fn padded(&self) -> &[u8] {
        &self.buf
    }

    /// Logical length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` when the logical value is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Build the buffer for the first chunk of a field.
    ///
    /// The allocation is `offset + size + 1` bytes and the logical length
    /// is `size`, whatever the offset. On failure the requested allocation
    /// size is returned.
    pub(crate) fn first_chunk(data: &[u8], offset: usize, limit: usize) -> Result<Self, usize> {
        let end = offset.checked_add(data.len()).ok_or(usize::MAX)?;
        let needed = end.checked_add(1).ok_or(usize::MAX)?;
        if needed > limit.saturating_add(1) {
            return Err(needed);
        }

        let mut buf = Vec::new();
        buf.try_reserve_exact(needed).map_err(|_| needed)?;
        buf.resize(needed, 0);
        buf[offset..end].copy_from_slice(data);

        Ok(Self {
            buf,
            len: data.len(),
        })
    }

    /// Absorb a further chunk at `offset`, growing the allocation first.
    ///
    /// The logical length grows by the chunk size, not to `offset + size`.
    /// The allocation never shrinks. If growth fails the buffer is left
    /// exactly as it was and the requested size is returned.
    pub(crate) fn absorb_chunk(
        &mut self,
        data: &[u8],
        offset: usize,
        limit: usize,
    ) -> Result<(), usize> {
        let size = data.len();
        let end = offset.checked_add(size).ok_or(usize::MAX)?;
        let new_len = self.len.checked_add(size).ok_or(usize::MAX)?;
        let needed = new_len
            .max(end)
            .checked_add(1)
            .ok_or(usize::MAX)?
            .max(self.buf.len());
        if needed > limit.saturating_add(1) {
            return Err(needed);
        }

        if needed > self.buf.len() {
            self.buf.try_reserve_exact(needed - self.buf.len()).map_err(|_| needed)?;
            self.buf.resize(needed, 0);
        }

        self.buf[offset..end].copy_from_slice(data);
        self.buf[end] = 0;
        self.len = new_len;
        Ok(())
    }

    /// Overwrite the value, dropping the old allocation.
    pub(crate) fn replace(&mut self, bytes: &[u8]) {
        *self = Self::from_bytes(bytes);
    }
}

// ---------------------------------------------------------------------------
// Parameter
// ---------------------------------------------------------------------------

/// The payload of a parameter: a single value or a nested table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    /// A plain field holding one value.
    Scalar(ValueBuf),
    /// An array or multi-value field holding its elements as a child table.
    Multi(ParameterTable),
}

/// One named input field of a decoded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    kind: ParamKind,
    original_value: Option<Vec<u8>>,
    filename: Option<String>,
    valid: Verdict,
    valid_utf8: Verdict,
}

impl Parameter {
    /// A scalar parameter holding a copy of `value`.
    pub fn scalar(value: &[u8]) -> Self {
        Self::from_kind(ParamKind::Scalar(ValueBuf::from_bytes(value)))
    }

    /// A multi-valued parameter with an empty child table.
    pub fn multi() -> Self {
        Self::from_kind(ParamKind::Multi(ParameterTable::new()))
    }

    pub(crate) fn from_kind(kind: ParamKind) -> Self {
        Self {
            kind,
            original_value: None,
            filename: None,
            valid: Verdict::Unvalidated,
            valid_utf8: Verdict::Unvalidated,
        }
    }

    pub fn kind(&self) -> &ParamKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut ParamKind {
        &mut self.kind
    }

    /// The value bytes. Multi-valued parameters have an empty value.
    pub fn value(&self) -> &[u8] {
        match &self.kind {
            ParamKind::Scalar(buf) => buf.as_bytes(),
            ParamKind::Multi(_) => &[],
        }
    }

    /// Length of [`Parameter::value`] in bytes.
    pub fn value_size(&self) -> usize {
        self.value().len()
    }

    /// `false` only when the value is exactly the text `"0"`.
    pub fn value_as_bool(&self) -> bool {
        self.value() != b"0"
    }

    /// The value as UTF-8, if it is valid UTF-8.
    pub fn value_as_str(&self) -> Option<&str> {
        std::str::from_utf8(self.value()).ok()
    }

    /// The value before validation replaced it; only set for invalid fields.
    pub fn original_value(&self) -> Option<&[u8]> {
        self.original_value.as_deref()
    }

    /// Client-supplied filename of an uploaded field.
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn set_filename(&mut self, filename: impl Into<String>) {
        self.filename = Some(filename.into());
    }

    /// Child table of a multi-valued parameter.
    pub fn children(&self) -> Option<&ParameterTable> {
        match &self.kind {
            ParamKind::Multi(table) => Some(table),
            ParamKind::Scalar(_) => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut ParameterTable> {
        match &mut self.kind {
            ParamKind::Multi(table) => Some(table),
            ParamKind::Scalar(_) => None,
        }
    }

    pub fn is_multi(&self) -> bool {
        matches!(self.kind, ParamKind::Multi(_))
    }

    /// Number of child elements; zero for scalars.
    pub fn array_len(&self) -> usize {
        self.children().map_or(0, ParameterTable::len)
    }

    /// Verdict of the acceptance rule.
    pub fn valid(&self) -> Verdict {
        self.valid
    }

    /// Verdict of the encoding check.
    pub fn valid_utf8(&self) -> Verdict {
        self.valid_utf8
    }

    /// Record the validation outcome.
    ///
    /// A rejected parameter keeps a copy of its current value as the
    /// original value; an accepted one has none.
    pub(crate) fn record_verdict(&mut self, valid: Verdict, valid_utf8: Verdict) {
        self.valid = valid;
        self.valid_utf8 = valid_utf8;
        self.original_value = if valid == Verdict::Invalid || valid_utf8 == Verdict::Invalid {
            Some(self.value().to_vec())
        } else {
            None
        };
    }
}

impl Serialize for Parameter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Parameter", 6)?;
        match &self.kind {
            ParamKind::Scalar(buf) => {
                s.serialize_field("value", &String::from_utf8_lossy(buf.as_bytes()))?;
                s.serialize_field("children", &None::<()>)?;
            }
            ParamKind::Multi(table) => {
                s.serialize_field("value", &None::<()>)?;
                s.serialize_field("children", table)?;
            }
        }
        s.serialize_field(
            "original_value",
            &self
                .original_value
                .as_ref()
                .map(|v| String::from_utf8_lossy(v).into_owned()),
        )?;
        s.serialize_field("filename", &self.filename)?;
        s.serialize_field("valid", &self.valid)?;
        s.serialize_field("valid_utf8", &self.valid_utf8)?;
        s.end()
    }
}

// ---------------------------------------------------------------------------
// Tests (unit)
// ---------------------------------------------------------------------------
