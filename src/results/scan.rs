use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

use crate::types::RowValues;

/// A typed write target for one column of a row.
///
/// Implemented for the plain Rust types a column decodes into; `Option<T>` accepts NULL.
pub trait ScanTarget {
    /// Store `value` into `self`.
    ///
    /// # Errors
    /// Returns a message describing the mismatch when `value` cannot be represented.
    fn scan_value(&mut self, value: &RowValues) -> Result<(), String>;
}

/// A record type that knows its own column targets, in column order.
///
/// The adapter form of a field extractor:
/// ```rust
/// use sql_dialects::prelude::*;
///
/// #[derive(Default)]
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// impl Scannable for User {
///     fn scan_targets(&mut self) -> Vec<&mut dyn ScanTarget> {
///         vec![&mut self.id, &mut self.name]
///     }
/// }
/// ```
pub trait Scannable: Default {
    fn scan_targets(&mut self) -> Vec<&mut dyn ScanTarget>;
}

fn mismatch(expected: &str, value: &RowValues) -> String {
    format!("cannot scan {} value into {expected}", value.kind())
}

impl ScanTarget for i64 {
    fn scan_value(&mut self, value: &RowValues) -> Result<(), String> {
        match value {
            RowValues::Int(v) => *self = *v,
            RowValues::Bool(b) => *self = i64::from(*b),
            other => return Err(mismatch("i64", other)),
        }
        Ok(())
    }
}

impl ScanTarget for i32 {
    fn scan_value(&mut self, value: &RowValues) -> Result<(), String> {
        let RowValues::Int(v) = value else {
            return Err(mismatch("i32", value));
        };
        *self = i32::try_from(*v).map_err(|e| format!("{v} out of range for i32: {e}"))?;
        Ok(())
    }
}

impl ScanTarget for i16 {
    fn scan_value(&mut self, value: &RowValues) -> Result<(), String> {
        let RowValues::Int(v) = value else {
            return Err(mismatch("i16", value));
        };
        *self = i16::try_from(*v).map_err(|e| format!("{v} out of range for i16: {e}"))?;
        Ok(())
    }
}

impl ScanTarget for f64 {
    fn scan_value(&mut self, value: &RowValues) -> Result<(), String> {
        *self = value.as_float().ok_or_else(|| mismatch("f64", value))?;
        Ok(())
    }
}

impl ScanTarget for bool {
    fn scan_value(&mut self, value: &RowValues) -> Result<(), String> {
        *self = *value.as_bool().ok_or_else(|| mismatch("bool", value))?;
        Ok(())
    }
}

impl ScanTarget for String {
    fn scan_value(&mut self, value: &RowValues) -> Result<(), String> {
        match value {
            RowValues::Text(s) => s.clone_into(self),
            RowValues::JSON(v) => *self = v.to_string(),
            other => return Err(mismatch("String", other)),
        }
        Ok(())
    }
}

impl ScanTarget for NaiveDateTime {
    fn scan_value(&mut self, value: &RowValues) -> Result<(), String> {
        *self = value
            .as_timestamp()
            .ok_or_else(|| mismatch("NaiveDateTime", value))?;
        Ok(())
    }
}

impl ScanTarget for Vec<u8> {
    fn scan_value(&mut self, value: &RowValues) -> Result<(), String> {
        match value {
            RowValues::Blob(b) => b.clone_into(self),
            RowValues::Text(s) => *self = s.as_bytes().to_vec(),
            other => return Err(mismatch("Vec<u8>", other)),
        }
        Ok(())
    }
}

impl ScanTarget for JsonValue {
    fn scan_value(&mut self, value: &RowValues) -> Result<(), String> {
        match value {
            RowValues::JSON(v) => *self = v.clone(),
            RowValues::Text(s) => {
                *self = serde_json::from_str(s).map_err(|e| format!("invalid json text: {e}"))?;
            }
            other => return Err(mismatch("serde_json::Value", other)),
        }
        Ok(())
    }
}

impl ScanTarget for RowValues {
    fn scan_value(&mut self, value: &RowValues) -> Result<(), String> {
        *self = value.clone();
        Ok(())
    }
}

impl<T: ScanTarget + Default> ScanTarget for Option<T> {
    fn scan_value(&mut self, value: &RowValues) -> Result<(), String> {
        if value.is_null() {
            *self = None;
            return Ok(());
        }
        let mut inner = T::default();
        inner.scan_value(value)?;
        *self = Some(inner);
        Ok(())
    }
}
