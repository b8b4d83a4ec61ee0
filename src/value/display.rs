//! Display implementation for Value as JSON-like literals.

use super::Value;

impl core::fmt::Display for Value {
    /// Format a Value as a JSON-like literal, for diagnostics and logs.
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Real(v) => {
                if v.is_nan() {
                    write!(f, "NaN")
                } else {
                    write!(f, "{v}")
                }
            }
            Value::Text(s) => {
                // Escape double quotes by backslashing them
                write!(f, "\"")?;
                for c in s.chars() {
                    if c == '"' {
                        write!(f, "\\\"")?;
                    } else {
                        core::fmt::Write::write_char(f, c)?;
                    }
                }
                write!(f, "\"")
            }
            Value::Blob(b) => {
                write!(f, "0x")?;
                for byte in b.iter() {
                    write!(f, "{byte:02X}")?;
                }
                Ok(())
            }
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "\"{key}\": {value}")?;
                }
                write!(f, "}}")
            }
            Value::Opaque(_) => write!(f, "<opaque>"),
        }
    }
}
