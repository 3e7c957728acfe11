// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Text to OPC UA value coercion.
//!
//! Callers always supply values as text. Before a write, the node's current
//! value decides how that text is interpreted:
//!
//! | Current value | Text handling                                         |
//! |---------------|-------------------------------------------------------|
//! | numeric       | parsed as a decimal number, kept in the node's type   |
//! | boolean       | `true` (any case) or `1` is true, anything else false |
//! | anything else | written unchanged as text                             |
//!
//! Boolean coercion is deliberately lossy: `"yes"` becomes `false`.

use crate::client::OpcUaValue;
use crate::error::{ConversionError, OpcUaError, OpcUaResult};
use crate::types::OpcUaDataType;

// =============================================================================
// ValueKind
// =============================================================================

/// How a node's current value classifies for coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Boolean node.
    Boolean,
    /// Numeric node of the given built-in type.
    Number(OpcUaDataType),
    /// Localized text node; text is written as localized text.
    LocalizedText,
    /// Anything else; text is written as a string.
    Text,
}

impl ValueKind {
    /// Classifies a current value.
    pub fn of(current: &OpcUaValue) -> Self {
        let data_type = current.data_type();
        match current {
            OpcUaValue::Boolean(_) => Self::Boolean,
            OpcUaValue::LocalizedText(_) => Self::LocalizedText,
            _ if data_type.is_numeric() => Self::Number(data_type),
            _ => Self::Text,
        }
    }
}

// =============================================================================
// Coercion
// =============================================================================

/// Converts caller text into a value matching the node's current value.
///
/// # Errors
///
/// Returns a conversion error when a numeric node receives text that is not
/// a number, or a number the node's type cannot hold.
pub fn coerce(current: &OpcUaValue, raw: &str) -> OpcUaResult<OpcUaValue> {
    match ValueKind::of(current) {
        ValueKind::Boolean => Ok(OpcUaValue::Boolean(parse_lossy_bool(raw))),
        ValueKind::Number(data_type) => {
            let number = parse_number(raw, data_type)?;
            to_numeric(number, raw, data_type)
        }
        ValueKind::LocalizedText => Ok(OpcUaValue::LocalizedText(raw.to_string())),
        ValueKind::Text => Ok(OpcUaValue::String(raw.to_string())),
    }
}

/// Converts one method argument: a number if it parses as one, else text.
///
/// Every integer literal is also a valid float literal, so numeric
/// arguments always travel as `Double`.
pub fn coerce_method_argument(raw: &str) -> OpcUaValue {
    match raw.trim().parse::<f64>() {
        Ok(number) => OpcUaValue::Double(number),
        Err(_) => OpcUaValue::String(raw.to_string()),
    }
}

/// `"true"` in any letter case or `"1"`; everything else is false.
#[inline]
pub fn parse_lossy_bool(raw: &str) -> bool {
    raw.eq_ignore_ascii_case("true") || raw == "1"
}

fn parse_number(raw: &str, data_type: OpcUaDataType) -> OpcUaResult<f64> {
    raw.trim().parse::<f64>().map_err(|e| {
        OpcUaError::conversion(ConversionError::invalid_value(
            raw,
            data_type.name(),
            e.to_string(),
        ))
    })
}

fn to_numeric(number: f64, raw: &str, data_type: OpcUaDataType) -> OpcUaResult<OpcUaValue> {
    if !number.is_finite() {
        return Err(OpcUaError::conversion(ConversionError::invalid_value(
            raw,
            data_type.name(),
            "value is not finite",
        )));
    }

    if data_type.is_float() {
        return match data_type {
            OpcUaDataType::Float if number.abs() > f32::MAX as f64 => {
                Err(overflow(raw, data_type))
            }
            OpcUaDataType::Float => Ok(OpcUaValue::Float(number as f32)),
            _ => Ok(OpcUaValue::Double(number)),
        };
    }
    if number.fract() != 0.0 {
        return Err(OpcUaError::conversion(ConversionError::invalid_value(
            raw,
            data_type.name(),
            "value has a fractional part",
        )));
    }

    macro_rules! integer {
        ($variant:ident, $ty:ty) => {
            OpcUaValue::$variant(
                int_in_range(number, <$ty>::MIN, <$ty>::MAX)
                    .ok_or_else(|| overflow(raw, data_type))?,
            )
        };
    }

    Ok(match data_type {
        OpcUaDataType::SByte => integer!(SByte, i8),
        OpcUaDataType::Byte => integer!(Byte, u8),
        OpcUaDataType::Int16 => integer!(Int16, i16),
        OpcUaDataType::UInt16 => integer!(UInt16, u16),
        OpcUaDataType::Int32 => integer!(Int32, i32),
        OpcUaDataType::UInt32 => integer!(UInt32, u32),
        OpcUaDataType::Int64 => integer!(Int64, i64),
        OpcUaDataType::UInt64 => integer!(UInt64, u64),
        other => {
            return Err(OpcUaError::conversion(ConversionError::unsupported_type(
                other.name(),
            )))
        }
    })
}

/// Range check in f64 space. The upper bound is exclusive at `MAX + 1`
/// because `MAX as f64` rounds up for 64-bit types.
fn int_in_range<I>(number: f64, min: I, max: I) -> Option<I>
where
    I: TryFrom<i128> + Into<i128> + Copy,
{
    let (lo, hi) = (min.into() as f64, max.into() as f64 + 1.0);
    if number < lo || number >= hi {
        return None;
    }
    I::try_from(number as i128).ok()
}

fn overflow(raw: &str, data_type: OpcUaDataType) -> OpcUaError {
    OpcUaError::conversion(ConversionError::overflow(raw.trim(), data_type.name()))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_kind() {
        assert_eq!(ValueKind::of(&OpcUaValue::Boolean(false)), ValueKind::Boolean);
        assert_eq!(
            ValueKind::of(&OpcUaValue::UInt16(3)),
            ValueKind::Number(OpcUaDataType::UInt16)
        );
        assert_eq!(ValueKind::of(&OpcUaValue::String("x".into())), ValueKind::Text);
        assert_eq!(ValueKind::of(&OpcUaValue::Null), ValueKind::Text);
    }

    #[test]
    fn test_boolean_coercion_is_lossy() {
        let current = OpcUaValue::Boolean(false);
        for (raw, expected) in [
            ("true", true),
            ("TRUE", true),
            ("True", true),
            ("1", true),
            ("false", false),
            ("0", false),
            ("yes", false),
            ("on", false),
            ("", false),
            (" true", false),
        ] {
            assert_eq!(
                coerce(&current, raw).unwrap(),
                OpcUaValue::Boolean(expected),
                "input {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_numeric_keeps_node_type() {
        assert_eq!(
            coerce(&OpcUaValue::Double(0.0), "42.5").unwrap(),
            OpcUaValue::Double(42.5)
        );
        assert_eq!(
            coerce(&OpcUaValue::Float(0.0), "1.25").unwrap(),
            OpcUaValue::Float(1.25)
        );
        assert_eq!(
            coerce(&OpcUaValue::Int32(0), " 17 ").unwrap(),
            OpcUaValue::Int32(17)
        );
        assert_eq!(
            coerce(&OpcUaValue::UInt16(0), "4e2").unwrap(),
            OpcUaValue::UInt16(400)
        );
        assert_eq!(
            coerce(&OpcUaValue::Int64(0), "-9000000000").unwrap(),
            OpcUaValue::Int64(-9_000_000_000)
        );
    }

    #[test]
    fn test_non_numeric_text_is_conversion_error() {
        let err = coerce(&OpcUaValue::Double(1.0), "abc").unwrap_err();
        assert_eq!(err.category(), "conversion");
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_integer_range_and_fraction() {
        let err = coerce(&OpcUaValue::Byte(0), "256").unwrap_err();
        assert!(matches!(err, OpcUaError::Conversion(ConversionError::Overflow { .. })));

        let err = coerce(&OpcUaValue::UInt32(0), "-1").unwrap_err();
        assert_eq!(err.category(), "conversion");

        let err = coerce(&OpcUaValue::Int32(0), "1.5").unwrap_err();
        assert!(err.to_string().contains("fractional"));

        let err = coerce(&OpcUaValue::Int16(0), "inf").unwrap_err();
        assert_eq!(err.category(), "conversion");

        assert_eq!(
            coerce(&OpcUaValue::SByte(0), "-128").unwrap(),
            OpcUaValue::SByte(-128)
        );
        assert!(coerce(&OpcUaValue::Int64(0), "9223372036854775808").is_err());
    }

    #[test]
    fn test_float_overflow() {
        assert!(coerce(&OpcUaValue::Float(0.0), "1e39").is_err());
        assert_eq!(
            coerce(&OpcUaValue::Double(0.0), "1e39").unwrap(),
            OpcUaValue::Double(1e39)
        );

        for raw in ["NaN", "inf", "-infinity"] {
            for current in [OpcUaValue::Double(0.0), OpcUaValue::Float(0.0)] {
                let err = coerce(&current, raw).unwrap_err();
                assert_eq!(err.category(), "conversion", "{raw} into {current:?}");
                assert!(err.to_string().contains("not finite"));
            }
        }
    }

    #[test]
    fn test_text_passes_through() {
        assert_eq!(
            coerce(&OpcUaValue::String("old".into()), " new value ").unwrap(),
            OpcUaValue::String(" new value ".into())
        );
        assert_eq!(
            coerce(&OpcUaValue::LocalizedText("old".into()), "neu").unwrap(),
            OpcUaValue::LocalizedText("neu".into())
        );
        assert_eq!(
            coerce(&OpcUaValue::Null, "42").unwrap(),
            OpcUaValue::String("42".into())
        );
    }

    #[test]
    fn test_method_arguments() {
        assert_eq!(coerce_method_argument("3"), OpcUaValue::Double(3.0));
        assert_eq!(coerce_method_argument("-2.5"), OpcUaValue::Double(-2.5));
        assert_eq!(
            coerce_method_argument("start"),
            OpcUaValue::String("start".into())
        );
        assert_eq!(coerce_method_argument(""), OpcUaValue::String(String::new()));
    }
}
