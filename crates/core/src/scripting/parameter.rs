//! Script parameters and their command-line rendering.
//!
//! A [`Parameter`] is either positional (`<value>`) or named
//! (`-<name> <value>`). Both variants share [`format_value`], which applies
//! the [`QuoteOption`] to text values only.

use std::fmt;

use crate::error::PsError;

/// Quoting policy for text parameter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteOption {
    /// Wrap the value in `"""` so it survives the command-line parsing layer
    /// and reaches the interpreter as a single double-quoted string.
    #[default]
    Quote,
    /// Emit the raw text. Commas and spaces inside the value are left for
    /// the interpreter to treat as separators.
    NoQuotes,
}

/// A parameter value: text or a primitive rendered via its `Display` form.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    Boolean(bool),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Unsigned(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for ParamValue {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

macro_rules! impl_from_primitive {
    ($variant:ident, $target:ty, $($source:ty),+) => {
        $(
            impl From<$source> for ParamValue {
                fn from(value: $source) -> Self {
                    Self::$variant(<$target>::from(value))
                }
            }
        )+
    };
}

impl_from_primitive!(Integer, i64, i8, i16, i32, i64, u8, u16, u32);
impl_from_primitive!(Unsigned, u64, u64);
impl_from_primitive!(Float, f64, f32, f64);
impl_from_primitive!(Boolean, bool, bool);

/// One parameter appended to a script's command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    Positional {
        value: ParamValue,
        quote: QuoteOption,
    },
    Named {
        name: String,
        value: ParamValue,
        quote: QuoteOption,
    },
}

impl Parameter {
    /// Create a positional parameter, rejecting a blank value.
    pub fn positional(value: impl Into<ParamValue>, quote: QuoteOption) -> Result<Self, PsError> {
        let value = validate_value(value.into())?;
        Ok(Self::Positional { value, quote })
    }

    /// Create a named parameter, rejecting a blank name or value.
    pub fn named(
        name: impl Into<String>,
        value: impl Into<ParamValue>,
        quote: QuoteOption,
    ) -> Result<Self, PsError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(PsError::InvalidArgument(
                "parameter name must not be blank".to_string(),
            ));
        }
        let value = validate_value(value.into())?;
        Ok(Self::Named { name, value, quote })
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Positional { .. } => None,
            Self::Named { name, .. } => Some(name),
        }
    }

    pub fn value(&self) -> &ParamValue {
        match self {
            Self::Positional { value, .. } | Self::Named { value, .. } => value,
        }
    }

    pub fn quote(&self) -> QuoteOption {
        match self {
            Self::Positional { quote, .. } | Self::Named { quote, .. } => *quote,
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positional { value, quote } => f.write_str(&format_value(value, *quote)),
            Self::Named { name, value, quote } => {
                write!(f, "-{name} {}", format_value(value, *quote))
            }
        }
    }
}

/// Render a value as interpreter-syntax text.
///
/// Only text values are affected by the quote option.
pub fn format_value(value: &ParamValue, quote: QuoteOption) -> String {
    match (value, quote) {
        (ParamValue::Text(text), QuoteOption::Quote) => format!("\"\"\"{text}\"\"\""),
        (other, _) => other.to_string(),
    }
}

fn validate_value(value: ParamValue) -> Result<ParamValue, PsError> {
    if value.to_string().trim().is_empty() {
        return Err(PsError::InvalidArgument(
            "parameter value must not be blank".to_string(),
        ));
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
