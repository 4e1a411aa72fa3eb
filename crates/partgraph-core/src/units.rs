//! # Units and Quantities
//!
//! Physical quantities for design parameters.
//!
//! A `Quantity` stores its magnitude as an integer count of femto-units
//! (10^-15 of the base SI unit) in an `i128`. This keeps every comparison
//! in the parameter algebra exact and deterministic:
//! - No floating point anywhere in the engine
//! - `5V` and `5000mV` are the same value, bit for bit
//! - Range from 1fF up to 10^9 GΩ without overflow
//!
//! Quantities parse from and print to engineering notation (`100nF`,
//! `3.15V`, `2.54mm`, `900mcd`). The printed form always parses back to the
//! identical value.

use crate::PartError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Femto-units per base unit.
pub const FEMTO_PER_UNIT: i128 = 1_000_000_000_000_000;

/// Exponent of the femto scale.
const FEMTO_EXPONENT: i32 = -15;

/// SI prefixes accepted by the parser, largest first.
const PREFIXES: [(&str, i32); 9] = [
    ("G", 9),
    ("M", 6),
    ("k", 3),
    ("m", -3),
    ("u", -6),
    ("µ", -6),
    ("n", -9),
    ("p", -12),
    ("f", -15),
];

/// Prefixes used when printing, largest first.
const DISPLAY_PREFIXES: [(&str, i32); 9] = [
    ("G", 9),
    ("M", 6),
    ("k", 3),
    ("", 0),
    ("m", -3),
    ("u", -6),
    ("n", -9),
    ("p", -12),
    ("f", -15),
];

// =============================================================================
// UNIT
// =============================================================================

/// Physical dimension of a quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Unit {
    Dimensionless,
    Ohm,
    Farad,
    Henry,
    Volt,
    Ampere,
    Watt,
    Hertz,
    Meter,
    Candela,
}

impl Unit {
    /// Canonical printed symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Dimensionless => "",
            Self::Ohm => "Ω",
            Self::Farad => "F",
            Self::Henry => "H",
            Self::Volt => "V",
            Self::Ampere => "A",
            Self::Watt => "W",
            Self::Hertz => "Hz",
            Self::Meter => "m",
            Self::Candela => "cd",
        }
    }

    /// Accepted unit suffixes. Longest spellings come first so that `Hz`
    /// wins over `H` and `ohm` over `m`.
    const SUFFIXES: [(&'static str, Unit); 11] = [
        ("ohm", Unit::Ohm),
        ("Hz", Unit::Hertz),
        ("cd", Unit::Candela),
        ("Ω", Unit::Ohm),
        ("F", Unit::Farad),
        ("H", Unit::Henry),
        ("V", Unit::Volt),
        ("A", Unit::Ampere),
        ("W", Unit::Watt),
        ("R", Unit::Ohm),
        ("m", Unit::Meter),
    ];
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// =============================================================================
// QUANTITY
// =============================================================================

/// A magnitude with a unit, stored as integer femto-units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Quantity {
    femto: i128,
    unit: Unit,
}

impl Quantity {
    /// Create a quantity from a raw femto-unit count.
    #[must_use]
    pub const fn from_femto(femto: i128, unit: Unit) -> Self {
        Self { femto, unit }
    }

    /// Create `value * 10^exponent` of `unit`.
    ///
    /// Exponents below -15 are clamped to the femto scale. Overflow saturates.
    #[must_use]
    pub fn scaled(value: i64, exponent: i32, unit: Unit) -> Self {
        let shift = exponent.saturating_sub(FEMTO_EXPONENT).max(0) as u32;
        Self {
            femto: (value as i128).saturating_mul(pow10(shift)),
            unit,
        }
    }

    /// Create a whole number of base units.
    #[must_use]
    pub fn base(value: i64, unit: Unit) -> Self {
        Self::scaled(value, 0, unit)
    }

    /// Raw femto-unit count.
    #[must_use]
    pub const fn femto(&self) -> i128 {
        self.femto
    }

    /// The unit of this quantity.
    #[must_use]
    pub const fn unit(&self) -> Unit {
        self.unit
    }

    /// Compare two quantities. `None` when the units differ.
    #[must_use]
    pub fn try_cmp(&self, other: &Self) -> Option<Ordering> {
        (self.unit == other.unit).then(|| self.femto.cmp(&other.femto))
    }

    /// Magnitude in whole micrometres, for lengths.
    #[must_use]
    pub fn to_micrometers(&self) -> Option<i64> {
        if self.unit != Unit::Meter {
            return None;
        }
        i64::try_from(self.femto / pow10(9)).ok()
    }

    /// Add `delta` femto-units, saturating.
    #[must_use]
    pub(crate) fn offset(&self, delta: i128) -> Self {
        Self {
            femto: self.femto.saturating_add(delta),
            unit: self.unit,
        }
    }
}

/// `10^n` as i128. `n` must stay below 39.
pub(crate) const fn pow10(n: u32) -> i128 {
    let mut result: i128 = 1;
    let mut i = 0;
    while i < n {
        result = result.saturating_mul(10);
        i += 1;
    }
    result
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.femto < 0 { "-" } else { "" };
        let magnitude = self.femto.unsigned_abs();

        // Dimensionless values print as plain decimals: a bare "m" would read
        // back as metres. Zero takes no prefix.
        let (prefix, exponent) = if self.unit == Unit::Dimensionless || magnitude == 0 {
            ("", 0)
        } else {
            DISPLAY_PREFIXES
                .iter()
                .copied()
                .find(|(_, exp)| magnitude >= pow10((exp - FEMTO_EXPONENT) as u32) as u128)
                .unwrap_or(("f", FEMTO_EXPONENT))
        };

        let scale = pow10((exponent - FEMTO_EXPONENT) as u32) as u128;
        let whole = magnitude / scale;
        let mut fraction = magnitude % scale;

        write!(f, "{sign}{whole}")?;
        if fraction != 0 {
            let mut digits = (exponent - FEMTO_EXPONENT) as usize;
            while fraction % 10 == 0 {
                fraction /= 10;
                digits -= 1;
            }
            write!(f, ".{fraction:0digits$}")?;
        }
        write!(f, "{prefix}{}", self.unit)
    }
}

impl FromStr for Quantity {
    type Err = PartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let invalid = || PartError::InvalidValue(format!("not a quantity: '{s}'"));

        let numeric_end = text
            .char_indices()
            .find(|(i, c)| !(c.is_ascii_digit() || *c == '.' || (*i == 0 && *c == '-')))
            .map(|(i, _)| i)
            .unwrap_or(text.len());
        let (number, suffix) = text.split_at(numeric_end);
        let suffix = suffix.trim();

        if number.is_empty() || number == "-" || number == "." {
            return Err(invalid());
        }

        let (unit, prefix) = Unit::SUFFIXES
            .iter()
            .find_map(|(symbol, unit)| suffix.strip_suffix(symbol).map(|rest| (*unit, rest)))
            .unwrap_or((Unit::Dimensionless, suffix));

        let exponent = if prefix.is_empty() {
            0
        } else {
            PREFIXES
                .iter()
                .find(|(p, _)| *p == prefix)
                .map(|(_, exp)| *exp)
                .ok_or_else(invalid)?
        };

        let negative = number.starts_with('-');
        let digits = number.trim_start_matches('-');
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        if fraction.contains('.') || (whole.is_empty() && fraction.is_empty()) {
            return Err(invalid());
        }

        let mantissa_text = format!("{whole}{fraction}");
        let mantissa: i128 = mantissa_text.parse().map_err(|_| invalid())?;

        let shift = exponent - FEMTO_EXPONENT - fraction.len() as i32;
        if shift < 0 {
            return Err(PartError::InvalidValue(format!(
                "'{s}' is finer than the femto resolution"
            )));
        }

        let femto = mantissa
            .checked_mul(pow10(shift as u32))
            .ok_or_else(|| PartError::InvalidValue(format!("'{s}' is out of range")))?;

        Ok(Self {
            femto: if negative { -femto } else { femto },
            unit,
        })
    }
}

impl From<Quantity> for String {
    fn from(q: Quantity) -> Self {
        q.to_string()
    }
}

impl TryFrom<String> for Quantity {
    type Error = PartError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// =============================================================================
// VALUE
// =============================================================================

/// The value held by an exact parameter: a physical quantity or a symbolic
/// tag such as an LED color or a capacitor dielectric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Value {
    Quantity(Quantity),
    Enum(String),
}

impl Value {
    /// Symbolic tag value.
    #[must_use]
    pub fn tag(s: impl Into<String>) -> Self {
        Self::Enum(s.into())
    }

    /// The quantity, if this is one.
    #[must_use]
    pub fn as_quantity(&self) -> Option<&Quantity> {
        match self {
            Self::Quantity(q) => Some(q),
            Self::Enum(_) => None,
        }
    }
}

impl From<Quantity> for Value {
    fn from(q: Quantity) -> Self {
        Self::Quantity(q)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quantity(q) => write!(f, "{q}"),
            Self::Enum(tag) => f.write_str(tag),
        }
    }
}

impl FromStr for Value {
    type Err = PartError;

    /// Anything starting like a number must be a valid quantity; any other
    /// non-empty identifier is an enum tag.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        match text.chars().next() {
            None => Err(PartError::InvalidValue("empty value".to_string())),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '.' => {
                text.parse().map(Self::Quantity)
            }
            Some(_) => {
                if text
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
                {
                    Ok(Self::Enum(text.to_string()))
                } else {
                    Err(PartError::InvalidValue(format!("not a value: '{s}'")))
                }
            }
        }
    }
}

impl From<Value> for String {
    fn from(v: Value) -> Self {
        v.to_string()
    }
}

impl TryFrom<String> for Value {
    type Error = PartError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// =============================================================================
// TESTS
// =============================================================================
