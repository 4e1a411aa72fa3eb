//! # Parameter Algebra
//!
//! A `Parameter` is a narrowable constraint cell for one design attribute.
//!
//! ```text
//! Unset  - nothing stated yet
//! Any    - explicitly unconstrained
//! Exact  - one value
//! Range  - inclusive [lo, hi] over quantities of one unit
//! ```
//!
//! Parameters change only through [`Parameter::merge`], which returns the
//! tightest constraint consistent with both operands or a [`MergeConflict`].
//! Merge is commutative, associative and idempotent, so constraints can be
//! accumulated from independent call sites in any order and never widen.

use crate::PartError;
use crate::types::MergeConflict;
use crate::units::{Quantity, Unit, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// RANGE
// =============================================================================

/// Inclusive interval over quantities of a single unit. Always `lo <= hi`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    lo: Quantity,
    hi: Quantity,
}

impl Range {
    /// Create a range, rejecting mixed units and inverted bounds.
    pub fn new(lo: Quantity, hi: Quantity) -> Result<Self, PartError> {
        match lo.try_cmp(&hi) {
            None => Err(PartError::InvalidRange(format!(
                "{lo}..{hi} mixes {} and {}",
                lo.unit(),
                hi.unit()
            ))),
            Some(Ordering::Greater) => Err(PartError::InvalidRange(format!(
                "{lo}..{hi} has lo > hi"
            ))),
            Some(_) => Ok(Self { lo, hi }),
        }
    }

    /// `center +- percent%`, widened outward to whole femto-units.
    pub fn from_center_rel(center: Quantity, percent: u32) -> Result<Self, PartError> {
        if percent > 100 {
            return Err(PartError::InvalidRange(format!(
                "{center} +- {percent}% exceeds 100%"
            )));
        }
        let femto = center.femto();
        let scaled = femto.unsigned_abs().saturating_mul(percent as u128);
        let delta = scaled.div_ceil(100).min(i128::MAX as u128) as i128;
        Self::new(center.offset(-delta), center.offset(delta))
    }

    /// Range between two magnitudes of one unit, in either order.
    #[must_use]
    pub fn scaled(a: i64, b: i64, exponent: i32, unit: Unit) -> Self {
        let (a, b) = (Quantity::scaled(a, exponent, unit), Quantity::scaled(b, exponent, unit));
        if a.femto() <= b.femto() {
            Self { lo: a, hi: b }
        } else {
            Self { lo: b, hi: a }
        }
    }

    #[must_use]
    pub const fn lo(&self) -> Quantity {
        self.lo
    }

    #[must_use]
    pub const fn hi(&self) -> Quantity {
        self.hi
    }

    /// Whether `q` lies inside. Quantities of another unit are never inside.
    #[must_use]
    pub fn contains(&self, q: &Quantity) -> bool {
        matches!(
            self.lo.try_cmp(q),
            Some(Ordering::Less | Ordering::Equal)
        ) && matches!(
            q.try_cmp(&self.hi),
            Some(Ordering::Less | Ordering::Equal)
        )
    }

    /// Intersection. `None` when disjoint or of different units.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        if self.lo.unit() != other.lo.unit() {
            return None;
        }
        let lo = if self.lo.femto() >= other.lo.femto() {
            self.lo
        } else {
            other.lo
        };
        let hi = if self.hi.femto() <= other.hi.femto() {
            self.hi
        } else {
            other.hi
        };
        (lo.femto() <= hi.femto()).then_some(Self { lo, hi })
    }

    /// Whether `other` lies entirely inside `self`.
    #[must_use]
    pub fn covers(&self, other: &Self) -> bool {
        self.contains(&other.lo) && self.contains(&other.hi)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.lo, self.hi)
    }
}

// =============================================================================
// PARAMETER
// =============================================================================

/// A value-or-constraint cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Parameter {
    #[default]
    Unset,
    Any,
    Exact(Value),
    Range(Range),
}

impl Parameter {
    /// Exact quantity or tag.
    #[must_use]
    pub fn exact(value: impl Into<Value>) -> Self {
        Self::Exact(value.into())
    }

    /// Range from two quantities.
    pub fn range(lo: Quantity, hi: Quantity) -> Result<Self, PartError> {
        Range::new(lo, hi).map(Self::Range)
    }

    /// Resolve two constraints into the tightest one consistent with both.
    pub fn merge(&self, other: &Self) -> Result<Self, MergeConflict> {
        let conflict = || MergeConflict {
            left: self.to_string(),
            right: other.to_string(),
        };

        match (self, other) {
            (Self::Unset, x) | (x, Self::Unset) => Ok(x.clone()),
            (Self::Any, x) | (x, Self::Any) => Ok(x.clone()),
            (Self::Exact(a), Self::Exact(b)) => {
                if a == b {
                    Ok(self.clone())
                } else {
                    Err(conflict())
                }
            }
            (Self::Exact(v), Self::Range(r)) | (Self::Range(r), Self::Exact(v)) => {
                match v.as_quantity() {
                    Some(q) if r.contains(q) => Ok(Self::Exact(v.clone())),
                    _ => Err(conflict()),
                }
            }
            (Self::Range(a), Self::Range(b)) => {
                a.intersect(b).map(Self::Range).ok_or_else(conflict)
            }
        }
    }

    /// The tightest equivalent form: a degenerate range becomes `Exact`.
    #[must_use]
    pub fn most_narrow(&self) -> Self {
        match self {
            Self::Range(r) if r.lo == r.hi => Self::Exact(Value::Quantity(r.lo)),
            other => other.clone(),
        }
    }

    /// Still `Unset` or `Any`, so eligible for default filling.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Unset | Self::Any)
    }

    /// Whether every value admitted by `self` is admitted by `other`.
    #[must_use]
    pub fn is_within(&self, other: &Self) -> bool {
        match (self.most_narrow(), other.most_narrow()) {
            (_, Self::Unset | Self::Any) => true,
            (Self::Unset | Self::Any, _) => false,
            (Self::Exact(a), Self::Exact(b)) => a == b,
            (Self::Exact(v), Self::Range(r)) => v.as_quantity().is_some_and(|q| r.contains(q)),
            (Self::Range(_), Self::Exact(_)) => false,
            (Self::Range(a), Self::Range(b)) => b.covers(&a),
        }
    }
}

impl From<Value> for Parameter {
    fn from(v: Value) -> Self {
        Self::Exact(v)
    }
}

impl From<Quantity> for Parameter {
    fn from(q: Quantity) -> Self {
        Self::Exact(Value::Quantity(q))
    }
}

impl From<Range> for Parameter {
    fn from(r: Range) -> Self {
        Self::Range(r)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => f.write_str("unset"),
            Self::Any => f.write_str("any"),
            Self::Exact(v) => write!(f, "{v}"),
            Self::Range(r) => write!(f, "{r}"),
        }
    }
}

impl FromStr for Parameter {
    type Err = PartError;

    /// Accepts `unset`, `any`, `lo..hi`, `center +- N%`, a quantity, or an
    /// enum tag.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        match text {
            "unset" => return Ok(Self::Unset),
            "any" => return Ok(Self::Any),
            _ => {}
        }

        if let Some((lo, hi)) = text.split_once("..") {
            return Self::range(lo.parse()?, hi.parse()?);
        }

        if let Some((center, tolerance)) = text.split_once("+-") {
            let percent = tolerance
                .trim()
                .strip_suffix('%')
                .and_then(|p| p.trim().parse::<u32>().ok())
                .ok_or_else(|| {
                    PartError::InvalidValue(format!("tolerance must be 'N%': '{s}'"))
                })?;
            return Range::from_center_rel(center.parse()?, percent).map(Self::Range);
        }

        text.parse::<Value>().map(Self::Exact)
    }
}

impl From<Parameter> for String {
    fn from(p: Parameter) -> Self {
        p.to_string()
    }
}

impl TryFrom<String> for Parameter {
    type Error = PartError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Parameter {
        s.parse().expect("parse")
    }

    #[test]
    fn scaled_range_orders_its_bounds() {
        let range = Range::scaled(55, 11, -1, Unit::Volt);
        assert_eq!(Parameter::Range(range), p("1.1V..5.5V"));
        assert_eq!(range.lo(), Quantity::scaled(11, -1, Unit::Volt));
    }

    fn ohm(n: i64) -> Quantity {
        Quantity::base(n, Unit::Ohm)
    }

    #[test]
    fn unset_is_identity() {
        for x in ["unset", "any", "5V", "1V..2V", "GREEN"] {
            assert_eq!(p("unset").merge(&p(x)).expect("merge"), p(x));
            assert_eq!(p(x).merge(&p("unset")).expect("merge"), p(x));
        }
    }

    #[test]
    fn any_yields_other() {
        assert_eq!(p("any").merge(&p("5V")).expect("merge"), p("5V"));
        assert_eq!(p("1V..2V").merge(&p("any")).expect("merge"), p("1V..2V"));
        assert_eq!(p("any").merge(&p("unset")).expect("merge"), Parameter::Any);
        assert_eq!(p("unset").merge(&p("any")).expect("merge"), Parameter::Any);
    }

    #[test]
    fn exact_against_range_from_merge_conflict_examples() {
        let five = Parameter::exact(ohm(5));
        let ten_twenty = Parameter::range(ohm(10), ohm(20)).expect("range");
        assert!(five.merge(&ten_twenty).is_err());

        let one_five = Parameter::range(ohm(1), ohm(5)).expect("range");
        let six_ten = Parameter::range(ohm(6), ohm(10)).expect("range");
        assert!(one_five.merge(&six_ten).is_err());

        let one_ten = Parameter::range(ohm(1), ohm(10)).expect("range");
        let five_twenty = Parameter::range(ohm(5), ohm(20)).expect("range");
        assert_eq!(
            one_ten.merge(&five_twenty).expect("merge"),
            Parameter::range(ohm(5), ohm(10)).expect("range")
        );
    }

    #[test]
    fn exact_inside_range_stays_exact() {
        let merged = p("100Ω").merge(&p("90Ω..110Ω")).expect("merge");
        assert_eq!(merged, p("100Ω"));
        let merged = p("90Ω..110Ω").merge(&p("100Ω")).expect("merge");
        assert_eq!(merged, p("100Ω"));
    }

    #[test]
    fn exact_exact_requires_equality() {
        assert_eq!(p("5V").merge(&p("5000mV")).expect("merge"), p("5V"));
        assert!(p("5V").merge(&p("6V")).is_err());
        assert!(p("GREEN").merge(&p("RED")).is_err());
        assert!(p("GREEN").merge(&p("1V..2V")).is_err());
    }

    #[test]
    fn unit_mismatch_conflicts() {
        assert!(p("5V").merge(&p("5A")).is_err());
        assert!(p("1V..5V").merge(&p("1A..5A")).is_err());
        assert!(p("3A").merge(&p("1V..5V")).is_err());
    }

    #[test]
    fn conflict_renders_both_sides() {
        let err = p("5V").merge(&p("10V..20V")).expect_err("conflict");
        assert_eq!(err.left, "5V");
        assert_eq!(err.right, "10V..20V");
    }

    #[test]
    fn most_narrow_collapses_degenerate_range() {
        assert_eq!(p("5V..5V").most_narrow(), p("5V"));
        assert_eq!(p("1V..5V").most_narrow(), p("1V..5V"));
        assert!(p("any").most_narrow().is_open());
        assert!(!p("5V").most_narrow().is_open());
    }

    #[test]
    fn center_tolerance_parses() {
        let spacer = p("8.5mm +- 10%");
        assert_eq!(spacer, p("7.65mm..9.35mm"));
        assert_eq!(p("100nF +- 0%"), p("100nF..100nF"));
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        assert!("5V..1V".parse::<Parameter>().is_err());
        assert!("1V..5A".parse::<Parameter>().is_err());
        assert!("5V +- 200%".parse::<Parameter>().is_err());
        assert!("5V +- ten".parse::<Parameter>().is_err());
    }

    #[test]
    fn display_round_trips() {
        for text in ["unset", "any", "5V", "1.1V..3.6V", "GREEN", "10kΩ"] {
            assert_eq!(p(text).to_string(), text);
        }
    }

    #[test]
    fn is_within_orders_constraints() {
        assert!(p("5V").is_within(&p("1V..10V")));
        assert!(p("2V..3V").is_within(&p("1V..10V")));
        assert!(!p("1V..10V").is_within(&p("2V..3V")));
        assert!(p("1V..10V").is_within(&p("any")));
        assert!(!p("any").is_within(&p("5V")));
    }
}
