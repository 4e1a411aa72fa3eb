//! # Layout Hints
//!
//! Opaque placement directives attached to modules as a `Layout` trait and
//! passed through to the export bundle. The engine stores and looks them up,
//! it never interprets the geometry.
//!
//! Coordinates are integer micrometres, rotation is integer degrees.

use serde::{Deserialize, Serialize};

/// PCB side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    #[default]
    Top,
    Bottom,
}

/// A position relative to the parent module's origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x_um: i64,
    pub y_um: i64,
    #[serde(default)]
    pub rotation_deg: i32,
    #[serde(default)]
    pub layer: Layer,
}

impl Point {
    #[must_use]
    pub const fn new(x_um: i64, y_um: i64) -> Self {
        Self {
            x_um,
            y_um,
            rotation_deg: 0,
            layer: Layer::Top,
        }
    }

    #[must_use]
    pub const fn rotated(mut self, degrees: i32) -> Self {
        self.rotation_deg = degrees;
        self
    }
}

/// One level of a type-keyed hierarchy: every child module of type
/// `module_type` gets `layout`, then `children` apply below it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutLevel {
    pub module_type: String,
    pub layout: Layout,
    #[serde(default)]
    pub children: Vec<LayoutLevel>,
}

/// A placement directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// Fixed position.
    Absolute { at: Point },
    /// Place a series of siblings starting at `base`, stepping by `vector`.
    Extrude {
        base: Point,
        vector: Point,
        #[serde(default)]
        reverse_order: bool,
    },
    /// Directives keyed by child module type.
    TypeHierarchy { levels: Vec<LayoutLevel> },
    /// Put decoupling capacitors next to the pins they decouple.
    HeuristicDecoupling,
    /// Put pull resistors next to the signals they pull.
    HeuristicPulls,
}

impl Layout {
    /// Find the directive for a child of `module_type` in a type hierarchy.
    ///
    /// Returns `None` for every other layout kind.
    #[must_use]
    pub fn resolve_for(&self, module_type: &str) -> Option<&LayoutLevel> {
        match self {
            Self::TypeHierarchy { levels } => levels.iter().find(|l| l.module_type == module_type),
            _ => None,
        }
    }

    /// Short name used in logs and summaries.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Absolute { .. } => "absolute",
            Self::Extrude { .. } => "extrude",
            Self::TypeHierarchy { .. } => "type_hierarchy",
            Self::HeuristicDecoupling => "heuristic_decoupling",
            Self::HeuristicPulls => "heuristic_pulls",
        }
    }
}
