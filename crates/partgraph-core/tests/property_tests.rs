//! # Property-Based Tests
//!
//! Algebraic laws of parameter merging and determinism of net derivation.

use partgraph_core::{Graph, NetlistDeriver, Parameter, Quantity, Unit, Value};
use proptest::collection::vec;
use proptest::prelude::*;

fn ohms(v: i64) -> Quantity {
    Quantity::base(v, Unit::Ohm)
}

fn parameter() -> impl Strategy<Value = Parameter> {
    prop_oneof![
        Just(Parameter::Unset),
        Just(Parameter::Any),
        (0i64..40).prop_map(|v| Parameter::exact(ohms(v))),
        Just(Parameter::exact(Value::tag("X7R"))),
        (0i64..40, 0i64..40).prop_map(|(a, b)| {
            Parameter::range(ohms(a.min(b)), ohms(a.max(b))).unwrap_or(Parameter::Any)
        }),
    ]
}

// =============================================================================
// MERGE LAWS
// =============================================================================

proptest! {
    #[test]
    fn merge_is_commutative(a in parameter(), b in parameter()) {
        prop_assert_eq!(a.merge(&b).ok(), b.merge(&a).ok());
    }

    #[test]
    fn merge_is_associative(a in parameter(), b in parameter(), c in parameter()) {
        let left = a.merge(&b).and_then(|ab| ab.merge(&c)).ok().map(|p| p.most_narrow());
        let right = b.merge(&c).and_then(|bc| a.merge(&bc)).ok().map(|p| p.most_narrow());
        prop_assert_eq!(left, right);
    }

    #[test]
    fn merge_is_idempotent(a in parameter()) {
        prop_assert_eq!(a.merge(&a).ok(), Some(a.clone()));
    }

    /// The result admits nothing either input rejects.
    #[test]
    fn merge_never_widens(a in parameter(), b in parameter()) {
        if let Ok(merged) = a.merge(&b) {
            prop_assert!(merged.is_within(&a), "{} wider than {}", merged, a);
            prop_assert!(merged.is_within(&b), "{} wider than {}", merged, b);
        }
    }

    /// Once narrowed, a parameter never becomes open again.
    #[test]
    fn merge_is_monotone(a in parameter(), rest in vec(parameter(), 0..6)) {
        let mut current = a;
        for next in rest {
            let Ok(merged) = current.merge(&next) else { break };
            if !current.is_open() {
                prop_assert!(!merged.is_open());
            }
            current = merged;
        }
    }

    #[test]
    fn display_parses_back(lo in 1i64..100_000, width in 0i64..100_000) {
        let p = Parameter::range(ohms(lo), ohms(lo.saturating_add(width))).expect("range");
        let text = p.to_string();
        prop_assert_eq!(text.parse::<Parameter>().expect("parse"), p);
    }
}

// =============================================================================
// NET DERIVATION
// =============================================================================

proptest! {
    /// Membership and ordering do not depend on the order edges were added.
    #[test]
    fn derivation_ignores_connection_order(
        edges in vec((0usize..12, 0usize..12), 0..30)
    ) {
        let build = |order: &[(usize, usize)]| {
            let mut graph = Graph::new();
            let root = graph.new_module("App");
            let ifaces: Vec<_> = (0..12)
                .map(|i| graph.add_interface(root, &format!("i{i}"), "Electrical").expect("iface"))
                .collect();
            for (a, b) in order {
                graph.connect(ifaces[*a], ifaces[*b]).expect("connect");
            }
            NetlistDeriver::derive(&graph).expect("derive")
        };

        let forward = build(&edges);
        let reversed: Vec<_> = edges.iter().rev().map(|(a, b)| (*b, *a)).collect();
        let backward = build(&reversed);

        prop_assert_eq!(&forward, &backward);
        let covered: usize = forward.iter().map(|n| n.members.len()).sum();
        prop_assert_eq!(covered, 12);
    }

    #[test]
    fn derivation_is_repeatable(edges in vec((0usize..8, 0usize..8), 0..16)) {
        let mut graph = Graph::new();
        let root = graph.new_module("App");
        let ifaces: Vec<_> = (0..8)
            .map(|i| graph.add_interface(root, &format!("i{i}"), "Electrical").expect("iface"))
            .collect();
        for (a, b) in &edges {
            graph.connect(ifaces[*a], ifaces[*b]).expect("connect");
        }
        let first = NetlistDeriver::derive(&graph).expect("first");
        let second = NetlistDeriver::derive(&graph).expect("second");
        prop_assert_eq!(first, second);
    }
}
