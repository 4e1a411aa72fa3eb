//! # Validation Tier Tests (T0-T4)
//!
//! If ANY tier fails, the engine is INVALID.
//!
//! ## Tiers
//! - T0: Parameter Algebra
//! - T1: Graph Construction
//! - T2: Net Derivation
//! - T3: Part Picking
//! - T4: End-to-End Run

use partgraph_core::{
    Capability, Candidate, CandidateRegistry, Graph, NetlistDeriver, NodeId, Parameter, PartError,
    PickState, Picker, ResolveConfig, Session, Trait, library,
};

fn p(s: &str) -> Parameter {
    s.parse().expect("param")
}

// =============================================================================
// TIER T0: PARAMETER ALGEBRA
// =============================================================================

mod t0_parameter_algebra {
    use super::*;

    /// T0.1: An exact value outside a range conflicts.
    #[test]
    fn exact_outside_range_conflicts() {
        assert!(p("5Ω").merge(&p("10Ω..20Ω")).is_err());
    }

    /// T0.2: Disjoint ranges conflict.
    #[test]
    fn disjoint_ranges_conflict() {
        let err = p("1Ω..5Ω").merge(&p("6Ω..10Ω")).expect_err("disjoint");
        assert_eq!(err.left, "1Ω..5Ω");
        assert_eq!(err.right, "6Ω..10Ω");
    }

    /// T0.3: Overlapping ranges intersect.
    #[test]
    fn overlapping_ranges_intersect() {
        assert_eq!(p("1Ω..10Ω").merge(&p("5Ω..20Ω")).expect("merge"), p("5Ω..10Ω"));
    }

    /// T0.4: A graph merge conflict names the node and attribute.
    #[test]
    fn graph_conflict_carries_path() {
        let mut graph = Graph::new();
        let r = graph.instantiate(&library::resistor()).expect("resistor");
        graph.set_root_name(r, "r1").expect("name");
        graph.set_parameter(r, "resistance", p("5Ω")).expect("set");

        let err = graph
            .set_parameter(r, "resistance", p("10Ω..20Ω"))
            .expect_err("conflict");
        assert!(matches!(
            &err,
            PartError::Conflict { path, attribute, .. } if path == "r1" && attribute == "resistance"
        ));
        assert_eq!(graph.most_narrow(r, "resistance"), p("5Ω"));
    }
}

// =============================================================================
// TIER T1: GRAPH CONSTRUCTION
// =============================================================================

mod t1_graph_construction {
    use super::*;
    use partgraph_core::NodeFilter;

    /// T1.1: Connecting is symmetric and self-connection is a no-op.
    #[test]
    fn connect_symmetric() {
        let mut graph = Graph::new();
        let root = graph.new_module("App");
        let a = graph.add_interface(root, "a", "Electrical").expect("a");
        let b = graph.add_interface(root, "b", "Electrical").expect("b");
        graph.connect(a, b).expect("connect");
        graph.connect(a, a).expect("self");
        assert!(graph.is_connected(b, a));
        assert!(!graph.is_connected(a, a));
        assert_eq!(graph.edge_count(), 1);
    }

    /// T1.2: Modules cannot be connected.
    #[test]
    fn connect_rejects_modules() {
        let mut graph = Graph::new();
        let root = graph.new_module("App");
        let a = graph.add_interface(root, "a", "Electrical").expect("a");
        assert!(matches!(
            graph.connect(a, root),
            Err(PartError::NotAnInterface { .. })
        ));
    }

    /// T1.3: Children come back name-ordered, depth-first.
    #[test]
    fn children_are_deterministic() {
        let mut graph = Graph::new();
        let app = graph.new_module("App");
        let led = graph.add_module(app, "led", &library::powered_led()).expect("led");
        let modules = graph.get_children(app, true, &NodeFilter::Modules).expect("modules");
        let paths: Vec<_> = modules.iter().map(|m| graph.path(*m)).collect();
        assert_eq!(modules[0], led);
        assert_eq!(paths.len(), 3);
        assert!(paths[1].ends_with("led.current_limiting_resistor"));
        assert!(paths[2].ends_with("led.led"));
    }

    /// T1.4: A depth guard stops runaway nesting.
    #[test]
    fn depth_guard_trips() {
        let mut graph = Graph::with_config(ResolveConfig::default().with_depth_limit(3));
        let root = graph.new_module("Chain");
        let mut parent = root;
        for i in 0..6 {
            let child = graph.new_module("Chain");
            graph.add_child(parent, &format!("c{i}"), child).expect("add");
            parent = child;
        }
        assert!(matches!(
            graph.get_children(root, true, &NodeFilter::Any),
            Err(PartError::CycleDepthExceeded { limit: 3, .. })
        ));
    }

    /// T1.5: Strict mode rejects a second, different designator.
    #[test]
    fn strict_trait_override() {
        let mut graph = Graph::with_config(ResolveConfig::default().strict());
        let r = graph.instantiate(&library::resistor()).expect("resistor");
        graph
            .add_trait(r, Trait::Designator("R1".into()))
            .expect("first");
        graph
            .add_trait(r, Trait::Designator("R1".into()))
            .expect("identical");
        assert!(matches!(
            graph.add_trait(r, Trait::Designator("R2".into())),
            Err(PartError::DuplicateTrait { .. })
        ));
    }
}

// =============================================================================
// TIER T2: NET DERIVATION
// =============================================================================

mod t2_net_derivation {
    use super::*;

    fn bridged() -> (Graph, NodeId, NodeId, NodeId) {
        let mut graph = Graph::new();
        let app = graph.new_module("App");
        let a = graph.add_interface(app, "a", "Electrical").expect("a");
        let b = graph.add_interface(app, "b", "Electrical").expect("b");
        let buf = graph.new_module("Buffer");
        graph.add_child(app, "buf", buf).expect("add");
        let input = graph.add_interface(buf, "in", "Electrical").expect("in");
        let output = graph.add_interface(buf, "out", "Electrical").expect("out");
        graph.add_trait(buf, Trait::Bridge { input, output }).expect("bridge");
        graph.connect_via(a, buf, b).expect("via");
        (graph, a, b, buf)
    }

    /// T2.1: Deriving twice gives identical output.
    #[test]
    fn idempotent() {
        let (graph, ..) = bridged();
        assert_eq!(
            NetlistDeriver::derive(&graph).expect("first"),
            NetlistDeriver::derive(&graph).expect("second")
        );
    }

    /// T2.2: A bridge joins nets; removing its trait splits them.
    #[test]
    fn bridge_transparency() {
        let (mut graph, a, b, buf) = bridged();
        let joined = NetlistDeriver::derive(&graph).expect("joined");
        assert_eq!(joined.net_of(a), joined.net_of(b));
        assert!(joined.net_of(a).is_some());

        graph.remove_trait(buf, Capability::Bridge).expect("remove");
        let split = NetlistDeriver::derive(&graph).expect("split");
        assert_eq!(split.len(), 2);
        assert_ne!(split.net_of(a), split.net_of(b));
    }

    /// T2.3: Two names in one net abort derivation.
    #[test]
    fn naming_conflict_aborts() {
        let (mut graph, a, b, _) = bridged();
        graph.add_trait(a, Trait::NetName("SDA".into())).expect("name");
        graph.add_trait(b, Trait::NetName("SCL".into())).expect("name");
        assert!(matches!(
            NetlistDeriver::derive(&graph),
            Err(PartError::NamingConflict { .. })
        ));
    }

    /// T2.4: Composite interfaces connect rail by rail.
    #[test]
    fn power_rails_connect_childwise() {
        let mut graph = Graph::new();
        let app = graph.new_module("App");
        let led = graph.add_module(app, "led", &library::powered_led()).expect("led");
        let supply = graph.add_interface(app, "vbus", "ElectricPower").expect("vbus");
        let hv = graph.add_interface(supply, "hv", "Electrical").expect("hv");
        let lv = graph.add_interface(supply, "lv", "Electrical").expect("lv");
        let power = graph.resolve_path(led, "power").expect("power");
        graph.connect(supply, power).expect("connect");

        let netlist = NetlistDeriver::derive(&graph).expect("derive");
        let anode = graph.resolve_path(led, "led.anode").expect("anode");
        assert_eq!(netlist.net_of(hv), netlist.net_of(anode));
        assert_ne!(netlist.net_of(hv), netlist.net_of(lv));
    }

    /// T2.5: A rejected construction step leaves no stray nets.
    #[test]
    fn failed_construction_adds_no_nets() {
        let mut graph = Graph::new();
        let app = graph.new_module("App");
        graph.add_interface(app, "a", "Electrical").expect("a");
        graph.add_module(app, "r", &library::resistor()).expect("r");
        let before = NetlistDeriver::derive(&graph).expect("derive").len();

        assert!(graph.add_interface(app, "a", "Electrical").is_err());
        assert!(graph.add_module(app, "r", &library::resistor()).is_err());
        assert_eq!(NetlistDeriver::derive(&graph).expect("derive").len(), before);
    }
}

// =============================================================================
// TIER T3: PART PICKING
// =============================================================================

mod t3_part_picking {
    use super::*;

    /// T3.1: The first compatible candidate wins; the second is never tried.
    #[test]
    fn first_match_wins() {
        let mut registry = CandidateRegistry::new("catalog");
        registry
            .extend([
                Candidate::new("Resistor", "R-100").param("resistance", p("100Ω")),
                Candidate::new("Resistor", "R-95").param("resistance", p("95Ω")),
            ])
            .expect("register");

        let mut graph = Graph::new();
        let r = graph.instantiate(&library::resistor()).expect("resistor");
        graph.set_parameter(r, "resistance", p("90Ω..110Ω")).expect("set");

        let report = Picker::new().with_source(registry).pick(&mut graph, r).expect("pick");
        let outcome = report.outcome(r).expect("outcome");
        assert_eq!(outcome.part.as_deref(), Some("R-100"));
        assert_eq!(outcome.candidates_evaluated, 1);
        assert!(outcome.rejected.is_empty());
        assert_eq!(graph.most_narrow(r, "resistance"), p("100Ω"));
    }

    /// T3.2: A half-matching candidate leaves nothing behind and the next
    /// one is tried.
    #[test]
    fn rollback_then_next_candidate() {
        let mut registry = CandidateRegistry::new("catalog");
        registry
            .extend([
                Candidate::new("Capacitor", "C-LOWV")
                    .param("capacitance", p("100nF"))
                    .param("rated_voltage", p("6.3V")),
                Candidate::new("Capacitor", "C-OK")
                    .param("capacitance", p("100nF"))
                    .param("rated_voltage", p("25V")),
            ])
            .expect("register");

        let mut graph = Graph::new();
        let c = graph.instantiate(&library::capacitor()).expect("capacitor");
        graph.set_parameter(c, "capacitance", p("80nF..120nF")).expect("set");
        graph.set_parameter(c, "rated_voltage", p("10V..50V")).expect("set");

        let report = Picker::new().with_source(registry).pick(&mut graph, c).expect("pick");
        let outcome = report.outcome(c).expect("outcome");
        assert_eq!(outcome.part.as_deref(), Some("C-OK"));
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].0, "C-LOWV");
        assert_eq!(graph.most_narrow(c, "rated_voltage"), p("25V"));
    }

    /// T3.3: One exhausted module does not stop the others.
    #[test]
    fn partial_failure_isolation() {
        let mut registry = CandidateRegistry::new("catalog");
        registry
            .extend([
                Candidate::new("Resistor", "R-1K").param("resistance", p("1kΩ")),
                Candidate::new("Resistor", "R-10K").param("resistance", p("10kΩ")),
            ])
            .expect("register");

        let mut graph = Graph::new();
        let app = graph.new_module("App");
        let r1 = graph.add_module(app, "r1", &library::resistor()).expect("r1");
        let r2 = graph.add_module(app, "r2", &library::resistor()).expect("r2");
        let r3 = graph.add_module(app, "r3", &library::resistor()).expect("r3");
        graph.set_parameter(r1, "resistance", p("1kΩ")).expect("set");
        graph.set_parameter(r2, "resistance", p("47kΩ")).expect("set");
        graph.set_parameter(r3, "resistance", p("5kΩ..15kΩ")).expect("set");

        let report = Picker::new().with_source(registry).pick(&mut graph, app).expect("pick");
        assert_eq!(report.count(PickState::Exhausted), 1);
        assert_eq!(report.outcome(r1).expect("r1").state, PickState::PartBound);
        assert_eq!(report.outcome(r3).expect("r3").state, PickState::PartBound);
        assert_eq!(report.outcome(r2).expect("r2").state, PickState::Exhausted);

        let err = report.ensure_complete().expect_err("exhausted");
        let PartError::PickExhausted { failures } = err else {
            unreachable!("ensure_complete only returns PickExhausted");
        };
        assert_eq!(failures.len(), 1);
        assert!(failures[0].path.ends_with("r2"));
        assert_eq!(failures[0].rejected.len(), 2);
    }

    /// T3.4: A specialized module is picked in place of its general form.
    #[test]
    fn picks_most_special() {
        let mut registry = CandidateRegistry::new("catalog");
        registry
            .register(Candidate::new("Resistor", "R-1K").param("resistance", p("1kΩ")))
            .expect("register");

        let mut graph = Graph::new();
        let app = graph.new_module("App");
        let general = graph.add_module(app, "r", &library::resistor()).expect("r");
        let special = graph.instantiate(&library::resistor()).expect("special");
        graph.set_parameter(special, "resistance", p("1kΩ")).expect("set");
        graph.specialize(general, special).expect("specialize");

        let report = Picker::new().with_source(registry).pick(&mut graph, app).expect("pick");
        assert_eq!(
            report.outcome(special).expect("special").state,
            PickState::PartBound
        );
        assert!(report.outcome(general).is_none());
        assert!(graph.has_trait(special, Capability::Part));
    }

    /// T3.5: Constraints on the general form still bind the special one.
    #[test]
    fn general_constraints_bind_special_pick() {
        let mut registry = CandidateRegistry::new("catalog");
        registry
            .register(Candidate::new("Resistor", "R-47").param("resistance", p("47Ω")))
            .expect("register");

        let mut graph = Graph::new();
        let app = graph.new_module("App");
        let general = graph.add_module(app, "r", &library::resistor()).expect("r");
        graph.set_parameter(general, "resistance", p("10kΩ")).expect("set");
        let special = graph.instantiate(&library::resistor()).expect("special");
        graph.specialize(general, special).expect("specialize");

        let report = Picker::new().with_source(registry).pick(&mut graph, app).expect("pick");
        assert_eq!(
            report.outcome(special).expect("special").state,
            PickState::Exhausted
        );
        assert!(!graph.has_trait(special, Capability::Part));
        assert_eq!(graph.most_narrow(special, "resistance"), p("10kΩ"));
    }
}

// =============================================================================
// TIER T4: END-TO-END RUN
// =============================================================================

mod t4_end_to_end {
    use super::*;

    /// T4.1: A -- B, B ==bridge== C, A named NET1: one net with all three.
    #[test]
    fn single_named_net_through_bridge() {
        let mut graph = Graph::new();
        let app = graph.new_module("App");
        let a = graph.add_interface(app, "a", "Electrical").expect("a");
        let b = graph.add_interface(app, "b", "Electrical").expect("b");
        let c = graph.add_interface(app, "c", "Electrical").expect("c");

        let buf = graph.new_module("Buffer");
        graph.add_child(app, "buf", buf).expect("add");
        let input = graph.add_interface(buf, "in", "Electrical").expect("in");
        let output = graph.add_interface(buf, "out", "Electrical").expect("out");
        graph.add_trait(buf, Trait::Bridge { input, output }).expect("bridge");

        graph.connect(a, b).expect("a-b");
        graph.connect_via(b, buf, c).expect("b-c");
        graph.add_trait(a, Trait::NetName("NET1".into())).expect("name");

        let netlist = NetlistDeriver::derive(&graph).expect("derive");
        assert_eq!(netlist.len(), 1);
        let net = netlist.by_name("NET1").expect("NET1");
        for iface in [a, b, c] {
            assert!(net.contains(iface));
        }
        assert!(!net.contains(buf));
        assert_eq!(net.bridges, vec![buf]);
    }

    /// T4.2: Level shifter application: pick, designate, derive, export.
    #[test]
    fn level_shifter_application() {
        let mut graph = Graph::new();
        let app = graph.new_module("App");
        graph.set_root_name(app, "app").expect("name");
        let shifter = graph
            .add_module(app, "shifter", &library::sn74lxc1t45())
            .expect("shifter");
        let header = graph.add_module(app, "swd", &library::header(3)).expect("header");
        let decoupling = graph.add_module(app, "c", &library::capacitor()).expect("cap");
        graph.set_parameter(decoupling, "capacitance", p("100nF +- 20%")).expect("set");

        let vcca = graph.resolve_path(shifter, "power[0]").expect("vcca");
        graph.set_parameter(vcca, "voltage", p("3.3V")).expect("3v3");
        let vcca_hv = graph.resolve_path(shifter, "power[0].hv").expect("hv");
        let vcca_lv = graph.resolve_path(shifter, "power[0].lv").expect("lv");
        let c0 = graph.resolve_path(decoupling, "unnamed[0]").expect("c0");
        let c1 = graph.resolve_path(decoupling, "unnamed[1]").expect("c1");
        graph.connect(vcca_hv, c0).expect("c0");
        graph.connect(vcca_lv, c1).expect("c1");

        let io0 = graph.resolve_path(shifter, "io[0].signal").expect("io0");
        let pin1 = graph.resolve_path(header, "unnamed[1]").expect("pin1");
        graph.connect(pin1, io0).expect("swdio");
        graph.add_trait(pin1, Trait::NetName("SWDIO".into())).expect("name");

        let mut catalog = CandidateRegistry::new("catalog");
        catalog
            .extend([
                Candidate::new("Capacitor", "C1525")
                    .param("capacitance", p("100nF"))
                    .footprint("C0402")
                    .pin("1", "unnamed[0]")
                    .pin("2", "unnamed[1]"),
                Candidate::new("Header", "C124378")
                    .param("pin_pitch", p("2.54mm"))
                    .footprint("PinHeader_1x03_P2.54mm")
                    .pin("1", "unnamed[0]")
                    .pin("2", "unnamed[1]")
                    .pin("3", "unnamed[2]"),
            ])
            .expect("catalog");

        let mut session = Session::new(graph, app).expect("session").with_source(catalog);
        let out = session.run().expect("run");
        assert!(out.report.ensure_complete().is_ok());

        let u1 = out.bundle.component("U1").expect("U1");
        assert_eq!(u1.module_type, "SN74LXC1T45");
        assert!(u1.datasheet.is_some());
        assert_eq!(out.bundle.component("C1").expect("C1").part.as_deref(), Some("C1525"));
        assert!(out.bundle.component("J1").is_some());

        let swdio = out.bundle.net("SWDIO").expect("SWDIO");
        assert!(swdio.named);
        assert!(swdio.pins.iter().any(|pin| pin.designator == "U1" && pin.pin == "3"));
        assert!(swdio.pins.iter().any(|pin| pin.designator == "J1" && pin.pin == "2"));
        assert_eq!(swdio.bridges, vec!["app.shifter".to_string()]);

        assert_eq!(
            session.graph().most_narrow(vcca, "voltage"),
            p("3.3V")
        );
    }
}
