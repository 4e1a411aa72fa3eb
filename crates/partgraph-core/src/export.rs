//! # Export Bundle
//!
//! The hand-off structure for netlist and layout exporters, plus its
//! canonical binary form.
//!
//! > - Runtime: exporters consume `ExportBundle` directly (or as JSON).
//! > - Verification: `export_canonical()` serializes to a bit-exact `postcard`
//! >   stream with a header and checksum. Two runs over the same graph produce
//! >   the same bytes, so outputs diff cleanly.

use crate::graph::{Graph, NodeFilter};
use crate::layout::Layout;
use crate::netlist::Netlist;
use crate::parameter::Parameter;
use crate::primitives::{ANONYMOUS_NET_PREFIX, FORMAT_VERSION, MAGIC_BYTES};
use crate::traits::Capability;
use crate::{NodeId, PartError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Maximum net count accepted by `import_canonical`.
pub const MAX_IMPORT_NET_COUNT: u64 = 1_000_000;

/// Maximum component count accepted by `import_canonical`.
pub const MAX_IMPORT_COMPONENT_COUNT: u64 = 1_000_000;

// =============================================================================
// BUNDLE
// =============================================================================

/// A footprint pin landing in a net.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetPin {
    pub designator: String,
    pub pin: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportNet {
    /// Assigned name, or `N$<k>` for unnamed nets.
    pub name: String,
    /// Whether `name` was assigned in the design.
    pub named: bool,
    pub pins: Vec<NetPin>,
    /// Member interface paths, in creation order.
    pub members: Vec<String>,
    /// Paths of bridge modules this net passes through.
    pub bridges: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportComponent {
    pub designator: Option<String>,
    pub path: String,
    pub module_type: String,
    pub part: Option<String>,
    pub source: Option<String>,
    pub footprint: Option<String>,
    pub datasheet: Option<String>,
    /// Pin -> interface path.
    pub pinmap: BTreeMap<String, String>,
    /// Most narrow form of every parameter.
    pub parameters: BTreeMap<String, Parameter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportLayout {
    pub path: String,
    pub module_type: String,
    pub layout: Layout,
}

/// Everything downstream exporters need from one design run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportBundle {
    pub nets: Vec<ExportNet>,
    pub components: Vec<ExportComponent>,
    pub layouts: Vec<ExportLayout>,
}

impl ExportBundle {
    /// Assemble the bundle for the modules at or below `root`.
    ///
    /// Components are modules carrying a `Part` or `Footprint`, in traversal
    /// order. A footprinted module without a `Designator` fails with
    /// `UnresolvedCapability`.
    pub fn build(graph: &Graph, root: NodeId, netlist: &Netlist) -> Result<Self, PartError> {
        let mut modules = Vec::new();
        if graph.node(root)?.is_module() {
            modules.push(root);
        }
        modules.extend(graph.get_children(root, true, &NodeFilter::Modules)?);

        let mut components = Vec::new();
        let mut layouts = Vec::new();
        let mut pins_by_interface: BTreeMap<NodeId, Vec<NetPin>> = BTreeMap::new();

        for module in modules {
            let node = graph.node(module)?;
            let traits = node.traits();

            if let Some(layout) = traits.layout() {
                layouts.push(ExportLayout {
                    path: graph.path(module),
                    module_type: node.type_name().to_string(),
                    layout: layout.clone(),
                });
            }

            let footprint = traits.footprint();
            let part = traits.part();
            if footprint.is_none() && part.is_none() {
                continue;
            }

            let designator = traits.text(Capability::Designator).map(str::to_string);
            if let Some(fp) = footprint {
                let designator = designator.clone().ok_or_else(|| {
                    PartError::UnresolvedCapability {
                        path: graph.path(module),
                        capability: Capability::Designator.to_string(),
                    }
                })?;
                for (pin, iface) in &fp.pinmap {
                    pins_by_interface.entry(*iface).or_default().push(NetPin {
                        designator: designator.clone(),
                        pin: pin.clone(),
                    });
                }
            }

            components.push(ExportComponent {
                designator,
                path: graph.path(module),
                module_type: node.type_name().to_string(),
                part: part.map(|p| p.partno.clone()),
                source: part.map(|p| p.source.clone()),
                footprint: footprint.map(|fp| fp.identifier.clone()),
                datasheet: traits.text(Capability::Datasheet).map(str::to_string),
                pinmap: footprint
                    .map(|fp| {
                        fp.pinmap
                            .iter()
                            .map(|(pin, iface)| (pin.clone(), graph.path(*iface)))
                            .collect()
                    })
                    .unwrap_or_default(),
                parameters: node
                    .parameters()
                    .iter()
                    .map(|(name, p)| (name.clone(), p.most_narrow()))
                    .collect(),
            });
        }

        let nets = netlist
            .iter()
            .enumerate()
            .map(|(i, net)| {
                let pins: BTreeSet<NetPin> = net
                    .members
                    .iter()
                    .filter_map(|m| pins_by_interface.get(m))
                    .flatten()
                    .cloned()
                    .collect();
                ExportNet {
                    name: net
                        .name
                        .clone()
                        .unwrap_or_else(|| {
                            format!("{ANONYMOUS_NET_PREFIX}{}", i.saturating_add(1))
                        }),
                    named: net.name.is_some(),
                    pins: pins.into_iter().collect(),
                    members: net.members.iter().map(|m| graph.path(*m)).collect(),
                    bridges: net.bridges.iter().map(|b| graph.path(*b)).collect(),
                }
            })
            .collect();

        Ok(Self {
            nets,
            components,
            layouts,
        })
    }

    #[must_use]
    pub fn component(&self, designator: &str) -> Option<&ExportComponent> {
        self.components
            .iter()
            .find(|c| c.designator.as_deref() == Some(designator))
    }

    #[must_use]
    pub fn net(&self, name: &str) -> Option<&ExportNet> {
        self.nets.iter().find(|n| n.name == name)
    }

    /// FNV-1a over the postcard encoding of the bundle.
    pub fn checksum(&self) -> Result<u64, PartError> {
        let bytes = postcard::to_allocvec(self)
            .map_err(|e| PartError::SerializationError(format!("Data: {}", e)))?;
        Ok(fnv1a(&bytes))
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(PRIME))
}

// =============================================================================
// CANONICAL FORMAT
// =============================================================================

/// Header for canonical export files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalHeader {
    /// Magic bytes to identify the format.
    pub magic: [u8; 4],
    /// Format version for compatibility.
    pub version: u8,
    pub net_count: u64,
    pub component_count: u64,
    /// Checksum of the data section.
    pub checksum: u64,
}

impl CanonicalHeader {
    #[must_use]
    pub fn new(net_count: u64, component_count: u64, checksum: u64) -> Self {
        Self {
            magic: *MAGIC_BYTES,
            version: FORMAT_VERSION,
            net_count,
            component_count,
            checksum,
        }
    }

    /// Validate the header.
    pub fn validate(&self) -> Result<(), PartError> {
        if self.magic != *MAGIC_BYTES {
            return Err(PartError::SerializationError(
                "Invalid file format".to_string(),
            ));
        }
        if self.version != FORMAT_VERSION {
            return Err(PartError::SerializationError(
                "Unsupported file version".to_string(),
            ));
        }
        if self.net_count > MAX_IMPORT_NET_COUNT {
            return Err(PartError::SerializationError(format!(
                "Net count {} exceeds maximum allowed {}",
                self.net_count, MAX_IMPORT_NET_COUNT
            )));
        }
        if self.component_count > MAX_IMPORT_COMPONENT_COUNT {
            return Err(PartError::SerializationError(format!(
                "Component count {} exceeds maximum allowed {}",
                self.component_count, MAX_IMPORT_COMPONENT_COUNT
            )));
        }
        Ok(())
    }
}

/// Serialize a bundle to canonical postcard format.
///
/// Format:
/// ```text
/// [header_len: u32 LE] [CanonicalHeader (postcard)] [ExportBundle (postcard)]
/// ```
pub fn export_canonical(bundle: &ExportBundle) -> Result<Vec<u8>, PartError> {
    let data_bytes = postcard::to_allocvec(bundle)
        .map_err(|e| PartError::SerializationError(format!("Data: {}", e)))?;
    let header = CanonicalHeader::new(
        bundle.nets.len() as u64,
        bundle.components.len() as u64,
        fnv1a(&data_bytes),
    );
    let header_bytes = postcard::to_allocvec(&header)
        .map_err(|e| PartError::SerializationError(format!("Header: {}", e)))?;

    let mut result = Vec::with_capacity(4 + header_bytes.len() + data_bytes.len());
    result.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
    result.extend_from_slice(&header_bytes);
    result.extend_from_slice(&data_bytes);
    Ok(result)
}

/// Parse and verify a canonical stream.
pub fn import_canonical(data: &[u8]) -> Result<ExportBundle, PartError> {
    let too_short = || PartError::SerializationError("Data too short".to_string());

    let len_bytes: [u8; 4] = data
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(too_short)?;
    let header_len = u32::from_le_bytes(len_bytes) as usize;
    let header_end = header_len.checked_add(4).ok_or_else(too_short)?;
    let header_bytes = data.get(4..header_end).ok_or_else(too_short)?;
    let data_bytes = data.get(header_end..).ok_or_else(too_short)?;

    let header: CanonicalHeader = postcard::from_bytes(header_bytes)
        .map_err(|e| PartError::SerializationError(format!("Header: {}", e)))?;
    header.validate()?;

    let computed = fnv1a(data_bytes);
    if computed != header.checksum {
        return Err(PartError::SerializationError(format!(
            "Checksum mismatch: expected {}, got {}",
            header.checksum, computed
        )));
    }

    let bundle: ExportBundle = postcard::from_bytes(data_bytes)
        .map_err(|e| PartError::SerializationError(format!("Data: {}", e)))?;

    if bundle.nets.len() as u64 != header.net_count {
        return Err(PartError::SerializationError(
            "Net count mismatch".to_string(),
        ));
    }
    if bundle.components.len() as u64 != header.component_count {
        return Err(PartError::SerializationError(
            "Component count mismatch".to_string(),
        ));
    }
    Ok(bundle)
}

/// Whether `canonical_data` decodes to exactly `bundle`.
pub fn verify_canonical(bundle: &ExportBundle, canonical_data: &[u8]) -> Result<bool, PartError> {
    Ok(import_canonical(canonical_data)? == *bundle)
}

/// Checksum of the canonical data section of `bundle`.
pub fn canonical_checksum(bundle: &ExportBundle) -> Result<u64, PartError> {
    bundle.checksum()
}

/// BLAKE3 hash of the full canonical export, as 64 hex characters.
#[cfg(feature = "crypto-hash")]
pub fn canonical_crypto_hash(bundle: &ExportBundle) -> Result<String, PartError> {
    export_canonical(bundle).map(|data| compute_blake3_hash(&data))
}

/// BLAKE3 hash of raw bytes, as 64 hex characters.
#[cfg(feature = "crypto-hash")]
#[must_use]
pub fn compute_blake3_hash(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::designators::assign_designators;
    use crate::library;
    use crate::netlist::NetlistDeriver;
    use crate::traits::Trait;

    /// Level shifter whose A side is named, plus an unbound LED.
    fn create_test_design() -> (Graph, NodeId) {
        let mut graph = Graph::new();
        let app = graph.new_module("App");
        graph.set_root_name(app, "app").expect("name");
        let shifter = graph
            .add_module(app, "shifter", &library::sn74lxc1t45())
            .expect("shifter");
        graph.add_module(app, "led", &library::led()).expect("led");
        let sig = graph.resolve_path(shifter, "io[0].signal").expect("signal");
        graph.add_trait(sig, Trait::NetName("SWDIO".into())).expect("name");
        (graph, app)
    }

    fn bundle_for(graph: &mut Graph, root: NodeId) -> ExportBundle {
        assign_designators(graph, root).expect("designators");
        let netlist = NetlistDeriver::derive(graph).expect("nets");
        ExportBundle::build(graph, root, &netlist).expect("bundle")
    }

    #[test]
    fn bundle_lists_components_and_pins() {
        let (mut graph, app) = create_test_design();
        let bundle = bundle_for(&mut graph, app);

        assert_eq!(bundle.components.len(), 1);
        let u1 = bundle.component("U1").expect("U1");
        assert_eq!(u1.path, "app.shifter");
        assert_eq!(u1.footprint.as_deref(), Some("Package_TO_SOT_SMD:SOT-23-6"));
        assert_eq!(u1.pinmap.get("3").map(String::as_str), Some("app.shifter.io[0].signal"));

        // The bridge carries the name across to the B side.
        let swdio = bundle.net("SWDIO").expect("net");
        assert!(swdio.named);
        assert_eq!(swdio.bridges, vec!["app.shifter".to_string()]);
        assert_eq!(
            swdio.pins,
            vec![
                NetPin {
                    designator: "U1".into(),
                    pin: "3".into()
                },
                NetPin {
                    designator: "U1".into(),
                    pin: "4".into()
                }
            ]
        );
    }

    #[test]
    fn unnamed_nets_get_positional_names() {
        let (mut graph, app) = create_test_design();
        let bundle = bundle_for(&mut graph, app);
        let unnamed: Vec<_> = bundle.nets.iter().filter(|n| !n.named).collect();
        assert!(!unnamed.is_empty());
        assert!(unnamed.iter().all(|n| n.name.starts_with("N$")));

        let ground = bundle
            .nets
            .iter()
            .find(|n| n.members.iter().any(|m| m == "app.shifter.power[0].lv"))
            .expect("ground");
        assert!(ground.members.iter().any(|m| m == "app.shifter.power[1].lv"));
        assert_eq!(ground.pins.len(), 1);
    }

    #[test]
    fn footprint_without_designator_fails() {
        let (graph, app) = create_test_design();
        let netlist = NetlistDeriver::derive(&graph).expect("nets");
        assert!(matches!(
            ExportBundle::build(&graph, app, &netlist),
            Err(PartError::UnresolvedCapability { .. })
        ));
    }

    #[test]
    fn canonical_roundtrip() {
        let (mut graph, app) = create_test_design();
        let bundle = bundle_for(&mut graph, app);
        let data = export_canonical(&bundle).expect("export");
        let imported = import_canonical(&data).expect("import");
        assert_eq!(imported, bundle);
        assert!(verify_canonical(&bundle, &data).expect("verify"));
    }

    #[test]
    fn canonical_export_deterministic() {
        let (mut g1, a1) = create_test_design();
        let (mut g2, a2) = create_test_design();
        let b1 = bundle_for(&mut g1, a1);
        let b2 = bundle_for(&mut g2, a2);
        assert_eq!(
            export_canonical(&b1).expect("one"),
            export_canonical(&b2).expect("two")
        );
        assert_eq!(
            canonical_checksum(&b1).expect("one"),
            canonical_checksum(&b2).expect("two")
        );
    }

    #[test]
    fn corrupted_import_is_rejected() {
        let (mut graph, app) = create_test_design();
        let bundle = bundle_for(&mut graph, app);
        let mut data = export_canonical(&bundle).expect("export");

        assert!(import_canonical(&[]).is_err());
        assert!(import_canonical(&[255, 0, 0, 0, 1]).is_err());

        let last = data.len() - 1;
        data[last] ^= 0xFF;
        assert!(matches!(
            import_canonical(&data),
            Err(PartError::SerializationError(msg)) if msg.contains("Checksum")
        ));
    }

    #[test]
    fn header_validation() {
        let mut header = CanonicalHeader::new(1, 1, 0);
        assert!(header.validate().is_ok());
        header.magic = *b"XXXX";
        assert!(header.validate().is_err());

        let mut header = CanonicalHeader::new(1, 1, 0);
        header.version = 99;
        assert!(header.validate().is_err());

        let header = CanonicalHeader::new(MAX_IMPORT_NET_COUNT + 1, 0, 0);
        assert!(header.validate().is_err());
    }

    #[cfg(feature = "crypto-hash")]
    #[test]
    fn blake3_hash_is_stable() {
        let (mut graph, app) = create_test_design();
        let bundle = bundle_for(&mut graph, app);
        let h1 = canonical_crypto_hash(&bundle).expect("hash");
        let h2 = canonical_crypto_hash(&bundle).expect("hash");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }
}
