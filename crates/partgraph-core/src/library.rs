//! # Component Library
//!
//! Ready-made shapes for common interfaces and parts. Every function returns
//! a fresh `ModuleSpec`/`InterfaceSpec`; instantiate it with
//! `Graph::instantiate` or `Graph::add_module`.

use crate::parameter::{Parameter, Range};
use crate::shape::{InterfaceSpec, ModuleSpec};
use crate::traits::Trait;
use crate::units::Unit;

// =============================================================================
// INTERFACES
// =============================================================================

/// A single electrical connection point.
#[must_use]
pub fn electrical() -> InterfaceSpec {
    InterfaceSpec::new("Electrical")
}

/// A supply rail pair: `hv` (positive) and `lv` (ground), with a voltage.
#[must_use]
pub fn electric_power() -> InterfaceSpec {
    InterfaceSpec::new("ElectricPower")
        .interface("hv", electrical())
        .interface("lv", electrical())
        .param("voltage", Parameter::Unset)
}

/// A logic signal.
#[must_use]
pub fn electric_logic() -> InterfaceSpec {
    InterfaceSpec::new("ElectricLogic").interface("signal", electrical())
}

// =============================================================================
// PASSIVES
// =============================================================================

#[must_use]
pub fn resistor() -> ModuleSpec {
    ModuleSpec::new("Resistor")
        .interfaces("unnamed", 2, &electrical())
        .param("resistance", Parameter::Unset)
        .param("rated_power", Parameter::Unset)
        .with_trait(Trait::DesignatorPrefix("R".to_string()))
}

#[must_use]
pub fn capacitor() -> ModuleSpec {
    ModuleSpec::new("Capacitor")
        .interfaces("unnamed", 2, &electrical())
        .param("capacitance", Parameter::Unset)
        .param("rated_voltage", Parameter::Unset)
        .param("temperature_coefficient", Parameter::Unset)
        .with_trait(Trait::DesignatorPrefix("C".to_string()))
}

#[must_use]
pub fn led() -> ModuleSpec {
    ModuleSpec::new("LED")
        .interface("anode", electrical())
        .interface("cathode", electrical())
        .param("color", Parameter::Unset)
        .param("brightness", Parameter::Unset)
        .param("forward_voltage", Parameter::Unset)
        .param("max_current", Parameter::Unset)
        .with_trait(Trait::DesignatorPrefix("D".to_string()))
}

/// An LED in series with its current limiting resistor across a rail.
#[must_use]
pub fn powered_led() -> ModuleSpec {
    ModuleSpec::new("PoweredLED")
        .interface("power", electric_power())
        .child("led", led())
        .child("current_limiting_resistor", resistor())
        .connect("power.hv", "led.anode")
        .connect("led.cathode", "current_limiting_resistor.unnamed[0]")
        .connect("current_limiting_resistor.unnamed[1]", "power.lv")
}

// =============================================================================
// CONNECTORS
// =============================================================================

/// Single row pin header with `pins` contacts.
#[must_use]
pub fn header(pins: usize) -> ModuleSpec {
    ModuleSpec::new("Header")
        .interfaces("unnamed", pins, &electrical())
        .param("pin_pitch", Parameter::Unset)
        .param("pin_type", Parameter::Unset)
        .with_trait(Trait::DesignatorPrefix("J".to_string()))
}

/// Three contact programming connector.
#[must_use]
pub fn connector() -> ModuleSpec {
    ModuleSpec::new("Connector").interfaces("unnamed", 3, &electrical())
}

// =============================================================================
// ICS
// =============================================================================

/// Datasheet of the SN74LXC1T45 level shifter.
pub const SN74LXC1T45_DATASHEET: &str = "https://www.ti.com/lit/ds/symlink/sn74lxc1t45.pdf";

/// 1-bit dual-supply bidirectional level translator.
///
/// `io[0]` is referenced to `power[0]` (VCCA), `io[1]` to `power[1]`
/// (VCCB). Both supplies accept 1.1V to 5.5V and share ground. The part is
/// hand-specified: it carries its footprint, so the picker leaves it alone.
#[must_use]
pub fn sn74lxc1t45() -> ModuleSpec {
    let supply = Parameter::Range(Range::scaled(11, 55, -1, Unit::Volt));

    let power = electric_power().param("voltage", supply);

    ModuleSpec::new("SN74LXC1T45")
        .interface("dir", electric_logic())
        .interfaces("io", 2, &electric_logic())
        .interfaces("power", 2, &power)
        .connect("power[0].lv", "power[1].lv")
        .bridge("io[0]", "io[1]")
        .with_trait(Trait::Datasheet(SN74LXC1T45_DATASHEET.to_string()))
        .with_trait(Trait::DesignatorPrefix("U".to_string()))
        .footprint(
            "Package_TO_SOT_SMD:SOT-23-6",
            &[
                ("1", "power[0].hv"),
                ("2", "power[0].lv"),
                ("3", "io[0].signal"),
                ("4", "io[1].signal"),
                ("5", "dir.signal"),
                ("6", "power[1].hv"),
            ],
        )
}

// =============================================================================
// LOOKUP
// =============================================================================

/// Module shape by library type name. `pins` sizes a `Header` (default 2).
#[must_use]
pub fn lookup(type_name: &str, pins: Option<usize>) -> Option<ModuleSpec> {
    match type_name {
        "Resistor" => Some(resistor()),
        "Capacitor" => Some(capacitor()),
        "LED" => Some(led()),
        "PoweredLED" => Some(powered_led()),
        "Header" => Some(header(pins.unwrap_or(2))),
        "Connector" => Some(connector()),
        "SN74LXC1T45" => Some(sn74lxc1t45()),
        _ => None,
    }
}

/// Interface shape by type name.
#[must_use]
pub fn lookup_interface(type_name: &str) -> Option<InterfaceSpec> {
    match type_name {
        "Electrical" => Some(electrical()),
        "ElectricPower" => Some(electric_power()),
        "ElectricLogic" => Some(electric_logic()),
        _ => None,
    }
}
