//! Unit conversions.
//!
//! PDF native units are 1/72 inch; configuration values may arrive in
//! millimeters, centimeters, inches or native units.

/// A unit of length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// Millimeters
    Mm,
    /// Centimeters
    Cm,
    /// Inches
    Inch,
    /// Native PDF units (1/72 inch)
    Native,
}

impl Unit {
    /// Millimeters per one unit.
    fn factor(&self) -> f64 {
        match self {
            Unit::Mm => 1.0,
            Unit::Cm => 10.0,
            Unit::Inch => 25.4,
            Unit::Native => 1.0 / 72.0 * 25.4,
        }
    }

    /// Parse a unit name as used in configuration.
    pub fn parse(name: &str) -> Option<Unit> {
        match name {
            "mm" => Some(Unit::Mm),
            "cm" => Some(Unit::Cm),
            "inch" => Some(Unit::Inch),
            "native" => Some(Unit::Native),
            _ => None,
        }
    }
}

/// Convert a value between units.
pub fn convert(value: f64, from: Unit, to: Unit) -> f64 {
    value / to.factor() * from.factor()
}
