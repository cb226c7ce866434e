use std::fmt;

use serde::{Deserialize, Serialize};

/// A feature a device attached to the gateway may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Capability {
    Power,
    Brightness,
    Temperature,
    Color,
    Hardware,
}

impl Capability {
    /// Every capability, in the order the gateway's table lists them.
    pub const ALL: [Capability; 5] = [
        Capability::Color,
        Capability::Temperature,
        Capability::Brightness,
        Capability::Power,
        Capability::Hardware,
    ];

    fn bit(self) -> u8 {
        match self {
            Capability::Power => 1 << 0,
            Capability::Brightness => 1 << 1,
            Capability::Temperature => 1 << 2,
            Capability::Color => 1 << 3,
            Capability::Hardware => 1 << 4,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Power => "POWER",
            Capability::Brightness => "BRIGHTNESS",
            Capability::Temperature => "TEMPERATURE",
            Capability::Color => "COLOR",
            Capability::Hardware => "HARDWARE",
        };
        write!(f, "{}", name)
    }
}

/// Capability code to capability list, as reported at record offset 10.
///
/// Codes missing from the table support nothing.
const CAPABILITY_TABLE: [(u8, &[Capability]); 6] = [
    (
        0x0A,
        &[
            Capability::Color,
            Capability::Temperature,
            Capability::Brightness,
            Capability::Power,
        ],
    ),
    (
        0x02,
        &[
            Capability::Temperature,
            Capability::Brightness,
            Capability::Power,
        ],
    ),
    (0x03, &[Capability::Brightness, Capability::Power]),
    (0x04, &[Capability::Power]),
    (0x00, &[Capability::Hardware]),
    (0x40, &[Capability::Hardware]),
];

/// An immutable set of [`Capability`] flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Capabilities(u8);

impl Capabilities {
    /// Derives the capability set for a capability code.
    pub fn from_code(code: u8) -> Self {
        CAPABILITY_TABLE
            .iter()
            .find(|(table_code, _)| *table_code == code)
            .map(|(_, caps)| caps.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL
            .into_iter()
            .filter(move |capability| self.contains(*capability))
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Capabilities(iter.into_iter().fold(0, |bits, cap| bits | cap.bit()))
    }
}

/// Returns the capabilities a device with the given code supports.
pub fn capabilities_for(code: u8) -> Capabilities {
    Capabilities::from_code(code)
}
