//! Shared types and enums used across smospro.
//! Includes `PolMode`, `Split64`, `RotatedChannel`, `ProductFamily` and the
//! `CancelFlag` used by batch operations.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Bits of the observation flag word holding the polarization.
pub const POL_FLAGS_MASK: u32 = 0b11;
pub const POL_FLAG_X: u32 = 0;
pub const POL_FLAG_Y: u32 = 1;
/// Cross-polarization observations set bit 1 (XY1 = 2, XY2 = 3).
pub const POL_FLAG_CROSS: u32 = 0b10;

/// Polarization channel an observation or band refers to
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Debug, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum PolMode {
    X,
    Y,
    Xy,
}

impl PolMode {
    /// True if an observation carrying `flags` belongs to this polarization.
    pub fn matches(self, flags: u32) -> bool {
        let pol = flags & POL_FLAGS_MASK;
        match self {
            PolMode::X => pol == POL_FLAG_X,
            PolMode::Y => pol == POL_FLAG_Y,
            PolMode::Xy => pol & POL_FLAG_CROSS != 0,
        }
    }

    /// Polarization encoded in an observation flag word.
    pub fn from_flags(flags: u32) -> PolMode {
        match flags & POL_FLAGS_MASK {
            POL_FLAG_X => PolMode::X,
            POL_FLAG_Y => PolMode::Y,
            _ => PolMode::Xy,
        }
    }
}

impl std::fmt::Display for PolMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolMode::X => write!(f, "X"),
            PolMode::Y => write!(f, "Y"),
            PolMode::Xy => write!(f, "XY"),
        }
    }
}

/// Which part of a 64-bit field a band exposes
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split64 {
    #[default]
    Full64,
    Low32,
    High32,
}

impl Split64 {
    pub fn apply(self, bits: u64) -> u64 {
        match self {
            Split64::Full64 => bits,
            Split64::Low32 => bits & 0xFFFF_FFFF,
            Split64::High32 => bits >> 32,
        }
    }
}

/// Output channel of the polarization rotation into the H/V basis
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Debug, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RotatedChannel {
    BtH,
    BtV,
    BtHvReal,
    BtHvImag,
    AccuracyH,
    AccuracyV,
    AccuracyHv,
}

impl RotatedChannel {
    /// Channels that need the cross-polarization term.
    pub fn needs_cross_pol(self) -> bool {
        matches!(
            self,
            RotatedChannel::BtHvReal | RotatedChannel::BtHvImag | RotatedChannel::AccuracyHv
        )
    }
}

impl std::fmt::Display for RotatedChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RotatedChannel::BtH => "BT_H",
            RotatedChannel::BtV => "BT_V",
            RotatedChannel::BtHvReal => "BT_HV_Real",
            RotatedChannel::BtHvImag => "BT_HV_Imag",
            RotatedChannel::AccuracyH => "Accuracy_H",
            RotatedChannel::AccuracyV => "Accuracy_V",
            RotatedChannel::AccuracyHv => "Accuracy_HV",
        };
        write!(f, "{}", s)
    }
}

/// Product families distinguished by the 10-character file type
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ProductFamily {
    ScienceFullPol,
    ScienceDualPol,
    BrowseFullPol,
    BrowseDualPol,
    Level2,
    ZonedAux,
}

impl ProductFamily {
    pub fn from_file_type(file_type: &str) -> Option<Self> {
        match file_type {
            "MIR_SCLF1C" | "MIR_SCSF1C" => Some(ProductFamily::ScienceFullPol),
            "MIR_SCLD1C" | "MIR_SCSD1C" => Some(ProductFamily::ScienceDualPol),
            "MIR_BWLF1C" | "MIR_BWSF1C" => Some(ProductFamily::BrowseFullPol),
            "MIR_BWLD1C" | "MIR_BWSD1C" => Some(ProductFamily::BrowseDualPol),
            "MIR_SMUDP2" | "MIR_OSUDP2" => Some(ProductFamily::Level2),
            "AUX_DGGLSM" => Some(ProductFamily::ZonedAux),
            _ => None,
        }
    }

    pub fn is_full_pol(self) -> bool {
        matches!(self, ProductFamily::ScienceFullPol | ProductFamily::BrowseFullPol)
    }

    pub fn is_science(self) -> bool {
        matches!(self, ProductFamily::ScienceFullPol | ProductFamily::ScienceDualPol)
    }

    pub fn is_browse(self) -> bool {
        matches!(self, ProductFamily::BrowseFullPol | ProductFamily::BrowseDualPol)
    }
}

impl std::fmt::Display for ProductFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProductFamily::ScienceFullPol => write!(f, "ScienceFullPol"),
            ProductFamily::ScienceDualPol => write!(f, "ScienceDualPol"),
            ProductFamily::BrowseFullPol => write!(f, "BrowseFullPol"),
            ProductFamily::BrowseDualPol => write!(f, "BrowseDualPol"),
            ProductFamily::Level2 => write!(f, "Level2"),
            ProductFamily::ZonedAux => write!(f, "ZonedAux"),
        }
    }
}

/// Shared cancellation request for long-running batch work
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pol_mode_matches_flag_bits() {
        assert!(PolMode::X.matches(0b1000_0000));
        assert!(!PolMode::X.matches(1));
        assert!(PolMode::Y.matches(0b0100_0001));
        assert!(PolMode::Xy.matches(2));
        assert!(PolMode::Xy.matches(3));
        assert!(!PolMode::Xy.matches(1));
        assert_eq!(PolMode::from_flags(3), PolMode::Xy);
    }

    #[test]
    fn split64_halves() {
        let bits = 0x1122_3344_5566_7788u64;
        assert_eq!(Split64::Full64.apply(bits), bits);
        assert_eq!(Split64::Low32.apply(bits), 0x5566_7788);
        assert_eq!(Split64::High32.apply(bits), 0x1122_3344);
    }

    #[test]
    fn family_from_file_type() {
        assert_eq!(
            ProductFamily::from_file_type("MIR_SCSF1C"),
            Some(ProductFamily::ScienceFullPol)
        );
        assert_eq!(ProductFamily::from_file_type("MIR_XXXXXX"), None);
        assert!(ProductFamily::BrowseFullPol.is_full_pol());
        assert!(!ProductFamily::ScienceDualPol.is_full_pol());
    }
}
