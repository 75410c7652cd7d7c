//! ISTAT region code utilities.
//!
//! Provides mappings between ISTAT region codes, official region names,
//! and the three statistical macro areas used when reporting national
//! road-accident figures.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::RegionCode;

/// ISTAT codes of the 20 Italian regions, in code order.
pub const REGION_CODES: &[u8] = &[
    1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20,
];

/// Statistical macro areas grouping the Italian regions.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MacroArea {
    /// Piemonte through Emilia-Romagna (01-08).
    North,
    /// Toscana, Umbria, Marche, Lazio (09-12).
    Centre,
    /// Abruzzo through Sardegna (13-20).
    SouthAndIslands,
}

impl MacroArea {
    /// Returns all variants in north-to-south order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::North, Self::Centre, Self::SouthAndIslands]
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::North => "North",
            Self::Centre => "Centre",
            Self::SouthAndIslands => "South and Islands",
        }
    }
}

/// Maps an ISTAT region code to its official name.
///
/// Returns `"Unknown"` for unrecognized codes.
#[must_use]
pub const fn region_name(code: RegionCode) -> &'static str {
    match code.value() {
        1 => "Piemonte",
        2 => "Valle d'Aosta",
        3 => "Lombardia",
        4 => "Trentino-Alto Adige",
        5 => "Veneto",
        6 => "Friuli-Venezia Giulia",
        7 => "Liguria",
        8 => "Emilia-Romagna",
        9 => "Toscana",
        10 => "Umbria",
        11 => "Marche",
        12 => "Lazio",
        13 => "Abruzzo",
        14 => "Molise",
        15 => "Campania",
        16 => "Puglia",
        17 => "Basilicata",
        18 => "Calabria",
        19 => "Sicilia",
        20 => "Sardegna",
        _ => "Unknown",
    }
}

/// Maps an ISTAT region code to its macro area.
///
/// Returns `None` for codes outside 01-20.
#[must_use]
pub const fn macro_area(code: RegionCode) -> Option<MacroArea> {
    match code.value() {
        1..=8 => Some(MacroArea::North),
        9..=12 => Some(MacroArea::Centre),
        13..=20 => Some(MacroArea::SouthAndIslands),
        _ => None,
    }
}

/// Looks up a region code by its name (case-insensitive, ignoring
/// surrounding whitespace).
#[must_use]
pub fn code_for_name(name: &str) -> Option<RegionCode> {
    let wanted = name.trim().to_lowercase();
    REGION_CODES
        .iter()
        .filter_map(|c| RegionCode::new(*c).ok())
        .find(|code| region_name(*code).to_lowercase() == wanted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(v: u8) -> RegionCode {
        RegionCode::new(v).unwrap()
    }

    #[test]
    fn region_count() {
        assert_eq!(REGION_CODES.len(), 20);
    }

    #[test]
    fn name_coverage() {
        for c in REGION_CODES {
            assert_ne!(region_name(code(*c)), "Unknown", "no name for code {c}");
        }
    }

    #[test]
    fn name_roundtrip() {
        for c in REGION_CODES {
            let name = region_name(code(*c));
            assert_eq!(code_for_name(name), Some(code(*c)), "{name}");
        }
    }

    #[test]
    fn case_insensitive_lookup() {
        assert_eq!(code_for_name("lazio"), Some(code(12)));
        assert_eq!(code_for_name("  SICILIA "), Some(code(19)));
        assert_eq!(code_for_name("Atlantis"), None);
    }

    #[test]
    fn macro_areas() {
        assert_eq!(macro_area(code(1)), Some(MacroArea::North));
        assert_eq!(macro_area(code(8)), Some(MacroArea::North));
        assert_eq!(macro_area(code(9)), Some(MacroArea::Centre));
        assert_eq!(macro_area(code(12)), Some(MacroArea::Centre));
        assert_eq!(macro_area(code(13)), Some(MacroArea::SouthAndIslands));
        assert_eq!(macro_area(code(20)), Some(MacroArea::SouthAndIslands));
        assert_eq!(macro_area(code(21)), None);
    }

    #[test]
    fn unknown_code() {
        assert_eq!(region_name(code(42)), "Unknown");
    }
}
