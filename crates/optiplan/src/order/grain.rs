//! Grain direction codes and their OptiPlanning integer values.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrainCode {
    /// `0-Material`: follow the material's own grain.
    Material,
    /// `1-Boyuna`: lengthwise.
    Lengthwise,
    /// `2-Enine`: crosswise.
    Crosswise,
    /// `3-Material`.
    MaterialAlt,
}

impl GrainCode {
    /// Parses a symbolic code or its integer equivalent. Surrounding whitespace
    /// is ignored; anything else is rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "0-Material" | "0" => Some(Self::Material),
            "1-Boyuna" | "1" => Some(Self::Lengthwise),
            "2-Enine" | "2" => Some(Self::Crosswise),
            "3-Material" | "3" => Some(Self::MaterialAlt),
            _ => None,
        }
    }

    pub fn opti_value(self) -> u8 {
        match self {
            Self::Material => 0,
            Self::Lengthwise => 1,
            Self::Crosswise => 2,
            Self::MaterialAlt => 3,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Material => "0-Material",
            Self::Lengthwise => "1-Boyuna",
            Self::Crosswise => "2-Enine",
            Self::MaterialAlt => "3-Material",
        }
    }
}

/// Export-side grain map: unknown or missing codes fall back to 0.
pub fn grain_to_opti(raw: Option<&str>) -> u8 {
    raw.and_then(GrainCode::parse)
        .map(GrainCode::opti_value)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbolic_codes() {
        assert_eq!(GrainCode::parse("0-Material"), Some(GrainCode::Material));
        assert_eq!(GrainCode::parse("1-Boyuna"), Some(GrainCode::Lengthwise));
        assert_eq!(GrainCode::parse("2-Enine"), Some(GrainCode::Crosswise));
        assert_eq!(GrainCode::parse("3-Material"), Some(GrainCode::MaterialAlt));
    }

    #[test]
    fn test_integer_equivalents_and_whitespace() {
        assert_eq!(GrainCode::parse(" 1 "), Some(GrainCode::Lengthwise));
        assert_eq!(GrainCode::parse("3"), Some(GrainCode::MaterialAlt));
    }

    #[test]
    fn test_unknown_codes() {
        assert_eq!(GrainCode::parse("4"), None);
        assert_eq!(GrainCode::parse("boyuna"), None);
        assert_eq!(GrainCode::parse(""), None);
    }

    #[test]
    fn test_grain_to_opti_defaults_to_zero() {
        assert_eq!(grain_to_opti(Some("2-Enine")), 2);
        assert_eq!(grain_to_opti(Some("3-Material")), 3);
        assert_eq!(grain_to_opti(Some("diagonal")), 0);
        assert_eq!(grain_to_opti(None), 0);
    }

    #[test]
    fn test_symbol_round_trips_through_parse() {
        for code in [
            GrainCode::Material,
            GrainCode::Lengthwise,
            GrainCode::Crosswise,
            GrainCode::MaterialAlt,
        ] {
            assert_eq!(GrainCode::parse(code.symbol()), Some(code));
        }
    }
}
