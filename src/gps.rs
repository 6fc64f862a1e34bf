use serde::{Deserialize, Serialize};
use std::fmt;

/// Hemisphere reference of a GPS coordinate (`GPSLatitudeRef` / `GPSLongitudeRef`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// Parse an EXIF reference value. Accepts both the raw `N`/`S`/`E`/`W`
    /// form and the spelled-out names exiftool prints without `-n`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "n" | "north" => Some(Self::North),
            "s" | "south" => Some(Self::South),
            "e" | "east" => Some(Self::East),
            "w" | "west" => Some(Self::West),
            _ => None,
        }
    }

    /// Apply this direction's sign convention to a raw coordinate magnitude.
    ///
    /// North and East yield a non-negative value, South and West a non-positive one,
    /// regardless of the sign `magnitude` already carries. Apply once per raw value.
    pub fn sign(self, magnitude: f64) -> f64 {
        match self {
            Self::North | Self::East => magnitude.abs(),
            Self::South | Self::West => -magnitude.abs(),
        }
    }
}

/// Whether the recorded GPS tags reflect an actual satellite fix (`GPSStatus`).
///
/// An image without a status tag, or with a value we do not understand, has no
/// `GpsStatus` at all; callers hold an `Option<GpsStatus>` and must not treat
/// `None` as [`GpsStatus::Active`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GpsStatus {
    Active,
    Void,
}

impl GpsStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "A" | "Active" | "Measurement Active" => Some(Self::Active),
            "V" | "Void" | "Measurement Void" => Some(Self::Void),
            _ => None,
        }
    }

    pub fn is_active(self) -> bool {
        self == Self::Active
    }
}

impl fmt::Display for GpsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("Active"),
            Self::Void => f.write_str("Void"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Direction::sign ───────────────────────────────────────────────

    #[test]
    fn north_and_east_keep_magnitude() {
        for m in [0.0, 1.5, 37.7749, 180.0] {
            assert_eq!(Direction::North.sign(m), m);
            assert_eq!(Direction::East.sign(m), m);
        }
    }

    #[test]
    fn south_and_west_negate_magnitude() {
        for m in [1.5, 37.7749, 180.0] {
            assert_eq!(Direction::South.sign(m), -m);
            assert_eq!(Direction::West.sign(m), -m);
        }
    }

    #[test]
    fn sign_is_idempotent() {
        let once = Direction::West.sign(122.4194);
        assert_eq!(Direction::West.sign(once), once);
        let once = Direction::North.sign(37.7749);
        assert_eq!(Direction::North.sign(once), once);
    }

    #[test]
    fn sign_overrides_wrong_input_sign() {
        assert_eq!(Direction::North.sign(-10.0), 10.0);
        assert_eq!(Direction::South.sign(-10.0), -10.0);
    }

    // ── parsing ───────────────────────────────────────────────────────

    #[test]
    fn direction_parse_variants() {
        assert_eq!(Direction::parse("N"), Some(Direction::North));
        assert_eq!(Direction::parse("west"), Some(Direction::West));
        assert_eq!(Direction::parse(" S "), Some(Direction::South));
        assert_eq!(Direction::parse("X"), None);
        assert_eq!(Direction::parse(""), None);
    }

    #[test]
    fn status_parse_variants() {
        assert_eq!(GpsStatus::parse("A"), Some(GpsStatus::Active));
        assert_eq!(GpsStatus::parse("Measurement Void"), Some(GpsStatus::Void));
        assert_eq!(GpsStatus::parse("V"), Some(GpsStatus::Void));
    }

    #[test]
    fn unknown_status_is_absent_not_active() {
        assert_eq!(GpsStatus::parse("maybe"), None);
        assert_eq!(GpsStatus::parse(""), None);
    }
}
