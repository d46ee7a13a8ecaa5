//! Display modes and their compact transport format.
//!
//! A [`Mode`] packs into 48 bits (`width | height << 16 | hz << 32`). A list
//! of modes travels as comma-separated lowercase hex values, which is how
//! custom modes cross the elevation boundary and get persisted.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A resolution plus refresh rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mode {
    pub width: u16,
    pub height: u16,
    pub hz: u16,
}

impl Mode {
    pub const fn new(width: u16, height: u16, hz: u16) -> Self {
        Self { width, height, hz }
    }

    /// Packs the mode into its 48-bit transport value.
    pub const fn pack(self) -> u64 {
        self.width as u64 | (self.height as u64) << 16 | (self.hz as u64) << 32
    }

    /// Unpacks a 48-bit transport value. Bits above 48 are ignored.
    pub const fn unpack(bits: u64) -> Self {
        Self {
            width: bits as u16,
            height: (bits >> 16) as u16,
            hz: (bits >> 32) as u16,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} × {} @ {} Hz", self.width, self.height, self.hz)
    }
}

/// Every refresh rate available at one resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeSet {
    pub width: u16,
    pub height: u16,
    /// Distinct, ascending.
    pub refresh_rates: Vec<u16>,
}

/// Screen rotation. Discriminants match `DEVMODE::dmDisplayOrientation`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Landscape = 0,
    Portrait = 1,
    LandscapeFlipped = 2,
    PortraitFlipped = 3,
}

impl Orientation {
    /// Maps a raw `DMDO_*` value; unknown values read as landscape.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Portrait,
            2 => Self::LandscapeFlipped,
            3 => Self::PortraitFlipped,
            _ => Self::Landscape,
        }
    }

    pub fn raw(self) -> u32 {
        self as u32
    }

    pub fn degrees(self) -> u32 {
        self.raw() * 90
    }

    /// Whether going from `self` to `other` swaps the width and height axes.
    pub fn swaps_axes(self, other: Self) -> bool {
        (self.raw() + other.raw()) % 2 != 0
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Landscape => "Landscape",
            Self::Portrait => "Portrait",
            Self::LandscapeFlipped => "LandscapeFlipped",
            Self::PortraitFlipped => "PortraitFlipped",
        };
        f.write_str(name)
    }
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "landscape" | "0" => Ok(Self::Landscape),
            "portrait" | "90" => Ok(Self::Portrait),
            "landscape-flipped" | "landscapeflipped" | "180" => Ok(Self::LandscapeFlipped),
            "portrait-flipped" | "portraitflipped" | "270" => Ok(Self::PortraitFlipped),
            other => Err(format!("invalid orientation '{other}'")),
        }
    }
}

/// Serializes modes into the comma-separated hex transport format.
pub fn dump_modes(modes: &[Mode]) -> String {
    modes
        .iter()
        .map(|m| format!("{:x}", m.pack()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Parses the comma-separated hex transport format.
///
/// Tokens that are not valid hex are skipped.
pub fn parse_modes(text: &str) -> Vec<Mode> {
    text.trim()
        .split(',')
        .filter_map(|token| u64::from_str_radix(token.trim(), 16).ok())
        .map(Mode::unpack)
        .collect()
}

/// Groups modes by resolution.
///
/// Refresh rates are deduplicated and sorted ascending; the sets are
/// ordered by width, then height, both descending.
pub fn group_modes(modes: &[Mode]) -> Vec<ModeSet> {
    let mut groups: BTreeMap<(u16, u16), BTreeSet<u16>> = BTreeMap::new();
    for mode in modes {
        groups
            .entry((mode.width, mode.height))
            .or_default()
            .insert(mode.hz);
    }

    groups
        .into_iter()
        .rev()
        .map(|((width, height), rates)| ModeSet {
            width,
            height,
            refresh_rates: rates.into_iter().collect(),
        })
        .collect()
}

/// A partial mode change typed on the command line.
///
/// Accepts `WxH`, `@R` (or `rR`, since `@` is special in PowerShell) and
/// `WxH@R`. Whitespace around the separators is allowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeRequest {
    pub width: Option<u16>,
    pub height: Option<u16>,
    pub hz: Option<u16>,
}

impl ModeRequest {
    /// The full mode, when every field was given.
    pub fn complete(self) -> Option<Mode> {
        Some(Mode::new(self.width?, self.height?, self.hz?))
    }
}

impl FromStr for ModeRequest {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        let invalid = || format!("invalid display mode '{}'", s.trim());

        let (size, rate) = match text.find(['@', 'r', 'R']) {
            Some(pos) => (&text[..pos], Some(&text[pos + 1..])),
            None => (text.as_str(), None),
        };

        let hz = match rate {
            Some(r) => Some(r.parse::<u16>().map_err(|_| invalid())?),
            None => None,
        };

        let (width, height) = if size.is_empty() {
            (None, None)
        } else {
            let (w, h) = size.split_once(['x', 'X']).ok_or_else(invalid)?;
            (
                Some(w.parse::<u16>().map_err(|_| invalid())?),
                Some(h.parse::<u16>().map_err(|_| invalid())?),
            )
        };

        if width.is_none() && hz.is_none() {
            return Err(invalid());
        }
        Ok(Self { width, height, hz })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn pack_unpack_is_bijective(width: u16, height: u16, hz: u16) {
            let mode = Mode::new(width, height, hz);
            prop_assert_eq!(Mode::unpack(mode.pack()), mode);
        }

        #[test]
        fn hex_list_survives_transport(
            modes in prop::collection::vec(any::<(u16, u16, u16)>(), 1..8)
        ) {
            let modes: Vec<Mode> = modes.into_iter().map(|(w, h, r)| Mode::new(w, h, r)).collect();
            prop_assert_eq!(parse_modes(&dump_modes(&modes)), modes);
        }
    }

    #[test]
    fn pack_layout_matches_transport_format() {
        let mode = Mode::new(1920, 1080, 60);

        assert_eq!(mode.pack(), 0x3c_0438_0780);
        assert_eq!(dump_modes(&[mode]), "3c04380780");
    }

    #[test]
    fn parse_skips_garbage_tokens() {
        let modes = parse_modes(" 3c04380780,zz,,3c02d00500 ");

        assert_eq!(
            modes,
            vec![Mode::new(1920, 1080, 60), Mode::new(1280, 720, 60)]
        );
    }

    #[test]
    fn grouping_sorts_and_dedups() {
        // Arrange
        let modes = [
            Mode::new(1280, 720, 60),
            Mode::new(1920, 1080, 144),
            Mode::new(1920, 1080, 60),
            Mode::new(1920, 1080, 60),
            Mode::new(1920, 1200, 60),
            Mode::new(2560, 1440, 120),
        ];

        // Act
        let sets = group_modes(&modes);

        // Assert
        let order: Vec<(u16, u16)> = sets.iter().map(|s| (s.width, s.height)).collect();
        assert_eq!(
            order,
            vec![(2560, 1440), (1920, 1200), (1920, 1080), (1280, 720)]
        );
        assert_eq!(sets[2].refresh_rates, vec![60, 144]);
    }

    #[test]
    fn orientation_parity() {
        assert!(Orientation::Landscape.swaps_axes(Orientation::Portrait));
        assert!(Orientation::Portrait.swaps_axes(Orientation::LandscapeFlipped));
        assert!(!Orientation::Landscape.swaps_axes(Orientation::LandscapeFlipped));
        assert!(!Orientation::Portrait.swaps_axes(Orientation::PortraitFlipped));
    }

    #[test]
    fn mode_request_forms() {
        assert_eq!(
            "1920x1080".parse::<ModeRequest>(),
            Ok(ModeRequest {
                width: Some(1920),
                height: Some(1080),
                hz: None
            })
        );
        assert_eq!(
            "@144".parse::<ModeRequest>(),
            Ok(ModeRequest {
                width: None,
                height: None,
                hz: Some(144)
            })
        );
        assert_eq!(
            "r120".parse::<ModeRequest>().map(|r| r.hz),
            Ok(Some(120))
        );
        assert_eq!(
            "2560 X 1440 @ 165".parse::<ModeRequest>(),
            Ok(ModeRequest {
                width: Some(2560),
                height: Some(1440),
                hz: Some(165)
            })
        );
    }

    #[test]
    fn only_full_requests_are_complete() {
        let full: ModeRequest = "1920x1080@60".parse().unwrap();
        let partial: ModeRequest = "1920x1080".parse().unwrap();

        assert_eq!(full.complete(), Some(Mode::new(1920, 1080, 60)));
        assert_eq!(partial.complete(), None);
    }

    #[test]
    fn mode_request_rejects_nonsense() {
        assert!("".parse::<ModeRequest>().is_err());
        assert!("1920".parse::<ModeRequest>().is_err());
        assert!("axb".parse::<ModeRequest>().is_err());
        assert!("1920x1080@fast".parse::<ModeRequest>().is_err());
    }

    #[test]
    fn orientation_parses_names_and_degrees() {
        assert_eq!("portrait".parse(), Ok(Orientation::Portrait));
        assert_eq!("270".parse(), Ok(Orientation::PortraitFlipped));
        assert!("sideways".parse::<Orientation>().is_err());
    }
}
