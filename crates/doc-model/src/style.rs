use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MIN_FONT_SIZE: f32 = 8.0;
pub const MAX_FONT_SIZE: f32 = 48.0;
pub const DEFAULT_FONT_SIZE: f32 = 12.0;

/// The font families offered for free text.
///
/// Only these three are offered because each one maps onto a standard PDF
/// font that every reader can display without embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FontFamily {
    #[default]
    Sans,
    Serif,
    Mono,
}

impl FontFamily {
    pub const ALL: [FontFamily; 3] = [FontFamily::Sans, FontFamily::Serif, FontFamily::Mono];

    pub fn label(self) -> &'static str {
        match self {
            Self::Sans => "Sans (Helvetica)",
            Self::Serif => "Serif (Times)",
            Self::Mono => "Mono (Courier)",
        }
    }

    /// Family name used when drawing the text on screen.
    pub fn display_family(self) -> &'static str {
        match self {
            Self::Sans => "Helvetica",
            Self::Serif => "Times New Roman",
            Self::Mono => "Courier New",
        }
    }

    /// Resolves an arbitrary family name or menu label by case-insensitive
    /// substring match. Unknown names resolve to [`FontFamily::Sans`].
    pub fn from_name(name: &str) -> Self {
        let name = name.trim().to_lowercase();

        if let Some(family) = Self::ALL.into_iter().find(|family| {
            name.contains(&family.display_family().to_lowercase())
                || name == family.label().to_lowercase()
        }) {
            return family;
        }

        if ["time", "georgia", "serif"].iter().any(|needle| name.contains(needle)) {
            return Self::Serif;
        }

        if ["cour", "mono"].iter().any(|needle| name.contains(needle)) {
            return Self::Mono;
        }

        Self::Sans
    }
}

impl From<String> for FontFamily {
    fn from(value: String) -> Self {
        Self::from_name(&value)
    }
}

impl From<FontFamily> for String {
    fn from(value: FontFamily) -> Self {
        value.display_family().to_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid hex color {0:?}: expected #rgb or #rrggbb")]
pub struct ColorParseError(pub String);

/// An opaque RGB color written as `#rgb` or `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl HexColor {
    pub const BLACK: HexColor = HexColor { r: 0, g: 0, b: 0 };

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_normalized(self) -> (f32, f32, f32) {
        (self.r as f32 / 255.0, self.g as f32 / 255.0, self.b as f32 / 255.0)
    }
}

impl FromStr for HexColor {
    type Err = ColorParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
        let invalid = || ColorParseError(value.to_owned());

        if !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let expanded = match digits.len() {
            3 => digits.chars().flat_map(|ch| [ch, ch]).collect::<String>(),
            6 => digits.to_owned(),
            _ => return Err(invalid()),
        };

        let channel = |index: usize| {
            u8::from_str_radix(&expanded[index..index + 2], 16).map_err(|_| invalid())
        };

        Ok(Self { r: channel(0)?, g: channel(2)?, b: channel(4)? })
    }
}

impl TryFrom<String> for HexColor {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HexColor> for String {
    fn from(value: HexColor) -> Self {
        value.to_string()
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    pub font: FontFamily,
    pub size: f32,
    pub color: HexColor,
}

impl TextStyle {
    /// Returns the style with its size clamped into the supported range.
    pub fn normalized(mut self) -> Self {
        self.size = if self.size.is_finite() {
            self.size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
        } else {
            DEFAULT_FONT_SIZE
        };
        self
    }
}

impl Default for TextStyle {
    fn default() -> Self {
        Self { font: FontFamily::Sans, size: DEFAULT_FONT_SIZE, color: HexColor::BLACK }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn font_names_resolve_by_substring() {
        assert_eq!(FontFamily::from_name("Helvetica Neue"), FontFamily::Sans);
        assert_eq!(FontFamily::from_name("Times New Roman"), FontFamily::Serif);
        assert_eq!(FontFamily::from_name("Georgia"), FontFamily::Serif);
        assert_eq!(FontFamily::from_name("Courier New"), FontFamily::Mono);
        assert_eq!(FontFamily::from_name("DejaVu Sans Mono"), FontFamily::Mono);
        assert_eq!(FontFamily::from_name("Mono (Courier)"), FontFamily::Mono);
        assert_eq!(FontFamily::from_name("Comic Sans MS"), FontFamily::Sans);
        assert_eq!(FontFamily::from_name("Microsoft Sans Serif"), FontFamily::Serif);
        assert_eq!(FontFamily::from_name(""), FontFamily::Sans);
    }

    #[test]
    fn hex_colors_parse_long_and_short_forms() {
        assert_eq!("#FF8000".parse::<HexColor>().unwrap(), HexColor::rgb(255, 128, 0));
        assert_eq!(" 0000ff ".parse::<HexColor>().unwrap(), HexColor::rgb(0, 0, 255));
        assert_eq!("#f0a".parse::<HexColor>().unwrap(), HexColor::rgb(0xFF, 0x00, 0xAA));
    }

    #[test]
    fn hex_colors_reject_malformed_input() {
        for bad in ["", "#12", "#12345", "#GGGGGG", "red", "#1234567", "##fff", "###123456"] {
            assert!(bad.parse::<HexColor>().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn normalized_color_is_in_unit_range() {
        let (r, g, b) = HexColor::rgb(255, 0, 51).to_normalized();

        assert_eq!(r, 1.0);
        assert_eq!(g, 0.0);
        assert!((b - 0.2).abs() < 1e-6);
    }

    #[test]
    fn style_size_is_clamped() {
        let style = TextStyle { size: 200.0, ..TextStyle::default() }.normalized();
        assert_eq!(style.size, MAX_FONT_SIZE);

        let style = TextStyle { size: f32::NAN, ..TextStyle::default() }.normalized();
        assert_eq!(style.size, DEFAULT_FONT_SIZE);
    }

    #[test]
    fn style_serializes_with_readable_names() {
        let style = TextStyle { font: FontFamily::Mono, size: 14.0, color: HexColor::rgb(1, 2, 3) };
        let json = serde_json::to_value(style).expect("style should serialize");

        assert_eq!(json["font"], "Courier New");
        assert_eq!(json["color"], "#010203");

        let back: TextStyle = serde_json::from_value(json).expect("style should deserialize");
        assert_eq!(back, style);
    }
}
