use doc_model::FontFamily;

/// The standard Type1 fonts used for exported text. Readers are required to
/// provide these, so nothing is embedded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StandardFont {
    Helvetica,
    TimesRoman,
    Courier,
}

impl StandardFont {
    pub const DEFAULT: StandardFont = StandardFont::Helvetica;

    pub fn base_font(self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::TimesRoman => "Times-Roman",
            Self::Courier => "Courier",
        }
    }

    /// Name under which the font is registered in a page's `/Font` resources.
    pub fn resource_name(self) -> &'static str {
        match self {
            Self::Helvetica => "BLHelv",
            Self::TimesRoman => "BLTiro",
            Self::Courier => "BLCour",
        }
    }
}

impl From<FontFamily> for StandardFont {
    fn from(family: FontFamily) -> Self {
        match family {
            FontFamily::Sans => Self::Helvetica,
            FontFamily::Serif => Self::TimesRoman,
            FontFamily::Mono => Self::Courier,
        }
    }
}

/// Encodes `text` as WinAnsi bytes. Returns the first character that has no
/// WinAnsi code point on failure.
pub(crate) fn encode_win_ansi(text: &str) -> Result<Vec<u8>, char> {
    text.chars().map(|ch| win_ansi_byte(ch).ok_or(ch)).collect()
}

/// Like [`encode_win_ansi`] but substitutes `?` for unencodable characters.
pub(crate) fn encode_win_ansi_lossy(text: &str) -> Vec<u8> {
    text.chars().map(|ch| win_ansi_byte(ch).unwrap_or(b'?')).collect()
}

fn win_ansi_byte(ch: char) -> Option<u8> {
    let code = ch as u32;
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(code as u8),
        _ => match ch {
            '\t' => Some(b' '),
            '€' => Some(0x80),
            '‚' => Some(0x82),
            'ƒ' => Some(0x83),
            '„' => Some(0x84),
            '…' => Some(0x85),
            '†' => Some(0x86),
            '‡' => Some(0x87),
            'ˆ' => Some(0x88),
            '‰' => Some(0x89),
            'Š' => Some(0x8A),
            '‹' => Some(0x8B),
            'Œ' => Some(0x8C),
            'Ž' => Some(0x8E),
            '‘' => Some(0x91),
            '’' => Some(0x92),
            '“' => Some(0x93),
            '”' => Some(0x94),
            '•' => Some(0x95),
            '–' => Some(0x96),
            '—' => Some(0x97),
            '˜' => Some(0x98),
            '™' => Some(0x99),
            'š' => Some(0x9A),
            '›' => Some(0x9B),
            'œ' => Some(0x9C),
            'ž' => Some(0x9E),
            'Ÿ' => Some(0x9F),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn families_map_to_standard_fonts() {
        assert_eq!(StandardFont::from(FontFamily::Sans).base_font(), "Helvetica");
        assert_eq!(StandardFont::from(FontFamily::Serif).base_font(), "Times-Roman");
        assert_eq!(StandardFont::from(FontFamily::Mono).base_font(), "Courier");
    }

    #[test]
    fn latin_text_encodes_to_win_ansi() {
        assert_eq!(encode_win_ansi("Grüße €5"), Ok(vec![b'G', b'r', 0xFC, 0xDF, b'e', b' ', 0x80, b'5']));
    }

    #[test]
    fn unsupported_characters_are_reported_or_replaced() {
        assert_eq!(encode_win_ansi("Hi 世界"), Err('世'));
        assert_eq!(encode_win_ansi_lossy("Hi 世"), b"Hi ?".to_vec());
    }
}
