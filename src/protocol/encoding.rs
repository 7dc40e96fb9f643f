//! Windows-1252 编解码
//!
//! 求解器只认 Windows-1252。0x80..=0x9F 之外与 Latin-1 相同，
//! 这一段按下表映射；未定义的五个码位按 C1 控制字符处理。

use crate::error::ProtocolError;

const HIGH_RANGE: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
];

/// 编码为 Windows-1252 字节
pub fn encode(text: &str) -> Result<Vec<u8>, ProtocolError> {
    text.chars()
        .map(|c| {
            let code = c as u32;
            if code < 0x80 || (0xA0..=0xFF).contains(&code) {
                Ok(code as u8)
            } else {
                HIGH_RANGE
                    .iter()
                    .position(|&h| h == c)
                    .map(|i| 0x80 + i as u8)
                    .ok_or(ProtocolError::Unencodable(c))
            }
        })
        .collect()
}

/// 从 Windows-1252 字节解码，不会失败
pub fn decode(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            0x80..=0x9F => HIGH_RANGE[(b - 0x80) as usize],
            _ => b as char,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_umlauts_are_single_bytes() {
        let bytes = encode("Prüfungsform").unwrap();
        assert_eq!(bytes.len(), "Prüfungsform".chars().count());
        assert_eq!(bytes[2], 0xFC);
        assert_eq!(decode(&bytes), "Prüfungsform");
    }

    #[test]
    fn test_windows_specific_range() {
        let bytes = encode("€ – „x“").unwrap();
        assert_eq!(bytes[0], 0x80);
        assert_eq!(bytes[2], 0x96);
        assert_eq!(decode(&bytes), "€ – „x“");
    }

    #[test]
    fn test_unencodable_character() {
        assert!(matches!(encode("考试"), Err(ProtocolError::Unencodable('考'))));
    }
}
