//! Repair of mis-decoded upstream text
//!
//! Some mirrors serve UTF-8 text that went through a Latin-1 / Windows-1252
//! decode on the way, so `你好` arrives as `ä½ å¥½`. Each such character maps
//! back to exactly one byte; if the recovered bytes form valid UTF-8 the
//! original text is restored.

/// Windows-1252 characters in the 0x80..=0x9F range and the byte they encode
const CP1252_HIGH: &[(char, u8)] = &[
    ('\u{20AC}', 0x80),
    ('\u{201A}', 0x82),
    ('\u{0192}', 0x83),
    ('\u{201E}', 0x84),
    ('\u{2026}', 0x85),
    ('\u{2020}', 0x86),
    ('\u{2021}', 0x87),
    ('\u{02C6}', 0x88),
    ('\u{2030}', 0x89),
    ('\u{0160}', 0x8A),
    ('\u{2039}', 0x8B),
    ('\u{0152}', 0x8C),
    ('\u{017D}', 0x8E),
    ('\u{2018}', 0x91),
    ('\u{2019}', 0x92),
    ('\u{201C}', 0x93),
    ('\u{201D}', 0x94),
    ('\u{2022}', 0x95),
    ('\u{2013}', 0x96),
    ('\u{2014}', 0x97),
    ('\u{02DC}', 0x98),
    ('\u{2122}', 0x99),
    ('\u{0161}', 0x9A),
    ('\u{203A}', 0x9B),
    ('\u{0153}', 0x9C),
    ('\u{017E}', 0x9E),
    ('\u{0178}', 0x9F),
];

/// Maps a character back to the single byte it was decoded from
fn single_byte(c: char) -> Option<u8> {
    let code = c as u32;
    if code <= 0xFF {
        return Some(code as u8);
    }
    CP1252_HIGH
        .iter()
        .find(|(ch, _)| *ch == c)
        .map(|(_, byte)| *byte)
}

/// Whether `c` could be the decoded form of a UTF-8 continuation byte (0x80..=0xBF)
fn is_continuation(c: char) -> bool {
    matches!(single_byte(c), Some(0x80..=0xBF))
}

/// Heuristic check for the mis-decoding pattern
///
/// Looks for a UTF-8 lead byte rendered as `Â`..`ô` immediately followed by
/// a character that maps to a continuation byte.
pub fn looks_mis_decoded(text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    chars
        .windows(2)
        .any(|pair| matches!(pair[0], '\u{00C2}'..='\u{00F4}') && is_continuation(pair[1]))
}

/// Restores text that was UTF-8 decoded as a single-byte encoding
///
/// Returns the input unchanged when the pattern is absent or the recovered
/// bytes are not valid UTF-8.
pub fn repair_mis_decoded(text: &str) -> String {
    if !looks_mis_decoded(text) {
        return text.to_string();
    }

    let bytes: Option<Vec<u8>> = text.chars().map(single_byte).collect();
    match bytes.map(String::from_utf8) {
        Some(Ok(repaired)) => repaired,
        _ => text.to_string(),
    }
}
