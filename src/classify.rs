//! Stateless predicates answering "does this chunk look like IME-produced
//! text?" and "what script?".
//!
//! IME engines on POSIX terminals deliver a settled composition as a burst
//! of UTF-8 bytes written to the controlling TTY. Any chunk whose byte
//! length exceeds its code-point count carries multi-byte UTF-8, which
//! never comes from plain Latin typing, so that single comparison catches
//! every settled composition regardless of script. The per-script ranges
//! only refine the answer with a script tag.

/// Writing system a composed chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Vietnamese,
    Chinese,
    Japanese,
    Korean,
    Thai,
    Arabic,
    Devanagari,
}

/// Result of classifying one input chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Plain keystrokes; forwarded byte-for-byte.
    Regular,
    /// IME composition output, with a script tag when one range matched.
    Ime(Option<Script>),
}

impl Classification {
    pub fn is_ime(self) -> bool {
        matches!(self, Classification::Ime(_))
    }
}

/// Classify a decoded input chunk.
///
/// A chunk is IME if its UTF-8 byte length exceeds its code-point count,
/// if it carries a combining mark, or if any code point falls in a known
/// script range. Empty chunks and lone ASCII bytes are regular input.
pub fn classify(text: &str) -> Classification {
    if text.is_empty() {
        return Classification::Regular;
    }
    if text.len() == 1 && text.as_bytes()[0] < 0x80 {
        return Classification::Regular;
    }
    if text.len() > text.chars().count()
        || text.chars().any(is_combining_mark)
        || text.chars().any(|c| char_script(c).is_some())
    {
        return Classification::Ime(detect_script(text));
    }
    Classification::Regular
}

/// Report the dominant script of a chunk.
///
/// Scripts are ranked in a fixed order (Vietnamese first, Devanagari last);
/// the highest-ranked script any code point matches wins, so a chunk mixing
/// Latin-diacritic text with CJK is tagged by the earlier table row.
pub fn detect_script(text: &str) -> Option<Script> {
    let mut best: Option<Script> = None;
    for c in text.chars() {
        let Some(script) = char_script(c) else {
            continue;
        };
        match best {
            Some(current) if script_rank(current) <= script_rank(script) => {}
            _ => best = Some(script),
        }
    }
    best
}

fn script_rank(script: Script) -> u8 {
    match script {
        Script::Vietnamese => 0,
        Script::Chinese => 1,
        Script::Japanese => 2,
        Script::Korean => 3,
        Script::Thai => 4,
        Script::Arabic => 5,
        Script::Devanagari => 6,
    }
}

fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F)
}

/// Block-range lookup for the scripts the proxy recognizes.
#[inline]
fn char_script(c: char) -> Option<Script> {
    let cp = c as u32;
    match cp {
        // Vietnamese: precomposed Latin with diacritics plus the horn/bar
        // letters, and combining marks used by Telex/VNI engines
        0x00C0..=0x00FF => Some(Script::Vietnamese), // Latin-1 letters À-ÿ
        0x0102..=0x0103 => Some(Script::Vietnamese), // Ă ă
        0x0110..=0x0111 => Some(Script::Vietnamese), // Đ đ
        0x0128..=0x0129 => Some(Script::Vietnamese), // Ĩ ĩ
        0x0168..=0x0169 => Some(Script::Vietnamese), // Ũ ũ
        0x01A0..=0x01B0 => Some(Script::Vietnamese), // Ơ ơ Ư ư
        0x1EA0..=0x1EF9 => Some(Script::Vietnamese), // Latin Extended Additional (Vietnamese)
        0x0300..=0x036F => Some(Script::Vietnamese), // Combining Diacritical Marks

        // Chinese / Han
        0x4E00..=0x9FFF => Some(Script::Chinese), // CJK Unified Ideographs
        0x3400..=0x4DBF => Some(Script::Chinese), // CJK Extension A
        0xF900..=0xFAFF => Some(Script::Chinese), // CJK Compatibility Ideographs
        0x2F00..=0x2FDF => Some(Script::Chinese), // Kangxi Radicals

        // Japanese kana
        0x3040..=0x309F => Some(Script::Japanese), // Hiragana
        0x30A0..=0x30FF => Some(Script::Japanese), // Katakana
        0x31F0..=0x31FF => Some(Script::Japanese), // Katakana Phonetic Extensions
        0xFF65..=0xFF9F => Some(Script::Japanese), // Halfwidth Katakana

        // Korean Hangul
        0xAC00..=0xD7AF => Some(Script::Korean), // Hangul Syllables
        0x1100..=0x11FF => Some(Script::Korean), // Hangul Jamo
        0xA960..=0xA97F => Some(Script::Korean), // Hangul Jamo Extended-A
        0x3130..=0x318F => Some(Script::Korean), // Hangul Compatibility Jamo

        0x0E00..=0x0E7F => Some(Script::Thai),
        0x0600..=0x06FF => Some(Script::Arabic),
        0x0900..=0x097F => Some(Script::Devanagari),

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_single_ascii_are_regular() {
        assert_eq!(classify(""), Classification::Regular);
        assert_eq!(classify("a"), Classification::Regular);
        assert_eq!(classify("\t"), Classification::Regular);
    }

    #[test]
    fn plain_ascii_words_are_regular() {
        assert_eq!(classify("xin "), Classification::Regular);
        assert_eq!(classify("ls -la"), Classification::Regular);
    }

    #[test]
    fn multibyte_chunks_are_ime() {
        assert!(classify("chào").is_ime());
        assert!(classify("中").is_ime());
        assert!(classify("ñ").is_ime());
    }

    #[test]
    fn combining_marks_are_ime() {
        // "e" followed by U+0301 combining acute
        let text = "e\u{0301}";
        assert_eq!(classify(text), Classification::Ime(Some(Script::Vietnamese)));
    }

    #[test]
    fn script_detection_matches_range_table() {
        assert_eq!(detect_script("chào"), Some(Script::Vietnamese));
        assert_eq!(detect_script("中文"), Some(Script::Chinese));
        assert_eq!(detect_script("ひらがな"), Some(Script::Japanese));
        assert_eq!(detect_script("ｶﾀｶﾅ"), Some(Script::Japanese));
        assert_eq!(detect_script("한글"), Some(Script::Korean));
        assert_eq!(detect_script("ภาษาไทย"), Some(Script::Thai));
        assert_eq!(detect_script("مرحبا"), Some(Script::Arabic));
        assert_eq!(detect_script("नमस्ते"), Some(Script::Devanagari));
        assert_eq!(detect_script("ascii"), None);
    }

    #[test]
    fn mixed_chunks_take_the_earlier_table_row() {
        // Vietnamese outranks Chinese even when the CJK char comes first
        assert_eq!(detect_script("中à"), Some(Script::Vietnamese));
        // Chinese outranks Japanese kana
        assert_eq!(detect_script("の中"), Some(Script::Chinese));
    }

    #[test]
    fn ime_without_known_range_has_no_script() {
        // Cyrillic is multi-byte UTF-8 but outside every range row
        assert_eq!(classify("привет"), Classification::Ime(None));
    }

    #[test]
    fn classification_reports_script_tag() {
        assert_eq!(classify("日本"), Classification::Ime(Some(Script::Chinese)));
        assert_eq!(classify("한"), Classification::Ime(Some(Script::Korean)));
    }
}
