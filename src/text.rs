//! Comment text normalization
//!
//! Turns free-form chat text into a canonical form for answer matching:
//! emojis and @mentions are stripped, then the text is folded to an
//! accent-insensitive, lowercase, trimmed string.

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Pictographic emoji plus the joiners/selectors that glue emoji sequences together.
/// Plain digits, `#` and `*` carry the `Emoji` property too, so that property is not used.
static EMOJI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\p{Extended_Pictographic}\p{Emoji_Presentation}\p{Emoji_Modifier}\x{200D}\x{FE0F}]")
        .expect("emoji pattern is valid")
});

/// `@` followed by word characters. The full-width and small commercial-at forms
/// fold to `@` under NFKD, so they count as mentions here as well.
static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[@\x{FE6B}\x{FF20}]\w+").expect("mention pattern is valid"));

/// Combining Diacritical Marks block
fn is_diacritic(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
}

fn fold_diacritics(text: &str) -> String {
    text.nfkd().filter(|c| !is_diacritic(*c)).collect()
}

/// Strip emoji code points, leaving everything else (including combining marks) untouched
pub fn remove_emojis(text: &str) -> String {
    EMOJI.replace_all(text, "").into_owned()
}

/// Strip `@name` tokens. Surrounding whitespace is left for [`normalize`] to trim.
pub fn remove_mentions(text: &str) -> String {
    MENTION.replace_all(text, "").into_owned()
}

/// NFKD, drop combining diacritics, lowercase, trim.
///
/// Some lowercase mappings emit a combining mark (`İ` becomes `i` + U+0307),
/// so the decompose/strip pass runs again after lowercasing.
pub fn normalize(text: &str) -> String {
    let folded = fold_diacritics(text).to_lowercase();
    fold_diacritics(&folded).trim().to_string()
}

fn clean_pass(text: &str) -> String {
    normalize(&remove_mentions(&remove_emojis(text)))
}

/// Full cleaning pipeline: emojis first, then mentions, then normalization.
///
/// Folding can uncover a mention that was not one before (`@²` becomes `@2`),
/// so passes repeat until the text is stable. Every extra pass only removes
/// characters, which bounds the loop.
pub fn clean_text(text: &str) -> String {
    let mut cleaned = clean_pass(text);
    loop {
        let again = clean_pass(&cleaned);
        if again == cleaned {
            return cleaned;
        }
        cleaned = again;
    }
}
