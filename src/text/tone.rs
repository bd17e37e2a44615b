//! Numbered-pinyin → tone-mark conversion.
//!
//! Dictionary exports and some AI backends emit pinyin as `xue2 xi2`; the
//! flashcards want `xuéxí`.  [`numbered_to_marked`] converts a whole string
//! (any mix of numbered syllables, already-marked text and punctuation),
//! [`convert_syllable`] converts a single syllable.
//!
//! Accent placement follows the usual orthographic rule:
//! `a` > `e` > the `o` of `ou` > the last vowel of the syllable.

// ---------------------------------------------------------------------------
// Tone tables
// ---------------------------------------------------------------------------

/// Marked forms for tones 1–4, indexed by `tone - 1`.
fn marked_vowel(vowel: char, tone: u8) -> Option<char> {
    let table: [char; 4] = match vowel {
        'a' => ['ā', 'á', 'ǎ', 'à'],
        'e' => ['ē', 'é', 'ě', 'è'],
        'i' => ['ī', 'í', 'ǐ', 'ì'],
        'o' => ['ō', 'ó', 'ǒ', 'ò'],
        'u' => ['ū', 'ú', 'ǔ', 'ù'],
        'ü' => ['ǖ', 'ǘ', 'ǚ', 'ǜ'],
        'A' => ['Ā', 'Á', 'Ǎ', 'À'],
        'E' => ['Ē', 'É', 'Ě', 'È'],
        'I' => ['Ī', 'Í', 'Ǐ', 'Ì'],
        'O' => ['Ō', 'Ó', 'Ǒ', 'Ò'],
        'U' => ['Ū', 'Ú', 'Ǔ', 'Ù'],
        'Ü' => ['Ǖ', 'Ǘ', 'Ǚ', 'Ǜ'],
        _ => return None,
    };
    match tone {
        1..=4 => Some(table[usize::from(tone - 1)]),
        _ => None,
    }
}

fn is_vowel(c: char) -> bool {
    matches!(
        c.to_lowercase().next(),
        Some('a' | 'e' | 'i' | 'o' | 'u' | 'ü')
    )
}

// ---------------------------------------------------------------------------
// Syllable conversion
// ---------------------------------------------------------------------------

/// Whether a letter run can carry a tone digit: it needs a vowel (`v` counts
/// as `ü`), except for the erhua suffix `r`.
fn takes_tone(syllable: &str) -> bool {
    syllable.eq_ignore_ascii_case("r")
        || syllable
            .chars()
            .any(|c| is_vowel(c) || matches!(c, 'v' | 'V'))
}

/// Replace the `u:` / `v` spellings of `ü`.
fn normalise_umlaut(body: &str) -> String {
    body.replace("u:", "ü")
        .replace("U:", "Ü")
        .replace('v', "ü")
        .replace('V', "Ü")
}

/// Index (in chars) of the vowel that carries the tone mark.
fn accent_position(chars: &[char]) -> Option<usize> {
    let lower: Vec<char> = chars
        .iter()
        .map(|c| c.to_lowercase().next().unwrap_or(*c))
        .collect();

    if let Some(i) = lower.iter().position(|&c| c == 'a') {
        return Some(i);
    }
    if let Some(i) = lower.iter().position(|&c| c == 'e') {
        return Some(i);
    }
    if let Some(i) = lower.windows(2).position(|w| w == ['o', 'u']) {
        return Some(i);
    }
    chars.iter().rposition(|&c| is_vowel(c))
}

/// Convert one syllable body plus its tone number.
///
/// `tone` 5 (and 0) is the neutral tone: the digit is dropped and no
/// diacritic is added.
///
/// ```
/// use hanzi_cards::text::convert_syllable;
///
/// assert_eq!(convert_syllable("shun", 4), "shùn");
/// assert_eq!(convert_syllable("lu:e", 4), "lüè");
/// assert_eq!(convert_syllable("r", 5), "r");
/// ```
pub fn convert_syllable(body: &str, tone: u8) -> String {
    let body = normalise_umlaut(body);
    let mut chars: Vec<char> = body.chars().collect();

    if let Some(pos) = accent_position(&chars) {
        if let Some(marked) = marked_vowel(chars[pos], tone) {
            chars[pos] = marked;
        }
    }

    chars.into_iter().collect()
}

// ---------------------------------------------------------------------------
// Whole-string conversion
// ---------------------------------------------------------------------------

/// Convert every numbered syllable in `text` to its tone-marked form.
///
/// Syllables may be separated by whitespace or punctuation, or run together
/// (`xue2xi2`).  Tones are 1–4, with 5 or 0 for the neutral tone.  Text
/// without tone digits passes through unchanged, so already-marked pinyin is
/// safe to feed in; so does a letter run without a vowel (`MP3`, `hm4`).
///
/// ```
/// use hanzi_cards::text::numbered_to_marked;
///
/// assert_eq!(numbered_to_marked("xue2 xi2"), "xué xí");
/// assert_eq!(numbered_to_marked("ni3hao3"), "nǐhǎo");
/// assert_eq!(numbered_to_marked("xuéxí"), "xuéxí");
/// ```
pub fn numbered_to_marked(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut syllable = String::new();

    for c in text.chars() {
        if c.is_alphabetic() || (c == ':' && !syllable.is_empty()) {
            syllable.push(c);
            continue;
        }

        match c.to_digit(10) {
            Some(d @ 0..=5) if takes_tone(&syllable) => {
                out.push_str(&convert_syllable(&syllable, d as u8));
                syllable.clear();
            }
            _ => {
                out.push_str(&syllable);
                syllable.clear();
                out.push(c);
            }
        }
    }
    out.push_str(&syllable);
    out
}

/// Returns `true` when `text` contains at least one numbered syllable that
/// [`numbered_to_marked`] would convert.
pub fn has_tone_numbers(text: &str) -> bool {
    numbered_to_marked(text) != text
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
