//! Meaningful-character counting for recognized text
//!
//! OCR engines happily report stray marks as punctuation. Only letters,
//! digits and punctuation that sits next to a number carry signal, so those
//! are the only characters counted.

use unicode_general_category::{get_general_category, GeneralCategory};
use unicode_script::{Script, UnicodeScript};

/// Count the meaningful characters in `text`.
///
/// - Latin and Cyrillic letters and decimal digits always count
/// - `.` and `,` count only between two digits (`3.14`, `1,000`)
/// - `+`, `-` and `−` count only before a digit (`+5`, `-10`)
/// - `°` counts only after a digit (`45°`)
/// - currency symbols count next to a digit on either side (`$100`, `50€`)
pub fn count_tokens(text: &str) -> usize {
    let chars: Vec<char> = text.chars().collect();
    let digit_at = |i: Option<usize>| i.and_then(|i| chars.get(i)).is_some_and(|c| is_digit(*c));

    chars
        .iter()
        .enumerate()
        .filter(|&(i, &c)| {
            let prev = i.checked_sub(1);
            let next = Some(i + 1);

            if is_letter(c) || is_digit(c) {
                true
            } else if c == '.' || c == ',' {
                digit_at(prev) && digit_at(next)
            } else if c == '+' || c == '-' || c == '\u{2212}' {
                digit_at(next)
            } else if c == '°' {
                digit_at(prev)
            } else if is_currency(c) {
                digit_at(prev) || digit_at(next)
            } else {
                false
            }
        })
        .count()
}

fn is_letter(c: char) -> bool {
    matches!(c.script(), Script::Latin | Script::Cyrillic)
}

/// Unicode decimal digits (`Nd`) in any script
fn is_digit(c: char) -> bool {
    c.is_ascii_digit() || get_general_category(c) == GeneralCategory::DecimalNumber
}

fn is_currency(c: char) -> bool {
    get_general_category(c) == GeneralCategory::CurrencySymbol
}
