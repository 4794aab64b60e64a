//! Fixes for systematic OCR misreads in Cyrillic market text.
//!
//! Rules run in a fixed order:
//! 1. A space between a word and a digit run fused onto its end
//! 2. Whole-word fixes for specific recurring misreads
//! 3. Digits that stand in for a look-alike letter before a Cyrillic letter
//! 4. Per-line whitespace collapsing, then stray spaces inside the row's numbers
//!
//! The split comes first so word fixes anchored at a word end also apply to
//! words that had a number fused on. Digit substitutions need the raw
//! adjacency, so they come before whitespace is collapsed. The output is a
//! fixed point: correcting it again changes nothing.

use regex::{Captures, Regex};

/// Whole-word misreads seen in practice, with their replacements.
const WORD_FIXES: &[(&str, &str)] = &[
    (r"мага3им\b", "магазин"),
    (r"3олотая", "Золотая"),
    (r"8оителя", "Воителя"),
    (r"4ен\.", "Чен."),
    (r"8алница", "Балница"),
    (r"мараге", "магазин"),
];

/// Letter followed by a digit run that ends the word. A standalone `х10`
/// quantity marker matches the first branch and is kept as is.
const FUSED_NUMBER_PATTERN: &str = r"\b([xXхХ][0-9]+)\b|([а-яА-ЯёЁ])([0-9]+)\b";

/// Longest leading group of a number split by a stray space (`15 350`).
const MAX_LEADING_GROUP: usize = 3;
/// Digits in each following group.
const GROUP_LEN: usize = 3;

fn is_cyrillic_letter(c: char) -> bool {
    matches!(c, 'а'..='я' | 'А'..='Я' | 'ё' | 'Ё')
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Letter a digit is mistaken for, and whether the digit must start a word.
fn confusable_letter(c: char) -> Option<(char, bool)> {
    match c {
        '3' => Some(('З', true)),
        '8' => Some(('В', true)),
        '0' => Some(('О', false)),
        '4' => Some(('Ч', false)),
        '6' => Some(('Б', false)),
        _ => None,
    }
}

/// Replaces look-alike digits in front of Cyrillic letters.
///
/// Runs right to left so a replaced letter can make the digit before it
/// eligible too (`00ка` becomes `ООка` in one pass).
fn digits_to_letters(text: &str) -> String {
    let mut chars: Vec<char> = text.chars().collect();

    for i in (0..chars.len()).rev() {
        let Some((letter, needs_word_start)) = confusable_letter(chars[i]) else {
            continue;
        };
        let before_letter = chars.get(i + 1).is_some_and(|&next| is_cyrillic_letter(next));
        let word_start = i == 0 || !is_word_char(chars[i - 1]);

        if before_letter && (word_start || !needs_word_start) {
            chars[i] = letter;
        }
    }

    chars.into_iter().collect()
}

fn is_number(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

/// `x10` style quantity (Latin or Cyrillic x).
fn is_marked_number(token: &str) -> bool {
    let mut chars = token.chars();
    matches!(chars.next(), Some('x' | 'X' | 'х' | 'Х')) && is_number(chars.as_str())
}

/// First run of at least two adjacent numbers: the row's quantity and price.
///
/// A run may open with a marked quantity. Numbers elsewhere on the line, in
/// the item or merchant name, are not part of it.
fn number_run(tokens: &[(String, bool)]) -> Option<(usize, usize)> {
    let mut start = 0;
    while start < tokens.len() {
        let token = &tokens[start].0;
        if !is_number(token) && !is_marked_number(token) {
            start += 1;
            continue;
        }

        let end = (start + 1..tokens.len())
            .find(|&i| !is_number(&tokens[i].0))
            .unwrap_or(tokens.len());
        if end - start >= 2 {
            return Some((start, end));
        }
        start = end;
    }
    None
}

/// Rejoins numbers split by a stray space on one (already collapsed) line.
///
/// Only the quantity/price run is touched, and only when it holds more than
/// two numbers, since a row carries exactly two. The rightmost
/// `<1-3 digits> <3 digits>` pair is merged until two numbers remain or
/// nothing merges; a merged group may absorb another leading group
/// (`1 500 000`).
fn merge_split_numbers(line: &str) -> String {
    // (token, produced by a merge)
    let mut tokens: Vec<(String, bool)> =
        line.split(' ').map(|t| (t.to_string(), false)).collect();

    let Some((start, mut end)) = number_run(&tokens) else {
        return line.to_string();
    };

    while end - start > 2 {
        let mergeable = (start..end - 1).rev().find(|&i| {
            let (left, _) = &tokens[i];
            let (right, merged) = &tokens[i + 1];
            is_number(left)
                && left.len() <= MAX_LEADING_GROUP
                && (right.len() == GROUP_LEN || (*merged && right.len() % GROUP_LEN == 0))
        });

        let Some(i) = mergeable else {
            break;
        };
        let (right, _) = tokens.remove(i + 1);
        tokens[i].0.push_str(&right);
        tokens[i].1 = true;
        end -= 1;
    }

    tokens
        .into_iter()
        .map(|(t, _)| t)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Applies the correction table to raw OCR text.
#[derive(Debug, Clone)]
pub struct TextCorrector {
    word_fixes: Vec<(Regex, &'static str)>,
    fused_number: Regex,
}

impl TextCorrector {
    pub fn new() -> Result<Self, regex::Error> {
        let word_fixes = WORD_FIXES
            .iter()
            .map(|(pattern, replacement)| Ok((Regex::new(pattern)?, *replacement)))
            .collect::<Result<Vec<_>, regex::Error>>()?;

        Ok(Self {
            word_fixes,
            fused_number: Regex::new(FUSED_NUMBER_PATTERN)?,
        })
    }

    /// Corrects raw recognized text. Line breaks are kept; blank lines are dropped.
    pub fn correct(&self, raw: &str) -> String {
        let mut text = self
            .fused_number
            .replace_all(raw, |caps: &Captures| match caps.get(1) {
                Some(marker) => marker.as_str().to_string(),
                None => format!("{} {}", &caps[2], &caps[3]),
            })
            .into_owned();
        for (pattern, replacement) in &self.word_fixes {
            text = pattern.replace_all(&text, *replacement).into_owned();
        }

        let text = digits_to_letters(&text);

        text.lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|line| !line.is_empty())
            .map(|line| merge_split_numbers(&line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{ParsedRow, ParserConfig, RowParser};
    use proptest::prelude::*;

    fn corrector() -> TextCorrector {
        TextCorrector::new().unwrap()
    }

    #[test]
    fn test_golden_card_row() {
        assert_eq!(
            corrector().correct("3олотая карта Воителя 15350 325 магазин"),
            "Золотая карта Воителя 15350 325 магазин"
        );
    }

    #[test]
    fn test_digit_to_letter_substitutions() {
        assert_eq!(digits_to_letters("3емля 8ода"), "Земля Вода");
        assert_eq!(digits_to_letters("0браз 4ай 6ук"), "Образ Чай Бук");
        // Inside a word the same digits are left to the word fixes
        assert_eq!(digits_to_letters("мага3ин"), "мага3ин");
        // Digits before digits or Latin letters stay
        assert_eq!(digits_to_letters("300 4x 6"), "300 4x 6");
    }

    #[test]
    fn test_digit_to_letter_inside_word() {
        // 0, 4 and 6 are replaced anywhere, not only at a word start
        assert_eq!(digits_to_letters("м0лот"), "мОлот");
        assert_eq!(digits_to_letters("00ка"), "ООка");
    }

    #[test]
    fn test_word_fixes() {
        let c = corrector();
        assert_eq!(c.correct("Зелье мага3им"), "Зелье магазин");
        assert_eq!(c.correct("Ли 4ен. продавец"), "Ли Чен. продавец");
        assert_eq!(c.correct("Зелье 2 100 мараге"), "Зелье 2 100 магазин");
        assert_eq!(c.correct("8алница"), "Балница");
    }

    #[test]
    fn test_fused_number_is_split() {
        assert_eq!(corrector().correct("Меч5 1200 магазин"), "Меч 5 1200 магазин");
        // Digits followed by more letters are not a fused number
        assert_eq!(corrector().correct("Меч5ок"), "Меч5ок");
        // Quantity markers stay attached
        assert_eq!(
            corrector().correct("Золотая карта х3 9000 магазин"),
            "Золотая карта х3 9000 магазин"
        );
        assert_eq!(corrector().correct("Меч x10 900 лавках5"), "Меч x10 900 лавках 5");
    }

    #[test]
    fn test_word_fix_after_split_number() {
        assert_eq!(
            corrector().correct("Зелье 5 100 мага3им5"),
            "Зелье 5 100 магазин 5"
        );
    }

    #[test]
    fn test_whitespace_collapses_per_line() {
        let raw = "  Меч   1 \t 500   магазин \n\n\n Щит  2  900  лавка  ";
        assert_eq!(corrector().correct(raw), "Меч 1 500 магазин\nЩит 2 900 лавка");
    }

    #[test]
    fn test_stray_space_inside_number() {
        let c = corrector();
        assert_eq!(c.correct("Меч 5 15 350 магазин"), "Меч 5 15350 магазин");
        assert_eq!(c.correct("Меч 3 1 500 000 магазин"), "Меч 3 1500000 магазин");
        // Exactly two numbers are quantity and price, never merged
        assert_eq!(c.correct("Меч 15 350 магазин"), "Меч 15 350 магазин");
        assert_eq!(c.correct("Зелье x10 15 000 магазин"), "Зелье x10 15000 магазин");
    }

    #[test]
    fn test_numbers_in_names_are_not_merged() {
        let c = corrector();
        let parser = RowParser::new(ParserConfig::default()).unwrap();

        let raw = "Зелье лечения 5 100 Лавка 2";
        let text = c.correct(raw);
        assert_eq!(text, raw);
        assert_eq!(
            parser.parse(&text),
            vec![ParsedRow {
                item: "Зелье лечения".to_string(),
                quantity: 5,
                price: 100,
                merchant: "Лавка 2".to_string(),
            }]
        );

        // Only the quantity/price run is merged, not the merchant's number
        assert_eq!(
            c.correct("Свиток 2 уровня 3 15 350 Лавка 2 100"),
            "Свиток 2 уровня 3 15350 Лавка 2 100"
        );
    }

    #[test]
    fn test_numbers_on_separate_lines_stay_apart() {
        assert_eq!(
            corrector().correct("Меч 1 500 лавка\n200 300 Щит"),
            "Меч 1 500 лавка\n200 300 Щит"
        );
    }

    #[test]
    fn test_correct_is_idempotent() {
        let c = corrector();
        let samples = [
            "3олотая карта 8оителя 15 350 325 мараге",
            "00ка 4ен. Меч5 3 1 500 000 лавка\n\n  6ук  мага3им  ",
            "Зелье x10 150000 магазин",
            "8 3 0 4 6",
            "а3б 3 3 3 3",
            "Зелье 5 100 мага3им5",
            "03олотая х5 1 500 000",
        ];

        for raw in samples {
            let once = c.correct(raw);
            assert_eq!(c.correct(&once), once, "not a fixed point for {:?}", raw);
        }
    }

    /// `1234567` as `1 234 567`.
    fn group_thousands(n: u32) -> String {
        let digits = n.to_string();
        let first = match digits.len() % 3 {
            0 => 3,
            r => r,
        };
        let mut groups = vec![&digits[..first]];
        let mut i = first;
        while i < digits.len() {
            groups.push(&digits[i..i + 3]);
            i += 3;
        }
        groups.join(" ")
    }

    proptest! {
        #[test]
        fn prop_correct_is_a_fixed_point(raw in "[а-яА-ЯёЁ0-9xXхХ. \n]{0,48}") {
            let c = corrector();
            let once = c.correct(&raw);
            prop_assert_eq!(c.correct(&once), once);
        }

        #[test]
        fn prop_correct_keeps_rows_readable(
            item in "[А-Я][а-пс-я]{2,7}( [а-пс-я]{2,7})?",
            quantity in 1u32..10_000,
            price in 1u32..100_000_000,
            merchant in "[А-Я][а-пс-я]{2,7}( [0-9]{1,3})?",
            grouped in any::<bool>(),
        ) {
            let parser = RowParser::new(ParserConfig::default()).unwrap();
            let price_text = if grouped { group_thousands(price) } else { price.to_string() };
            let line = format!("{} {} {} {}", item, quantity, price_text, merchant);
            let clean = format!("{} {} {} {}", item, quantity, price, merchant);

            let expected = parser.parse_line(&clean);
            prop_assert!(expected.is_some());

            let corrected = parser.parse_line(&corrector().correct(&line));
            if parser.parse_line(&line).is_some() {
                prop_assert!(corrected.is_some());
            }
            prop_assert_eq!(corrected, expected);
        }
    }
}
