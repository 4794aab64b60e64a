//! Row extraction from corrected OCR text.
//!
//! Each line is tried against an ordered list of patterns; the first one
//! that yields a row within the numeric bounds wins. Lines matching nothing
//! are dropped, since most OCR noise never forms a row.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use super::ParsedRow;

/// `<item> <qty> <price> <merchant>`, merchant without digits.
const PLAIN_PATTERN: &str = r"^(.*?)\s+([0-9]+)\s+([0-9]+)\s+([^0-9]+)$";
/// Same, with an optional `x10` style marker on the quantity (Latin or Cyrillic x).
const MARKED_PATTERN: &str = r"^(.*?)\s+[xXхХ]?([0-9]+)\s+([0-9]+)\s+([^0-9]+)$";
/// Two numbers followed by any trailing text; order decided by magnitude.
const LOOSE_PATTERN: &str = r"^(.*?)\s+([0-9]+)\s+([0-9]+)\s*(.*?)$";

/// Row parser settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Lines shorter than this (in characters) are skipped
    pub min_line_len: usize,
    /// Magnitude tie-break boundary between quantities and prices
    pub small_quantity_threshold: u32,
    /// Quantities must be below this
    pub max_quantity: u32,
    /// Prices must be below this
    pub max_price: u32,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            min_line_len: 10,
            small_quantity_threshold: 1000,
            max_quantity: 10_000,
            max_price: 100_000_000,
        }
    }
}

/// How the two captured numbers map onto quantity and price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumberOrder {
    /// First is quantity, second is price
    Textual,
    /// Below/above the small-quantity threshold decides; textual otherwise
    Magnitude,
}

/// Picks (quantity, price) from two numbers in textual order.
///
/// When exactly one number is below `threshold` and the other above it, the
/// smaller one is the quantity. Otherwise the first number is the quantity.
pub fn assign_quantity_price(first: u32, second: u32, threshold: u32) -> (u32, u32) {
    if second < threshold && first > threshold {
        (second, first)
    } else {
        (first, second)
    }
}

/// One structural pattern: item, two numbers, merchant.
#[derive(Debug, Clone)]
struct LinePattern {
    name: &'static str,
    regex: Regex,
    order: NumberOrder,
}

impl LinePattern {
    fn new(name: &'static str, pattern: &str, order: NumberOrder) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            regex: Regex::new(pattern)?,
            order,
        })
    }

    fn extract(&self, line: &str, config: &ParserConfig) -> Option<ParsedRow> {
        let caps: Captures = self.regex.captures(line)?;
        let first: u32 = caps.get(2)?.as_str().parse().ok()?;
        let second: u32 = caps.get(3)?.as_str().parse().ok()?;

        let (quantity, price) = match self.order {
            NumberOrder::Textual => (first, second),
            NumberOrder::Magnitude => {
                assign_quantity_price(first, second, config.small_quantity_threshold)
            }
        };

        let in_bounds = quantity > 0
            && quantity < config.max_quantity
            && price > 0
            && price < config.max_price;
        if !in_bounds {
            return None;
        }

        let item = caps.get(1)?.as_str().trim();
        let merchant = caps.get(4)?.as_str().trim();
        if item.is_empty() || merchant.is_empty() {
            return None;
        }

        Some(ParsedRow {
            item: item.to_string(),
            quantity,
            price,
            merchant: merchant.to_string(),
        })
    }
}

/// Extracts market rows from corrected text.
#[derive(Debug, Clone)]
pub struct RowParser {
    patterns: Vec<LinePattern>,
    config: ParserConfig,
}

impl RowParser {
    pub fn new(config: ParserConfig) -> Result<Self, regex::Error> {
        // Priority order
        let patterns = vec![
            LinePattern::new("plain", PLAIN_PATTERN, NumberOrder::Textual)?,
            LinePattern::new("marked", MARKED_PATTERN, NumberOrder::Textual)?,
            LinePattern::new("loose", LOOSE_PATTERN, NumberOrder::Magnitude)?,
        ];
        Ok(Self { patterns, config })
    }

    /// Parses every line; rejected lines are skipped.
    pub fn parse(&self, text: &str) -> Vec<ParsedRow> {
        text.lines().filter_map(|line| self.parse_line(line)).collect()
    }

    /// Tries each pattern in priority order on one line.
    pub fn parse_line(&self, line: &str) -> Option<ParsedRow> {
        let line = line.trim();
        if line.chars().count() < self.config.min_line_len {
            return None;
        }

        let row = self.patterns.iter().find_map(|pattern| {
            let row = pattern.extract(line, &self.config)?;
            log::trace!("Line matched {} pattern: {}", pattern.name, line);
            Some(row)
        });

        if row.is_none() {
            log::trace!("Line rejected: {}", line);
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> RowParser {
        RowParser::new(ParserConfig::default()).unwrap()
    }

    fn row(item: &str, quantity: u32, price: u32, merchant: &str) -> ParsedRow {
        ParsedRow {
            item: item.to_string(),
            quantity,
            price,
            merchant: merchant.to_string(),
        }
    }

    #[test]
    fn test_plain_row() {
        assert_eq!(
            parser().parse_line("Зелье лечения 5 1200 Лавка Чен."),
            Some(row("Зелье лечения", 5, 1200, "Лавка Чен."))
        );
    }

    #[test]
    fn test_marked_quantity() {
        assert_eq!(
            parser().parse_line("Золотая карта Воителя x10 150000 магазин"),
            Some(row("Золотая карта Воителя", 10, 150000, "магазин"))
        );
        // Cyrillic х
        assert_eq!(
            parser().parse_line("Золотая карта х3 9000 магазин"),
            Some(row("Золотая карта", 3, 9000, "магазин"))
        );
    }

    #[test]
    fn test_plain_pattern_wins_over_loose() {
        // Loose alone would swap the numbers (1500 > 1000 > 20)
        let line = "Кольцо силы 1500 20 магазин";
        let p = parser();

        let loose = p.patterns[2].extract(line, &p.config).unwrap();
        assert_eq!((loose.quantity, loose.price), (20, 1500));

        assert_eq!(p.parse_line(line), Some(row("Кольцо силы", 1500, 20, "магазин")));
    }

    #[test]
    fn test_quantity_over_bound_falls_through_to_loose() {
        let parsed = parser().parse_line("Золотая карта Воителя 15350 325 магазин");
        assert_eq!(parsed, Some(row("Золотая карта Воителя", 325, 15350, "магазин")));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        assert_eq!(parser().parse_line("Зелье лечения 0 500 магазин"), None);
    }

    #[test]
    fn test_price_at_bound_rejected() {
        assert_eq!(parser().parse_line("Зелье лечения 5 100000000 магазин"), None);
        assert!(parser().parse_line("Зелье лечения 5 99999999 магазин").is_some());
    }

    #[test]
    fn test_unparsable_number_rejected() {
        // Larger than u32
        assert_eq!(parser().parse_line("Зелье 5 99999999999999 магазин"), None);
    }

    #[test]
    fn test_loose_pattern_merchant_with_digits() {
        assert_eq!(
            parser().parse_line("Свиток огня 2500 7 Лавка 12"),
            Some(row("Свиток огня", 7, 2500, "Лавка 12"))
        );
    }

    #[test]
    fn test_missing_merchant_rejected() {
        assert_eq!(parser().parse_line("Свиток огня 7 2500"), None);
    }

    #[test]
    fn test_short_and_noise_lines_dropped() {
        let p = parser();
        assert_eq!(p.parse_line("Меч 1 5 а"), None);
        assert_eq!(p.parse_line("ТОВАР КОЛ-ВО ЦЕНА ПРОДАВЕЦ"), None);
        assert_eq!(p.parse_line(""), None);
    }

    #[test]
    fn test_min_length_counts_characters() {
        // 10 characters, 15 bytes
        let p = parser();
        assert!(p.parse_line("Жш 1 5 лав").is_some());
    }

    #[test]
    fn test_parse_multiple_lines() {
        let text = "ТОВАР КОЛ-ВО ЦЕНА\nЗелье лечения 5 1200 Лавка\nмусор\nЩит 2 900 магазин";
        let rows = parser().parse(text);
        assert_eq!(
            rows,
            vec![row("Зелье лечения", 5, 1200, "Лавка"), row("Щит", 2, 900, "магазин")]
        );
    }

    #[test]
    fn test_assign_quantity_price() {
        assert_eq!(assign_quantity_price(15350, 325, 1000), (325, 15350));
        assert_eq!(assign_quantity_price(325, 15350, 1000), (325, 15350));
        // Both below or both above: textual order
        assert_eq!(assign_quantity_price(500, 20, 1000), (500, 20));
        assert_eq!(assign_quantity_price(5000, 2000, 1000), (5000, 2000));
        // Exactly at the threshold counts as neither side
        assert_eq!(assign_quantity_price(1000, 5, 1000), (1000, 5));
    }
}
