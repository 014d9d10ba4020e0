//! Field normalizer for raw table cell text
//!
//! Turns the mixed-format text found in result pages and race cards into
//! typed values. Both page layouts go through the same functions, so the
//! weight and round conventions are handled in exactly one place.
//!
//! # Example
//!
//! ```
//! use keiba::data::normalize::FieldNormalizer;
//! use keiba::models::HorseWeight;
//!
//! let normalizer = FieldNormalizer::new();
//! let reading = normalizer.parse_horse_weight("486(-4)");
//! assert_eq!(reading.weight, HorseWeight::Measured(486));
//! assert_eq!(reading.delta, Some(-4));
//! assert_eq!(normalizer.parse_round("11R"), Some(11));
//! ```

use regex::Regex;

use crate::models::{Column, HorseWeight};

/// Horse weight and its change since the previous race, parsed together
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightReading {
    pub weight: HorseWeight,
    /// `None` whenever `weight` is unmeasured
    pub delta: Option<i32>,
}

/// Parser for weight, round and numeric cells
pub struct FieldNormalizer {
    weight_with_delta: Regex,
    bare_weight: Regex,
    round_pattern: Regex,
}

impl Default for FieldNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldNormalizer {
    pub fn new() -> Self {
        Self {
            weight_with_delta: Regex::new(r"^(\d+)\s*\(\s*([+-]?\d+)\s*\)$").unwrap(),
            bare_weight: Regex::new(r"^\d+$").unwrap(),
            round_pattern: Regex::new(r"^(\d+)\s*R?$").unwrap(),
        }
    }

    /// Split a `"486(-4)"` / `"486"` / `"計不"` cell into weight and delta
    pub fn parse_horse_weight(&self, raw: &str) -> WeightReading {
        let text = normalize_text(raw);

        if let Some(caps) = self.weight_with_delta.captures(&text) {
            if let (Ok(weight), Ok(delta)) = (caps[1].parse::<u32>(), caps[2].parse::<i32>()) {
                return WeightReading {
                    weight: HorseWeight::Measured(weight),
                    delta: Some(delta),
                };
            }
        }

        if self.bare_weight.is_match(&text) {
            if let Ok(weight) = text.parse::<u32>() {
                return WeightReading {
                    weight: HorseWeight::Measured(weight),
                    delta: Some(0),
                };
            }
        }

        WeightReading {
            weight: HorseWeight::Unmeasured,
            delta: None,
        }
    }

    /// Race number from `"11R"` (result pages) or `"11"` (entry lists)
    pub fn parse_round(&self, raw: &str) -> Option<u32> {
        let text = normalize_text(raw);
        let caps = self.round_pattern.captures(&text)?;
        caps[1].parse().ok()
    }

    /// Numeric value of a dataset cell, using the column's own convention
    pub fn coerce_cell(&self, column: Option<Column>, raw: &str) -> Option<f64> {
        match column {
            Some(Column::Round) => self.parse_round(raw).map(f64::from),
            _ => coerce_f64(raw),
        }
    }
}

/// Trim, drop a leading BOM and convert fullwidth digits and signs
pub fn normalize_text(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('\u{feff}')
        .chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
            'Ｒ' => 'R',
            '＋' => '+',
            '－' | '−' => '-',
            '（' => '(',
            '）' => ')',
            '．' => '.',
            _ => c,
        })
        .collect()
}

/// Parse a decimal, rejecting NaN and infinities
pub fn coerce_f64(raw: &str) -> Option<f64> {
    let text = normalize_text(raw);
    if text.is_empty() {
        return None;
    }
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a non-negative whole number (accepts `"3"` and `"3.0"`)
pub fn coerce_u32(raw: &str) -> Option<u32> {
    let value = coerce_f64(raw)?;
    if value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
        return None;
    }
    Some(value as u32)
}
