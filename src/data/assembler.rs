//! Record assembler
//!
//! Combines the cell texts extracted from one table row with the race-level
//! context into a [`RaceRecord`]. Race-level fields are read from the row when
//! the layout provides them (result pages) and from the context otherwise
//! (entry lists).

use std::collections::HashMap;
use tracing::debug;

use crate::data::normalize::{coerce_f64, coerce_u32, normalize_text, FieldNormalizer};
use crate::models::{Field, RaceContext, RaceRecord, RowOutcome, SkipReason};

/// Cell texts of one source row, keyed by field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    cells: HashMap<Field, String>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: Field, text: impl Into<String>) {
        self.cells.insert(field, text.into());
    }

    pub fn with(mut self, field: Field, text: impl Into<String>) -> Self {
        self.insert(field, text);
        self
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.cells.get(&field).map(String::as_str)
    }
}

/// Records assembled from one page, plus why the other rows were skipped
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembledPage {
    pub records: Vec<RaceRecord>,
    pub skipped: Vec<SkipReason>,
}

impl AssembledPage {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

#[derive(Default)]
pub struct RecordAssembler {
    normalizer: FieldNormalizer,
}

impl RecordAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalizer(&self) -> &FieldNormalizer {
        &self.normalizer
    }

    /// Build one record, or say why the row yields none
    pub fn assemble(&self, raw: &RawRow, context: Option<&RaceContext>) -> RowOutcome {
        match self.try_assemble(raw, context) {
            Ok(record) => RowOutcome::Record(Box::new(record)),
            Err(reason) => RowOutcome::Skipped(reason),
        }
    }

    /// Assemble every extracted row of a page
    pub fn assemble_page<I>(&self, rows: I, context: Option<&RaceContext>) -> AssembledPage
    where
        I: IntoIterator<Item = std::result::Result<RawRow, SkipReason>>,
    {
        let mut page = AssembledPage::default();
        for row in rows {
            let outcome = match row {
                Ok(raw) => self.assemble(&raw, context),
                Err(reason) => RowOutcome::Skipped(reason),
            };
            match outcome {
                RowOutcome::Record(record) => page.records.push(*record),
                RowOutcome::Skipped(reason) => {
                    debug!("Skipped row: {}", reason);
                    page.skipped.push(reason);
                }
            }
        }
        page
    }

    fn try_assemble(
        &self,
        raw: &RawRow,
        context: Option<&RaceContext>,
    ) -> std::result::Result<RaceRecord, SkipReason> {
        let race_name = race_text(raw, Field::RaceName, context.map(|c| c.race_name.as_str()))?;
        let weather = race_text(raw, Field::Weather, context.map(|c| c.weather.as_str()))?;
        let track_condition = race_text(
            raw,
            Field::TrackCondition,
            context.map(|c| c.track_condition.as_str()),
        )?;

        let round = match raw.get(Field::Round) {
            Some(text) => self.normalizer.parse_round(text),
            None => context
                .ok_or(SkipReason::MissingContext(Field::Round))?
                .round,
        };
        let field_size = match raw.get(Field::FieldSize) {
            Some(text) => coerce_u32(text),
            None => context
                .ok_or(SkipReason::MissingContext(Field::FieldSize))?
                .field_size,
        };

        let weight = self
            .normalizer
            .parse_horse_weight(raw.get(Field::HorseWeight).unwrap_or(""));

        Ok(RaceRecord {
            race_name,
            weather,
            round,
            field_size,
            post_position: raw.get(Field::PostPosition).and_then(coerce_u32),
            horse_number: raw.get(Field::HorseNumber).and_then(coerce_u32),
            odds: raw.get(Field::Odds).and_then(coerce_f64),
            popularity: raw.get(Field::Popularity).and_then(coerce_u32),
            finish_position: raw.get(Field::FinishPosition).and_then(coerce_u32),
            jockey: raw.get(Field::Jockey).map(normalize_text).unwrap_or_default(),
            weight_carried: raw.get(Field::WeightCarried).and_then(coerce_f64),
            track_condition,
            horse_weight: weight.weight,
            horse_weight_delta: weight.delta,
            horse_name: raw
                .get(Field::HorseName)
                .map(normalize_text)
                .filter(|name| !name.is_empty()),
        })
    }
}

fn race_text(
    raw: &RawRow,
    field: Field,
    context: Option<&str>,
) -> std::result::Result<String, SkipReason> {
    raw.get(field)
        .or(context)
        .map(normalize_text)
        .ok_or(SkipReason::MissingContext(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HorseWeight;

    fn result_row() -> RawRow {
        RawRow::new()
            .with(Field::Weather, "晴")
            .with(Field::Round, "11R")
            .with(Field::RaceName, "天皇賞(秋)(G1)")
            .with(Field::FieldSize, "15")
            .with(Field::PostPosition, "4")
            .with(Field::HorseNumber, "7")
            .with(Field::Odds, "3.2")
            .with(Field::Popularity, "1")
            .with(Field::FinishPosition, "2")
            .with(Field::Jockey, " ルメール ")
            .with(Field::WeightCarried, "58")
            .with(Field::TrackCondition, "良")
            .with(Field::HorseWeight, "496(+6)")
    }

    fn context() -> RaceContext {
        RaceContext {
            race_name: "ジャパンC".to_string(),
            weather: "曇".to_string(),
            round: Some(12),
            field_size: Some(18),
            track_condition: "稍".to_string(),
        }
    }

    #[test]
    fn test_result_row_without_context() {
        let assembler = RecordAssembler::new();
        let record = match assembler.assemble(&result_row(), None) {
            RowOutcome::Record(r) => r,
            other => panic!("expected record, got {:?}", other),
        };

        assert_eq!(record.round, Some(11));
        assert_eq!(record.field_size, Some(15));
        assert_eq!(record.finish_position, Some(2));
        assert_eq!(record.jockey, "ルメール");
        assert_eq!(record.horse_weight, HorseWeight::Measured(496));
        assert_eq!(record.horse_weight_delta, Some(6));
        assert_eq!(record.horse_name, None);
    }

    #[test]
    fn test_entry_row_takes_race_fields_from_context() {
        let raw = RawRow::new()
            .with(Field::PostPosition, "1")
            .with(Field::HorseNumber, "1")
            .with(Field::HorseName, "イクイノックス")
            .with(Field::WeightCarried, "58.0")
            .with(Field::Jockey, "ルメール")
            .with(Field::HorseWeight, "計不")
            .with(Field::Odds, "1.3")
            .with(Field::Popularity, "1");

        let assembler = RecordAssembler::new();
        let record = match assembler.assemble(&raw, Some(&context())) {
            RowOutcome::Record(r) => r,
            other => panic!("expected record, got {:?}", other),
        };

        assert_eq!(record.race_name, "ジャパンC");
        assert_eq!(record.round, Some(12));
        assert_eq!(record.field_size, Some(18));
        assert_eq!(record.finish_position, None);
        assert_eq!(record.horse_name.as_deref(), Some("イクイノックス"));
        assert_eq!(record.horse_weight, HorseWeight::Unmeasured);
        assert_eq!(record.horse_weight_delta, None);
    }

    #[test]
    fn test_row_fields_win_over_context() {
        let assembler = RecordAssembler::new();
        match assembler.assemble(&result_row(), Some(&context())) {
            RowOutcome::Record(r) => {
                assert_eq!(r.race_name, "天皇賞(秋)(G1)");
                assert_eq!(r.round, Some(11));
            }
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_race_field_without_context_skips() {
        let raw = RawRow::new().with(Field::Jockey, "武豊");
        let assembler = RecordAssembler::new();
        assert_eq!(
            assembler.assemble(&raw, None),
            RowOutcome::Skipped(SkipReason::MissingContext(Field::RaceName))
        );
    }

    #[test]
    fn test_uncoercible_values_become_none() {
        let raw = result_row()
            .with(Field::FinishPosition, "中")
            .with(Field::Odds, "---.-");
        let assembler = RecordAssembler::new();
        match assembler.assemble(&raw, None) {
            RowOutcome::Record(r) => {
                assert_eq!(r.finish_position, None);
                assert_eq!(r.odds, None);
            }
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[test]
    fn test_assemble_page_counts_skips() {
        let rows = vec![
            Ok(result_row()),
            Err(SkipReason::NoCells),
            Ok(RawRow::new()),
            Ok(result_row().with(Field::Jockey, "武豊")),
        ];
        let page = RecordAssembler::new().assemble_page(rows, None);
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.skipped_count(), 2);
        assert_eq!(page.records[1].jockey, "武豊");
    }
}
