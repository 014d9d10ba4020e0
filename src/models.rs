use serde::{Deserialize, Serialize};
use std::fmt;

/// Cell text written for a horse weight that was not measured
pub const UNMEASURED_LABEL: &str = "計不";

/// Dataset column vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Column {
    RaceName,
    Weather,
    Round,
    FieldSize,
    PostPosition,
    HorseNumber,
    Odds,
    Popularity,
    FinishPosition,
    Jockey,
    WeightCarried,
    TrackCondition,
    HorseWeight,
    HorseWeightDelta,
    HorseName,
}

/// How a column is treated by the trainer and predictor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Categorical,
    Numeric,
    Label,
    Identifier,
}

impl Column {
    /// Column order of the historical result dataset
    pub const RESULT_ORDER: [Column; 14] = [
        Column::RaceName,
        Column::Weather,
        Column::Round,
        Column::FieldSize,
        Column::PostPosition,
        Column::HorseNumber,
        Column::Odds,
        Column::Popularity,
        Column::FinishPosition,
        Column::Jockey,
        Column::WeightCarried,
        Column::TrackCondition,
        Column::HorseWeight,
        Column::HorseWeightDelta,
    ];

    /// Column order of an entry-list (出馬表) file
    pub const ENTRY_ORDER: [Column; 14] = [
        Column::RaceName,
        Column::Weather,
        Column::Round,
        Column::FieldSize,
        Column::TrackCondition,
        Column::HorseName,
        Column::PostPosition,
        Column::HorseNumber,
        Column::Odds,
        Column::Popularity,
        Column::Jockey,
        Column::WeightCarried,
        Column::HorseWeight,
        Column::HorseWeightDelta,
    ];

    /// CSV header text
    pub fn header(self) -> &'static str {
        match self {
            Column::RaceName => "レース名",
            Column::Weather => "天気",
            Column::Round => "R",
            Column::FieldSize => "頭数",
            Column::PostPosition => "枠番",
            Column::HorseNumber => "馬番",
            Column::Odds => "オッズ",
            Column::Popularity => "人気",
            Column::FinishPosition => "着順",
            Column::Jockey => "騎手",
            Column::WeightCarried => "斤量",
            Column::TrackCondition => "馬場",
            Column::HorseWeight => "馬体重",
            Column::HorseWeightDelta => "馬体重の増減",
            Column::HorseName => "馬名",
        }
    }

    pub fn from_header(header: &str) -> Option<Column> {
        let header = header.trim_start_matches('\u{feff}').trim();
        Column::RESULT_ORDER
            .iter()
            .chain(std::iter::once(&Column::HorseName))
            .copied()
            .find(|c| c.header() == header)
    }

    pub fn kind(self) -> ColumnKind {
        match self {
            Column::RaceName | Column::Weather | Column::Jockey | Column::TrackCondition => {
                ColumnKind::Categorical
            }
            Column::FinishPosition => ColumnKind::Label,
            Column::HorseName => ColumnKind::Identifier,
            _ => ColumnKind::Numeric,
        }
    }

    /// Headers for a column order
    pub fn headers(order: &[Column]) -> Vec<String> {
        order.iter().map(|c| c.header().to_string()).collect()
    }
}

/// Source-page fields that a table layout can locate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    RaceName,
    Weather,
    Round,
    FieldSize,
    PostPosition,
    HorseNumber,
    Odds,
    Popularity,
    FinishPosition,
    Jockey,
    WeightCarried,
    TrackCondition,
    /// Combined "weight(delta)" text
    HorseWeight,
    HorseName,
    HorseLink,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::RaceName => "race_name",
            Field::Weather => "weather",
            Field::Round => "round",
            Field::FieldSize => "field_size",
            Field::PostPosition => "post_position",
            Field::HorseNumber => "horse_number",
            Field::Odds => "odds",
            Field::Popularity => "popularity",
            Field::FinishPosition => "finish_position",
            Field::Jockey => "jockey",
            Field::WeightCarried => "weight_carried",
            Field::TrackCondition => "track_condition",
            Field::HorseWeight => "horse_weight",
            Field::HorseName => "horse_name",
            Field::HorseLink => "horse_link",
        };
        f.write_str(name)
    }
}

/// Horse body weight as reported on the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HorseWeight {
    Measured(u32),
    /// Placeholder such as "計不" or "--"
    Unmeasured,
}

impl HorseWeight {
    pub fn value(&self) -> Option<u32> {
        match self {
            HorseWeight::Measured(w) => Some(*w),
            HorseWeight::Unmeasured => None,
        }
    }
}

impl fmt::Display for HorseWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HorseWeight::Measured(w) => write!(f, "{}", w),
            HorseWeight::Unmeasured => f.write_str(UNMEASURED_LABEL),
        }
    }
}

/// Fields shared by every horse running in the same race
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RaceContext {
    pub race_name: String,
    pub weather: String,
    pub round: Option<u32>,
    pub field_size: Option<u32>,
    pub track_condition: String,
}

/// One horse's result (or entry) in one race
///
/// Numeric fields are `None` when the source text could not be coerced; such
/// records still reach the dataset and are removed by the cleaner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceRecord {
    pub race_name: String,
    pub weather: String,
    pub round: Option<u32>,
    pub field_size: Option<u32>,
    pub post_position: Option<u32>,
    pub horse_number: Option<u32>,
    pub odds: Option<f64>,
    pub popularity: Option<u32>,
    /// Absent for entry-list records
    pub finish_position: Option<u32>,
    pub jockey: String,
    pub weight_carried: Option<f64>,
    pub track_condition: String,
    pub horse_weight: HorseWeight,
    pub horse_weight_delta: Option<i32>,
    /// Present only for entry-list records
    pub horse_name: Option<String>,
}

impl RaceRecord {
    /// Text written to the dataset cell for `column`
    pub fn cell(&self, column: Column) -> String {
        fn opt<T: fmt::Display>(v: &Option<T>) -> String {
            v.as_ref().map(|x| x.to_string()).unwrap_or_default()
        }

        match column {
            Column::RaceName => self.race_name.clone(),
            Column::Weather => self.weather.clone(),
            Column::Round => opt(&self.round),
            Column::FieldSize => opt(&self.field_size),
            Column::PostPosition => opt(&self.post_position),
            Column::HorseNumber => opt(&self.horse_number),
            Column::Odds => opt(&self.odds),
            Column::Popularity => opt(&self.popularity),
            Column::FinishPosition => opt(&self.finish_position),
            Column::Jockey => self.jockey.clone(),
            Column::WeightCarried => opt(&self.weight_carried),
            Column::TrackCondition => self.track_condition.clone(),
            Column::HorseWeight => self.horse_weight.to_string(),
            Column::HorseWeightDelta => opt(&self.horse_weight_delta),
            Column::HorseName => opt(&self.horse_name),
        }
    }

    /// Row cells in the given column order
    pub fn to_row(&self, order: &[Column]) -> Vec<String> {
        order.iter().map(|&c| self.cell(c)).collect()
    }
}

/// Why a source row produced no record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Row has no `td` cells (header or spacer rows)
    NoCells,
    /// The located cell or element is absent from the row
    MissingCell { field: Field, column: usize },
    /// Race-level field found neither in the row nor in the shared context
    MissingContext(Field),
    /// Link that cannot be resolved to an absolute URL
    InvalidLink(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoCells => f.write_str("row has no cells"),
            SkipReason::MissingCell { field, column } => {
                write!(f, "{} not found in column {}", field, column)
            }
            SkipReason::MissingContext(field) => write!(f, "{} missing from race context", field),
            SkipReason::InvalidLink(href) => write!(f, "cannot resolve link {:?}", href),
        }
    }
}

/// Per-row extraction result
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Record(Box<RaceRecord>),
    Skipped(SkipReason),
}

/// Prediction output style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionMode {
    /// Most probable finishing position
    #[default]
    Class,
    /// Probability-weighted finishing position
    Expected,
}

/// One line of the final ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPrediction {
    pub horse_name: String,
    pub value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> RaceRecord {
        RaceRecord {
            race_name: "有馬記念(G1)".to_string(),
            weather: "晴".to_string(),
            round: Some(11),
            field_size: Some(16),
            post_position: Some(1),
            horse_number: Some(2),
            odds: Some(4.5),
            popularity: Some(1),
            finish_position: Some(1),
            jockey: "武豊".to_string(),
            weight_carried: Some(57.0),
            track_condition: "良".to_string(),
            horse_weight: HorseWeight::Measured(540),
            horse_weight_delta: Some(-4),
            horse_name: None,
        }
    }

    #[test]
    fn test_result_row_cells() {
        let row = sample_record().to_row(&Column::RESULT_ORDER);
        assert_eq!(
            row,
            vec![
                "有馬記念(G1)", "晴", "11", "16", "1", "2", "4.5", "1", "1", "武豊", "57", "良",
                "540", "-4"
            ]
        );
    }

    #[test]
    fn test_unmeasured_cells() {
        let mut record = sample_record();
        record.horse_weight = HorseWeight::Unmeasured;
        record.horse_weight_delta = None;
        assert_eq!(record.cell(Column::HorseWeight), "計不");
        assert_eq!(record.cell(Column::HorseWeightDelta), "");
    }

    #[test]
    fn test_column_from_header() {
        assert_eq!(Column::from_header("\u{feff}レース名"), Some(Column::RaceName));
        assert_eq!(Column::from_header("馬名"), Some(Column::HorseName));
        assert_eq!(Column::from_header("距離"), None);
    }

    #[test]
    fn test_column_kinds() {
        assert_eq!(Column::Jockey.kind(), ColumnKind::Categorical);
        assert_eq!(Column::FinishPosition.kind(), ColumnKind::Label);
        assert_eq!(Column::HorseName.kind(), ColumnKind::Identifier);
        assert_eq!(Column::HorseWeightDelta.kind(), ColumnKind::Numeric);
    }

    #[test]
    fn test_orders_share_vocabulary() {
        let mut result: Vec<_> = Column::RESULT_ORDER
            .iter()
            .filter(|c| **c != Column::FinishPosition)
            .collect();
        let mut entry: Vec<_> = Column::ENTRY_ORDER
            .iter()
            .filter(|c| **c != Column::HorseName)
            .collect();
        result.sort();
        entry.sort();
        assert_eq!(result, entry);
    }
}
