//! Declarative table layouts
//!
//! Each source table is described as a list of (field, column, target)
//! entries. When netkeiba changes a page, only the layout changes; the
//! extraction code stays the same. Layouts can be overridden from
//! `keiba.toml`:
//!
//! ```toml
//! [scrape.layouts.horse_results]
//! table = "table.db_h_race_results"
//! row = "tr"
//! fields = [
//!     { field = "weather", column = 2 },
//!     { field = "race_name", column = 4, target = "link_text" },
//! ]
//! ```

use serde::{Deserialize, Serialize};

use crate::models::Field;

/// What to read from the located cell
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellTarget {
    /// Whole cell text
    #[default]
    Text,
    /// Text of the first link in the cell
    LinkText,
    /// `href` of the first link in the cell
    Href,
    /// Text of the first element carrying this class
    ClassText(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLocator {
    pub field: Field,
    /// Zero-based `td` index within the row
    pub column: usize,
    #[serde(default)]
    pub target: CellTarget,
}

impl FieldLocator {
    pub fn text(field: Field, column: usize) -> Self {
        Self {
            field,
            column,
            target: CellTarget::Text,
        }
    }

    pub fn link_text(field: Field, column: usize) -> Self {
        Self {
            field,
            column,
            target: CellTarget::LinkText,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableLayout {
    /// CSS selector of the table
    pub table: String,
    /// CSS selector of rows within the table
    #[serde(default = "default_row_selector")]
    pub row: String,
    pub fields: Vec<FieldLocator>,
}

fn default_row_selector() -> String {
    "tr".to_string()
}

impl TableLayout {
    /// Past-performance table on a horse page (`db_h_race_results`)
    pub fn horse_results() -> Self {
        Self {
            table: "table.db_h_race_results".to_string(),
            row: default_row_selector(),
            fields: vec![
                FieldLocator::text(Field::Weather, 2),
                FieldLocator::text(Field::Round, 3),
                FieldLocator::link_text(Field::RaceName, 4),
                FieldLocator::text(Field::FieldSize, 6),
                FieldLocator::text(Field::PostPosition, 7),
                FieldLocator::text(Field::HorseNumber, 8),
                FieldLocator::text(Field::Odds, 9),
                FieldLocator::text(Field::Popularity, 10),
                FieldLocator::text(Field::FinishPosition, 11),
                FieldLocator::link_text(Field::Jockey, 12),
                FieldLocator::text(Field::WeightCarried, 13),
                FieldLocator::text(Field::TrackCondition, 15),
                FieldLocator::text(Field::HorseWeight, 23),
            ],
        }
    }

    /// Entry table on a race card page (`RaceTable01`)
    pub fn race_card() -> Self {
        Self {
            table: "table.RaceTable01".to_string(),
            row: default_row_selector(),
            fields: vec![
                FieldLocator::text(Field::PostPosition, 0),
                FieldLocator::text(Field::HorseNumber, 1),
                FieldLocator {
                    field: Field::HorseName,
                    column: 3,
                    target: CellTarget::ClassText("HorseName".to_string()),
                },
                FieldLocator::text(Field::WeightCarried, 5),
                FieldLocator::link_text(Field::Jockey, 6),
                FieldLocator::text(Field::HorseWeight, 8),
                FieldLocator::text(Field::Odds, 9),
                FieldLocator::text(Field::Popularity, 10),
            ],
        }
    }

    /// Search result list of horses
    pub fn horse_list() -> Self {
        Self {
            table: "#result_form table".to_string(),
            row: default_row_selector(),
            fields: vec![FieldLocator {
                field: Field::HorseLink,
                column: 1,
                target: CellTarget::Href,
            }],
        }
    }

    pub fn locator(&self, field: Field) -> Option<&FieldLocator> {
        self.fields.iter().find(|l| l.field == field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_layout_columns() {
        let layout = TableLayout::horse_results();
        assert_eq!(layout.locator(Field::HorseWeight).unwrap().column, 23);
        assert_eq!(
            layout.locator(Field::Jockey).unwrap().target,
            CellTarget::LinkText
        );
        assert!(layout.locator(Field::HorseName).is_none());
    }

    #[test]
    fn test_layout_from_toml() {
        let layout: TableLayout = toml::from_str(
            r#"
            table = "table.RaceTable01"
            fields = [
                { field = "horse_number", column = 2 },
                { field = "horse_name", column = 4, target = { class_text = "HorseName" } },
                { field = "jockey", column = 7, target = "link_text" },
            ]
            "#,
        )
        .unwrap();

        assert_eq!(layout.row, "tr");
        assert_eq!(layout.fields[0], FieldLocator::text(Field::HorseNumber, 2));
        assert_eq!(
            layout.locator(Field::HorseName).unwrap().target,
            CellTarget::ClassText("HorseName".to_string())
        );
        assert_eq!(layout.locator(Field::Jockey).unwrap().column, 7);
    }
}
