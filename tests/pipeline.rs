//! Dataset to ranking on temporary files

use std::path::PathBuf;

use keiba::data::{clean_file, Dataset, DatasetWriter};
use keiba::model::{ForestParams, ModelStore};
use keiba::models::{Column, HorseWeight, PredictionMode, RaceRecord};
use keiba::predictor::{Imputation, Predictor};
use keiba::scraper::write_entry_list;
use keiba::trainer::{Trainer, TrainingOptions};
use keiba::PipelineError;
use uuid::Uuid;

const JOCKEYS: [&str; 4] = ["武豊", "ルメール", "川田将雅", "横山武史"];

fn workdir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("keiba-pipeline-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn result(i: usize) -> RaceRecord {
    let finish = (i % 3) as u32 + 1;
    RaceRecord {
        race_name: format!("レース{}", i % 5),
        weather: ["晴", "曇", "雨"][i % 3].to_string(),
        round: Some((i % 12) as u32 + 1),
        field_size: Some(16),
        post_position: Some((i % 8) as u32 + 1),
        horse_number: Some((i % 16) as u32 + 1),
        odds: Some(finish as f64 * 3.0 + (i % 5) as f64 * 0.1),
        popularity: Some(finish),
        finish_position: Some(finish),
        jockey: JOCKEYS[i % 4].to_string(),
        weight_carried: Some(57.0),
        track_condition: ["良", "稍"][i % 2].to_string(),
        horse_weight: HorseWeight::Measured(470 + (i % 20) as u32),
        horse_weight_delta: Some([2, -4, 0][i % 3]),
        horse_name: None,
    }
}

fn entry(name: &str, odds: Option<f64>, popularity: u32, jockey: &str) -> RaceRecord {
    RaceRecord {
        race_name: "レース1".to_string(),
        weather: "晴".to_string(),
        round: Some(11),
        field_size: Some(3),
        post_position: Some(1),
        horse_number: Some(popularity),
        odds,
        popularity: Some(popularity),
        finish_position: None,
        jockey: jockey.to_string(),
        weight_carried: Some(57.0),
        track_condition: "良".to_string(),
        horse_weight: HorseWeight::Measured(480),
        horse_weight_delta: Some(0),
        horse_name: Some(name.to_string()),
    }
}

#[test]
fn test_scraped_results_to_ranked_entries() {
    let dir = workdir();
    let raw = dir.join("all_horses_race_data_appended.csv");
    let cleaned = dir.join("cleaned_race_data.csv");
    let store = ModelStore::new(dir.join("models"));

    // Two appended batches, each with one incomplete row
    let mut first: Vec<RaceRecord> = (0..45).map(result).collect();
    first[3].odds = None;
    let mut second: Vec<RaceRecord> = (45..90).map(result).collect();
    second[7].horse_weight = HorseWeight::Unmeasured;
    second[7].horse_weight_delta = None;

    DatasetWriter::open(&raw, &Column::RESULT_ORDER)
        .unwrap()
        .append(&first)
        .unwrap();
    let mut writer = DatasetWriter::open(&raw, &Column::RESULT_ORDER).unwrap();
    writer.append(&second).unwrap();

    let header = Column::headers(&Column::RESULT_ORDER).join(",");
    let text = std::fs::read_to_string(&raw).unwrap();
    assert_eq!(text.matches(&header).count(), 1);
    assert!(text.contains("計不"));

    let report = clean_file(&raw, &cleaned).unwrap();
    assert_eq!(report.rows_before, 90);
    assert_eq!(report.rows_removed, 2);
    assert_eq!(Dataset::read_csv(&cleaned).unwrap().len(), 88);

    let options = TrainingOptions {
        forest: ForestParams {
            n_trees: 20,
            ..ForestParams::default()
        },
        ..TrainingOptions::default()
    };
    let summary = Trainer::new(options).train_file(&cleaned, &store).unwrap();
    assert_eq!(summary.rows_used, 88);
    assert_eq!(summary.classes, vec![1, 2, 3]);
    assert!(store.model_path().exists());
    assert!(store.encoders_path().exists());

    let entries = dir.join("predict_data_レース1.csv");
    write_entry_list(
        &entries,
        &[
            entry("ロングショット", Some(9.4), 3, "武豊"),
            entry("フェイバリット", Some(3.2), 1, "見習い騎手"),
            entry("ミドル", None, 2, "ルメール"),
        ],
    )
    .unwrap();

    let predictor = Predictor::load(&store, Imputation::BatchMedian).unwrap();
    for mode in [PredictionMode::Class, PredictionMode::Expected] {
        let outcome = predictor.predict_file(&entries, mode).unwrap();

        let mut names: Vec<&str> = outcome.ranking.iter().map(|r| r.horse_name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["フェイバリット", "ミドル", "ロングショット"]);
        for pair in outcome.ranking.windows(2) {
            assert!(pair[0].value <= pair[1].value);
        }

        let jockey = outcome.encoded.iter().find(|c| c.feature == "騎手").unwrap();
        assert_eq!(jockey.unseen, 1);
        let odds = outcome.imputed.iter().find(|c| c.feature == "オッズ").unwrap();
        assert_eq!(odds.cells, 1);
        assert!((odds.value - 6.3).abs() < 1e-9);
    }

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_prediction_without_artifacts() {
    let dir = workdir();
    let err = Predictor::load(&ModelStore::new(&dir), Imputation::BatchMedian)
        .err()
        .unwrap();
    assert!(matches!(err, PipelineError::MissingArtifact(_)));
    assert!(err.to_string().contains("keiba train"));
    std::fs::remove_dir_all(&dir).ok();
}
