//! Integration tests for training, persistence and the shell
//!
//! Uses the reference fixture under `tests/data`.

use anyhow::Result;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::{tempdir, NamedTempFile};

use taxifare_core::metrics::evaluate;
use taxifare_core::{persist, ReducedRecord, Target};
use taxifare_trainer::shell::{sample_trip, train_and_save, SAMPLE_ACTUAL_FARE};
use taxifare_trainer::{
    evaluate_dataset, load_trip_records, train_for_target, AppConfig, DatasetError, GbdtConfig,
    LcgRng, Shell, TrainerError,
};

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/taxi-fare-fixture.csv")
}

fn gbdt_config() -> GbdtConfig {
    GbdtConfig {
        min_samples_leaf: 2,
        ..GbdtConfig::default()
    }
}

const HEADER: &str =
    "vendor_id,rate_code,passenger_count,trip_time_in_secs,trip_distance,payment_type,fare_amount";

#[test]
fn test_golden_sample_prediction() -> Result<()> {
    let model = train_for_target(Target::Fare, &fixture(), &gbdt_config())?;
    let prediction = model.predict(&sample_trip())?;

    assert_eq!(prediction.target, Target::Fare);
    assert!(
        (prediction.value - SAMPLE_ACTUAL_FARE).abs() <= 1.0,
        "predicted {}",
        prediction.value
    );
    // Integer training reproduces this value to the last fixed-point unit
    assert!(
        (prediction.value - 15.500114).abs() < 1e-6,
        "predicted {}",
        prediction.value
    );
    Ok(())
}

#[test]
fn test_save_load_round_trip() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("model_taxi_fare.bin");
    let fitted = train_for_target(Target::Fare, &fixture(), &gbdt_config())?;

    persist::save(&fitted, &path)?;
    let loaded = persist::load(&path)?;
    assert_eq!(loaded, fitted);

    let records = load_trip_records(&fixture())?;
    let sample = sample_trip();
    for record in records.iter().take(25).chain([&sample]) {
        assert_eq!(loaded.predict(record)?, fitted.predict(record)?);
    }
    assert_eq!(evaluate(&loaded, &records)?, evaluate(&fitted, &records)?);
    Ok(())
}

#[test]
fn test_training_is_deterministic() -> Result<()> {
    let config = GbdtConfig {
        subsample: 800_000,
        seed: 42,
        ..gbdt_config()
    };
    let first = train_for_target(Target::Fare, &fixture(), &config)?;
    let second = train_for_target(Target::Fare, &fixture(), &config)?;

    assert_eq!(first, second);
    assert_eq!(first.hash_hex()?, second.hash_hex()?);
    assert_eq!(
        first.metadata().training_data_hash,
        second.metadata().training_data_hash
    );
    assert_eq!(
        evaluate_dataset(&first, &fixture())?,
        evaluate_dataset(&second, &fixture())?
    );
    Ok(())
}

#[test]
fn test_fits_own_data_better_than_random_data() -> Result<()> {
    let model = train_for_target(Target::Fare, &fixture(), &gbdt_config())?;
    let own = evaluate_dataset(&model, &fixture())?;

    let mut rng = LcgRng::new(7);
    let mut random = NamedTempFile::new()?;
    writeln!(random, "{HEADER}")?;
    for _ in 0..200 {
        let vendor = if rng.next_range(2) == 0 { "VTS" } else { "CMT" };
        let payment = if rng.next_range(2) == 0 { "CRD" } else { "CSH" };
        writeln!(
            random,
            "{vendor},1,{},{},{}.{},{payment},{}",
            1 + rng.next_range(4),
            60 + rng.next_range(3000),
            rng.next_range(15),
            rng.next_range(100),
            3 + rng.next_range(60)
        )?;
    }
    random.flush()?;
    let unrelated = evaluate_dataset(&model, random.path())?;

    assert!(own.r_squared > 0.9, "own r2 {}", own.r_squared);
    assert!(own.r_squared > unrelated.r_squared);
    assert_eq!(own.count, 258);
    Ok(())
}

#[test]
fn test_single_row_dataset_fits() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "{HEADER}")?;
    writeln!(file, "VTS,1,2,1140,3.75,CRD,15.5")?;
    file.flush()?;

    let model = train_for_target(Target::Fare, file.path(), &GbdtConfig::default())?;
    assert_eq!(model.metadata().row_count, 1);
    assert_eq!(model.predict(&sample_trip())?.value, 15.5);
    Ok(())
}

#[test]
fn test_malformed_row_is_a_load_error() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "{HEADER}")?;
    writeln!(file, "VTS,1,2,1140,3.75,CRD,15.5")?;
    writeln!(file, "VTS,1,2,fast,3.75,CRD,15.5")?;
    file.flush()?;

    let err = train_for_target(Target::Fare, file.path(), &gbdt_config()).unwrap_err();
    assert!(matches!(
        err,
        TrainerError::Dataset(DatasetError::NonNumeric {
            line: 3,
            column: 3,
            ..
        })
    ));
    Ok(())
}

#[test]
fn test_distance_and_time_targets() -> Result<()> {
    let probe = ReducedRecord {
        trip_time: 1140.0,
        trip_distance: 3.75,
    };

    for target in [Target::Distance, Target::Time] {
        let model = train_for_target(target, &fixture(), &gbdt_config())?;
        assert_eq!(model.target(), target);
        assert_eq!(model.metadata().feature_count, 1);

        let prediction = model.predict(&probe)?;
        assert_eq!(prediction.name(), target.output_name());
        assert!(prediction.value.is_finite() && prediction.value > 0.0);

        // Full trip records carry the reduced fields too
        assert_eq!(model.predict(&sample_trip())?, prediction);

        let metrics = evaluate_dataset(&model, &fixture())?;
        assert_eq!(metrics.count, 258);
    }
    Ok(())
}

#[test]
fn test_shell_session() -> Result<()> {
    let dir = tempdir()?;
    std::fs::copy(fixture(), dir.path().join("taxi-fare-train.csv"))?;
    std::fs::copy(fixture(), dir.path().join("taxi-fare-test.csv"))?;

    let mut config = AppConfig::default();
    config.paths.data_dir = dir.path().to_path_buf();
    config.training = GbdtConfig {
        num_trees: 30,
        ..gbdt_config()
    };

    let mut startup = Vec::new();
    let model = train_and_save(&config, Target::Fare, &mut startup)?;
    let startup = String::from_utf8(startup)?;
    assert!(startup.contains("Model saved to:"));
    assert!(config.model_path(Target::Fare).exists());

    let script = "1\n3\n2\n1\n2.5\n2\n7\nabc\n9\n4\n6\n";
    let mut shell = Shell::new(config.clone(), model, Cursor::new(script), Vec::new());
    shell.run()?;

    assert_eq!(shell.current().target(), Target::Distance);
    assert!(config.model_path(Target::Distance).exists());

    let output = String::from_utf8(shell.into_output())?;
    assert!(output.contains("R2 Score:"));
    assert!(output.contains(", actual fare: 15.5"));
    assert_eq!(output.matches("Predicted fare:").count(), 2);
    assert!(output.contains("Invalid input"));
    assert!(output.contains("Error: 'abc' is not a number"));
    assert!(output.contains("Invalid choice."));
    assert!(output.contains("Training model for distance prediction........"));
    assert!(output.ends_with("Bye!!\n"));
    Ok(())
}

#[test]
fn test_shell_ends_on_closed_input() -> Result<()> {
    let dir = tempdir()?;
    let mut config = AppConfig::default();
    config.paths.data_dir = dir.path().to_path_buf();
    config.training = GbdtConfig {
        num_trees: 5,
        ..gbdt_config()
    };
    let model = train_for_target(Target::Fare, &fixture(), &config.training)?;

    // No fare artifact on disk: the sample prediction fails but the shell goes on
    let mut shell = Shell::new(config, model, Cursor::new("3\n"), Vec::new());
    shell.run()?;

    let output = String::from_utf8(shell.into_output())?;
    assert!(output.contains("Error:"));
    assert!(!output.contains("Predicted fare:"));
    Ok(())
}

#[test]
fn test_shell_rejects_negative_manual_input() -> Result<()> {
    let dir = tempdir()?;
    std::fs::copy(fixture(), dir.path().join("taxi-fare-train.csv"))?;

    let mut config = AppConfig::default();
    config.paths.data_dir = dir.path().to_path_buf();
    config.training = GbdtConfig {
        num_trees: 5,
        ..gbdt_config()
    };
    let model = train_and_save(&config, Target::Fare, &mut std::io::sink())?;

    let script = "2\n1\n-40\n2\n1\n2.5\n6\n";
    let mut shell = Shell::new(config, model, Cursor::new(script), Vec::new());
    shell.run()?;

    let output = String::from_utf8(shell.into_output())?;
    assert!(output.contains("Error: Invalid record: TripDistance must be a non-negative number"));
    assert_eq!(output.matches("Predicted fare:").count(), 1);
    assert!(output.ends_with("Bye!!\n"));
    Ok(())
}
