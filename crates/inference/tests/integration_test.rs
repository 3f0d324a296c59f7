//! Integration tests for the two inference stages.
//!
//! These tests write small rating, stat and correlation files and run the
//! prediction and aggregation jobs over them end to end.

use inference::{AggregationJob, InferenceError, PredictionJob};
use records::{JobConfig, PredictedRating, RecordError};
use std::fs;
use std::path::PathBuf;

/// Fresh scratch directory per test
fn scratch_dir(test: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("inference-{}-{}", std::process::id(), test));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write(dir: &PathBuf, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn predict(config: &JobConfig, files: &[PathBuf]) -> Vec<PredictedRating> {
    let mut job = PredictionJob::new(config.clone()).unwrap();
    for file in files {
        job.add_file(file).unwrap();
    }
    job.run().unwrap().outputs
}

#[test]
fn test_correlation_predicts_in_both_directions() {
    let dir = scratch_dir("both-directions");
    let files = [
        write(&dir, "rating.txt", "u1,a:40\nu2,b:60\n"),
        write(&dir, "corr.txt", "a,b,500,10\n"),
    ];

    let predictions = predict(&JobConfig::default(), &files);
    let rows: Vec<String> = predictions.iter().map(|p| p.to_row(",")).collect();

    // item a's group emits for b, item b's group emits for a
    assert_eq!(rows, vec!["u1,b,200,10,500,-1", "u2,a,300,10,500,-1"]);
}

#[test]
fn test_stat_flows_into_predictions() {
    let dir = scratch_dir("stat");
    let files = [
        write(&dir, "rating.txt", "u1,a:40\n"),
        write(&dir, "stat.txt", "a,55,12\n"),
        write(&dir, "corr.txt", "a,b,500,10\na,c,250,4\n"),
    ];

    let predictions = predict(&JobConfig::default(), &files);
    assert_eq!(predictions.len(), 2);
    assert!(predictions.iter().all(|p| p.input_std_dev == Some(12)));
}

#[test]
fn test_two_stages_end_to_end() -> anyhow::Result<()> {
    let dir = scratch_dir("end-to-end");
    // u1 rated a and b; both correlate with c, so u1 gets two predictions for c.
    let files = [
        write(&dir, "rating.txt", "u1,a:40,b:80\n\nu2,a:20\n"),
        write(&dir, "corr.txt", "a,c,500,1\nb,c,500,3\n"),
    ];

    let mut config = JobConfig::default();
    config.num_reducer = 3;

    let mut predict = PredictionJob::new(config.clone())?;
    for file in &files {
        predict.add_file(file)?;
    }
    let predictions = predict.run()?;
    assert_eq!(predictions.counters.ratings, 3);
    // c's own group sees the mirrored correlations but no ratings
    assert_eq!(predictions.groups, 3);

    let mut aggregate = AggregationJob::new(config)?;
    aggregate.extend(predictions.outputs);
    let scores = aggregate.run()?;
    let rows: Vec<String> = scores.outputs.iter().map(|s| s.to_row(",")).collect();

    // u1,c: (200 * 1 + 400 * 3) * 1000 / 4 = 350000; u2,c: 100 * 1000
    assert_eq!(rows, vec!["u1,c,350000,2", "u2,c,100000,1"]);
    assert_eq!(scores.counters.predictions, 3);
    Ok(())
}

#[test]
fn test_aggregation_reads_predictor_rows() -> anyhow::Result<()> {
    let dir = scratch_dir("aggregate-file");
    let file = write(
        &dir,
        "part-00000",
        "u1,c,5,1,500,-1\nu1,c,7,1,500,-1\nu1,c,9,1,500,-1\n",
    );

    let mut config = JobConfig::default();
    config.corr_length_weighted_average = false;
    config.input_rating_std_dev_weighted_average = false;

    let mut aggregate = AggregationJob::new(config)?;
    assert_eq!(aggregate.add_file(&file)?, 3);
    let scores = aggregate.run()?;
    assert_eq!(scores.outputs[0].score, 7000);
    assert_eq!(scores.outputs[0].support_count, 3);
    Ok(())
}

#[test]
fn test_std_dev_weighting_with_missing_stat_aborts() {
    let dir = scratch_dir("missing-stat");
    let files = [
        write(&dir, "rating.txt", "u1,a:40,b:40\n"),
        // only a has a stat, so the prediction for c via b carries no std dev
        write(&dir, "stat.txt", "a,0,5\n"),
        write(&dir, "corr.txt", "a,c,500,1\nb,c,500,1\n"),
    ];

    let mut config = JobConfig::default();
    config.corr_length_weighted_average = false;

    let predictions = predict(&config, &files);
    let mut aggregate = AggregationJob::new(config).unwrap();
    aggregate.extend(predictions);

    let err = aggregate.run().unwrap_err();
    assert!(matches!(err, InferenceError::MissingStdDev { .. }), "{err}");
}

#[test]
fn test_malformed_line_aborts_with_location() {
    let dir = scratch_dir("malformed");
    let file = write(&dir, "corr.txt", "a,b,500,10\na,b,500\n");

    let mut job = PredictionJob::new(JobConfig::default()).unwrap();
    let err = job.add_file(&file).unwrap_err();
    match err {
        InferenceError::Record(RecordError::FieldCount {
            file, line, expected, found,
        }) => {
            assert_eq!(file, "corr.txt");
            assert_eq!(line, 2);
            assert_eq!((expected, found), (4, 3));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_out_of_range_values_fail_the_stage() {
    let dir = scratch_dir("overflow");
    let files = [
        write(&dir, "rating.txt", "u1,a:100000000000\n"),
        write(&dir, "corr.txt", "a,b,100000000000,1\n"),
    ];

    let mut job = PredictionJob::new(JobConfig::default()).unwrap();
    for file in &files {
        job.add_file(file).unwrap();
    }
    let err = job.run().unwrap_err();
    assert!(matches!(err, InferenceError::Overflow { .. }), "{err}");
}

#[test]
fn test_invalid_config_rejected_at_job_creation() {
    let mut config = JobConfig::default();
    config.max_rating = 0;
    assert!(matches!(
        PredictionJob::new(config),
        Err(InferenceError::Record(RecordError::Config { .. }))
    ));
}

#[test]
fn test_parallelism_does_not_change_output() {
    let dir = scratch_dir("parallelism");
    let mut ratings = String::new();
    let mut corrs = String::new();
    for user in 0..20 {
        ratings.push_str(&format!("u{user},i{}:{},i{}:{}\n", user % 7, 10 + user, (user + 3) % 7, 50));
    }
    for a in 0..7 {
        for b in (a + 1)..7 {
            corrs.push_str(&format!("i{a},i{b},{},{}\n", 100 * (b - a), a + b));
        }
    }
    let files = [write(&dir, "rating.txt", &ratings), write(&dir, "corr.txt", &corrs)];

    let serial = predict(&JobConfig::default(), &files);
    let mut config = JobConfig::default();
    config.num_reducer = 4;
    let parallel = predict(&config, &files);

    assert!(!serial.is_empty());
    assert_eq!(serial, parallel);
}
