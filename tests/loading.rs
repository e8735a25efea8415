mod common;

use std::fs;
use std::sync::Arc;

use pretty_assertions::assert_eq;

use ferrite_meg::data::{
    build_source, partition, recording_path, trials_for_split, ChannelType, ChunkedDataset, DataLoader,
    EagerDataset, Feature, LoadingMode, Preprocessor, Recording, SampleSource, Split, SplitConfig,
};
use ferrite_meg::data::manifest::load_subjects;

use common::{subject_id, write_dataset, SENSORS, TIME, TRIAL_LEN};

fn rows(loader: &DataLoader) -> Vec<(Vec<f64>, usize)> {
    loader
        .iter()
        .flat_map(|b| {
            (0..b.len())
                .map(|r| (b.inputs.row(r).to_vec(), b.labels[r]))
                .collect::<Vec<_>>()
        })
        .collect()
}

#[test]
fn eager_and_chunked_yield_the_same_samples() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), 10, 1);
    let subjects = load_subjects(dir.path()).unwrap();
    let split = partition(&subjects, &SplitConfig::default()).unwrap();
    let trials = trials_for_split(&split, Split::Train, &subjects, Some(7));
    assert_eq!(trials.len(), 16);

    for feature in [Feature::Temporal, Feature::Both, Feature::Bands] {
        let pre = Preprocessor::new(ChannelType::Grad, feature);
        let eager = build_source(LoadingMode::Eager, dir.path(), trials.clone(), pre);
        let chunked = build_source(LoadingMode::Chunked, dir.path(), trials.clone(), pre);
        assert_eq!(eager.shape(), chunked.shape());
        assert_eq!(eager.shape().channels, 2);
        assert_eq!(eager.shape().sensors, SENSORS);

        let a = rows(&DataLoader::new("eager", eager, 3, 0));
        let b = rows(&DataLoader::new("chunked", chunked, 3, 2));
        assert_eq!(a.len(), 16);
        assert_eq!(a.len(), b.len());
        for ((xa, la), (xb, lb)) in a.iter().zip(&b) {
            assert_eq!(la, lb);
            assert_eq!(xa.len(), xb.len());
            assert!(xa.iter().zip(xb).all(|(p, q)| (p - q).abs() < 1e-12));
        }
    }
}

#[test]
fn temporal_samples_are_standardized() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), 2, 3);
    let subjects = load_subjects(dir.path()).unwrap();
    let refs = ferrite_meg::data::subject::trial_refs(&subjects);
    let data = EagerDataset::load(dir.path(), &refs, Preprocessor::new(ChannelType::Mag, Feature::Temporal));

    let sample = data.get(0).unwrap();
    assert_eq!(sample.input.len(), SENSORS * TRIAL_LEN);
    let first_sensor = &sample.input[..TRIAL_LEN];
    let mean = first_sensor.iter().sum::<f64>() / TRIAL_LEN as f64;
    let var = first_sensor.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / TRIAL_LEN as f64;
    assert!(mean.abs() < 1e-9);
    assert!((var - 1.0).abs() < 1e-9);
}

#[test]
fn missing_subject_file_drops_only_its_trials() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), 4, 5);
    fs::remove_file(recording_path(dir.path(), &subject_id(2))).unwrap();

    let subjects = load_subjects(dir.path()).unwrap();
    let refs = ferrite_meg::data::subject::trial_refs(&subjects);
    assert_eq!(refs.len(), 8);
    let pre = Preprocessor::new(ChannelType::All, Feature::Temporal);

    let eager = EagerDataset::load(dir.path(), &refs, pre);
    assert_eq!(eager.len(), 6);

    let chunked = ChunkedDataset::new(dir.path(), refs.clone(), pre);
    assert_eq!(chunked.len(), 8);
    assert!(chunked.get(4).is_err());

    let expected: Vec<usize> = refs.iter().filter(|t| t.subject != subject_id(2)).map(|t| t.label).collect();
    let eager_rows = rows(&DataLoader::new("eager", Arc::new(eager), 4, 0));
    let chunked_rows = rows(&DataLoader::new("chunked", Arc::new(chunked), 4, 2));
    assert_eq!(eager_rows.iter().map(|r| r.1).collect::<Vec<_>>(), expected);
    assert_eq!(eager_rows, chunked_rows);
}

#[test]
fn out_of_range_trial_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), 1, 9);
    let mut subjects = load_subjects(dir.path()).unwrap();
    subjects[0].trials.push(ferrite_meg::data::Trial { begin: 100, end: 500 });
    let refs = ferrite_meg::data::subject::trial_refs(&subjects);

    let eager = EagerDataset::load(dir.path(), &refs, Preprocessor::new(ChannelType::Mag, Feature::Temporal));
    assert_eq!(eager.len(), 2);
}

#[test]
fn trial_with_nan_is_dropped_by_both_loaders() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), 2, 11);
    let path = recording_path(dir.path(), &subject_id(1));
    let mut rec = Recording::read(&path).unwrap();
    // Magnetometer, sensor 0, inside the first trial only.
    rec.data[2 * SENSORS * TIME + 5] = f64::NAN;
    rec.write(&path).unwrap();

    let subjects = load_subjects(dir.path()).unwrap();
    let refs = ferrite_meg::data::subject::trial_refs(&subjects);
    assert_eq!(refs.len(), 4);

    for feature in [Feature::Temporal, Feature::Bands] {
        let pre = Preprocessor::new(ChannelType::Mag, feature);
        let eager = EagerDataset::load(dir.path(), &refs, pre);
        assert_eq!(eager.len(), 3);

        let chunked = ChunkedDataset::new(dir.path(), refs.clone(), pre);
        assert!(chunked.get(2).is_err());
        assert!(chunked.get(3).is_ok());

        let eager_rows = rows(&DataLoader::new("eager", Arc::new(eager), 4, 0));
        let chunked_rows = rows(&DataLoader::new("chunked", Arc::new(chunked), 4, 2));
        assert_eq!(eager_rows.iter().map(|r| r.1).collect::<Vec<_>>(), vec![0, 0, 1]);
        assert_eq!(eager_rows, chunked_rows);
        assert!(eager_rows.iter().all(|(x, _)| x.iter().all(|v| v.is_finite())));
    }
}
