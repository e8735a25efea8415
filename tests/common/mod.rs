#![allow(dead_code)]

use std::fs;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ferrite_meg::data::manifest::{PARTICIPANTS_FILE, TRIALS_FILE};
use ferrite_meg::data::{recording_path, Recording};

pub const SENSORS: usize = 2;
pub const TIME: usize = 120;
pub const TRIAL_LEN: usize = 40;

/// Writes a small dataset: `n` subjects `s000..`, alternating labels, ages
/// 20 + i, two trials each, random recordings of shape `[3, SENSORS, TIME]`.
pub fn write_dataset(dir: &Path, n: usize, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut trials = String::from("subs,sex,begin,end\n");
    let mut participants = String::from("subs,age\n");
    for i in 0..n {
        let id = subject_id(i);
        trials.push_str(&format!("{id},{},0,{TRIAL_LEN}\n", i % 2));
        trials.push_str(&format!("{id},{},{},{}\n", i % 2, TIME - TRIAL_LEN, TIME));
        participants.push_str(&format!("{id},{}\n", 20 + i));

        let data: Vec<f64> = (0..3 * SENSORS * TIME).map(|_| rng.gen_range(-1.0..1.0)).collect();
        Recording::new(vec![3, SENSORS, TIME], data)
            .unwrap()
            .write(&recording_path(dir, &id))
            .unwrap();
    }
    fs::write(dir.join(TRIALS_FILE), trials).unwrap();
    fs::write(dir.join(PARTICIPANTS_FILE), participants).unwrap();
}

pub fn subject_id(i: usize) -> String {
    format!("s{i:03}")
}
