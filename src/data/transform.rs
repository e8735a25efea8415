//! Per-trial preprocessing: channel selection, z-scoring and spectral
//! features.

use std::f64::consts::PI;
use std::str::FromStr;

use serde::{Serialize, Deserialize};

use crate::data::recording::Recording;
use crate::data::subject::Trial;
use crate::error::{ConfigError, DataError};

/// Sampling rate of the downsampled recordings, in Hz.
pub const SAMPLING_RATE: f64 = 200.0;

/// Longest Welch segment; shorter trials use their full length.
pub const WELCH_SEGMENT: usize = 256;

/// Canonical frequency bands `[low, high)` in Hz: delta, theta, alpha, beta,
/// gamma.
pub const BANDS: [(f64, f64); 5] = [(0.5, 4.0), (4.0, 8.0), (8.0, 12.0), (12.0, 30.0), (30.0, 120.0)];

// ---------------------------------------------------------------------------
// Configuration tokens
// ---------------------------------------------------------------------------

/// Sensor type selection along the first recording axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChannelType {
    /// Magnetometers only.
    Mag,
    /// Both gradiometer orientations.
    Grad,
    All,
}

impl ChannelType {
    pub fn indices(&self) -> &'static [usize] {
        match self {
            ChannelType::Mag => &[2],
            ChannelType::Grad => &[0, 1],
            ChannelType::All => &[0, 1, 2],
        }
    }
}

impl FromStr for ChannelType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MAG" => Ok(ChannelType::Mag),
            "GRAD" => Ok(ChannelType::Grad),
            "ALL" => Ok(ChannelType::All),
            _ => Err(ConfigError::UnknownToken { kind: "channel type", value: s.to_string(), expected: "MAG, GRAD, ALL" }),
        }
    }
}

/// Representation fed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    /// Z-scored time series.
    Temporal,
    /// Welch power averaged over the five canonical bands.
    Bands,
    /// Full one-sided Welch spectrum.
    Bins,
    /// Z-scored time series followed by the Welch spectrum.
    Both,
}

impl FromStr for Feature {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "temporal" => Ok(Feature::Temporal),
            "bands" => Ok(Feature::Bands),
            "bins" => Ok(Feature::Bins),
            "both" => Ok(Feature::Both),
            _ => Err(ConfigError::UnknownToken { kind: "feature", value: s.to_string(), expected: "temporal, bands, bins, both" }),
        }
    }
}

/// Logical sample shape `[channels, sensors, bins]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleShape {
    pub channels: usize,
    pub sensors: usize,
    pub bins: usize,
}

impl SampleShape {
    pub fn numel(&self) -> usize {
        self.channels * self.sensors * self.bins
    }
}

// ---------------------------------------------------------------------------
// Preprocessor
// ---------------------------------------------------------------------------

/// Turns one trial of a raw recording into a flat sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preprocessor {
    pub channel: ChannelType,
    pub feature: Feature,
    pub sampling_rate: f64,
}

impl Preprocessor {
    pub fn new(channel: ChannelType, feature: Feature) -> Preprocessor {
        Preprocessor { channel, feature, sampling_rate: SAMPLING_RATE }
    }

    /// Number of values per sensor for a trial of `trial_len` time points.
    pub fn bins(&self, trial_len: usize) -> usize {
        match self.feature {
            Feature::Temporal => trial_len,
            Feature::Bands => BANDS.len(),
            Feature::Bins => welch_bins(trial_len),
            Feature::Both => trial_len + welch_bins(trial_len),
        }
    }

    pub fn shape(&self, sensors: usize, trial_len: usize) -> SampleShape {
        SampleShape { channels: self.channel.indices().len(), sensors, bins: self.bins(trial_len) }
    }

    /// Cuts `trial` out of `recording` and applies the configured transform.
    ///
    /// The output is laid out `[channel, sensor, bin]` in C order.
    pub fn apply(&self, recording: &Recording, trial: Trial) -> Result<Vec<f64>, DataError> {
        let (types, sensors, time) = match recording.shape.as_slice() {
            &[t, s, n] => (t, s, n),
            other => return Err(DataError::Shape { expected: vec![3, 0, 0], actual: other.to_vec() }),
        };
        let indices = self.channel.indices();
        if indices.iter().any(|&c| c >= types) {
            return Err(DataError::Shape { expected: vec![indices.len().max(3), sensors, time], actual: recording.shape.clone() });
        }
        if trial.end > time || trial.is_empty() {
            return Err(DataError::TrialBounds { begin: trial.begin, end: trial.end, len: time });
        }

        let shape = self.shape(sensors, trial.len());
        let mut out = Vec::with_capacity(shape.numel());
        for &c in indices {
            for s in 0..sensors {
                let offset = (c * sensors + s) * time;
                let segment = &recording.data[offset + trial.begin..offset + trial.end];
                let non_finite =
                    || DataError::NonFinite { begin: trial.begin, end: trial.end, channel: c, sensor: s };
                if segment.iter().any(|x| !x.is_finite()) {
                    return Err(non_finite());
                }
                let start = out.len();
                match self.feature {
                    Feature::Temporal => out.extend(zscore(segment)),
                    Feature::Bins => out.extend(welch(segment, self.sampling_rate)),
                    Feature::Bands => {
                        let psd = welch(segment, self.sampling_rate);
                        out.extend(band_power(&psd, segment.len(), self.sampling_rate));
                    }
                    Feature::Both => {
                        out.extend(zscore(segment));
                        out.extend(welch(segment, self.sampling_rate));
                    }
                }
                if out[start..].iter().any(|x| !x.is_finite()) {
                    return Err(non_finite());
                }
            }
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Signal helpers
// ---------------------------------------------------------------------------

/// Standardizes to zero mean and unit (population) variance. A constant
/// signal maps to zeros; non-finite input stays non-finite.
pub fn zscore(signal: &[f64]) -> Vec<f64> {
    let n = signal.len() as f64;
    if signal.is_empty() {
        return Vec::new();
    }
    let mean = signal.iter().sum::<f64>() / n;
    let var = signal.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    let std = var.sqrt();
    if std == 0.0 {
        return vec![0.0; signal.len()];
    }
    signal.iter().map(|x| (x - mean) / std).collect()
}

fn welch_segment(len: usize) -> usize {
    len.min(WELCH_SEGMENT)
}

/// Number of one-sided spectrum bins for a signal of `len` points.
pub fn welch_bins(len: usize) -> usize {
    welch_segment(len) / 2 + 1
}

/// Frequency of each Welch bin, in Hz.
pub fn welch_frequencies(len: usize, sampling_rate: f64) -> Vec<f64> {
    let nperseg = welch_segment(len);
    (0..welch_bins(len)).map(|k| k as f64 * sampling_rate / nperseg as f64).collect()
}

/// One-sided power spectral density by Welch's method: periodic Hann window,
/// 50 % overlap, constant detrend, density scaling, segment means averaged.
pub fn welch(signal: &[f64], sampling_rate: f64) -> Vec<f64> {
    let nperseg = welch_segment(signal.len());
    let n_bins = welch_bins(signal.len());
    if nperseg == 0 {
        return vec![0.0; n_bins];
    }
    let step = (nperseg - nperseg / 2).max(1);

    let window: Vec<f64> = (0..nperseg)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / nperseg as f64).cos())
        .collect();
    let window_power: f64 = window.iter().map(|w| w * w).sum();
    let scale = if window_power > 0.0 { 1.0 / (sampling_rate * window_power) } else { 0.0 };

    let mut psd = vec![0.0; n_bins];
    let mut segments = 0usize;
    let mut start = 0;
    while start + nperseg <= signal.len() {
        let seg = &signal[start..start + nperseg];
        let mean = seg.iter().sum::<f64>() / nperseg as f64;
        let tapered: Vec<f64> = seg.iter().zip(&window).map(|(x, w)| (x - mean) * w).collect();

        for (k, p) in psd.iter_mut().enumerate() {
            let (mut re, mut im) = (0.0, 0.0);
            for (i, x) in tapered.iter().enumerate() {
                let angle = 2.0 * PI * (k * i % nperseg) as f64 / nperseg as f64;
                re += x * angle.cos();
                im -= x * angle.sin();
            }
            let mut power = (re * re + im * im) * scale;
            let nyquist = nperseg % 2 == 0 && k == nperseg / 2;
            if k != 0 && !nyquist {
                power *= 2.0;
            }
            *p += power;
        }
        segments += 1;
        start += step;
    }
    if segments > 0 {
        psd.iter_mut().for_each(|p| *p /= segments as f64);
    }
    psd
}

/// Mean power inside each of the canonical `BANDS`. Bands without any bin
/// (very short trials) report 0.
pub fn band_power(psd: &[f64], signal_len: usize, sampling_rate: f64) -> Vec<f64> {
    let freqs = welch_frequencies(signal_len, sampling_rate);
    BANDS
        .iter()
        .map(|&(lo, hi)| {
            let (sum, count) = freqs
                .iter()
                .zip(psd)
                .filter(|(f, _)| **f >= lo && **f < hi)
                .fold((0.0, 0usize), |(s, c), (_, p)| (s + p, c + 1));
            if count == 0 { 0.0 } else { sum / count as f64 }
        })
        .collect()
}
