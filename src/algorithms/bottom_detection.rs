//! Image-domain bottom detection over assembled ping power matrices
//!
//! A channel's pings form a `samples x pings` power image. Candidate
//! bottom returns are edges in the sample direction; they are grouped
//! into classes by connected-component labeling, scored by summed
//! power and signal-to-noise, and the strongest non-overlapping
//! classes claim the pings they cover. Detected sample indices are
//! converted to two-way travel time and consolidated across the
//! frequencies of a channel group.
use crate::algorithms::filters::{
    butter_lowpass, filtfilt, gaussian_smooth, interp1, label_components, std_dev,
    vertical_gradient,
};
use crate::error::{Error, Result};
use ndarray::Array2;

/// Tunable constants of the detection pipeline
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Gaussian smoothing width in samples/pings
    pub smoothing_sigma: f64,
    /// Minimum mean class SNR in dB for a class to claim pings
    pub snr_threshold: f64,
    /// Cross-frequency closeness tolerance as a multiple of the
    /// longest pulse length in the group
    pub closeness_factor: f64,
    /// Heave low-pass cutoff in Hz
    pub heave_cutoff: f64,
    /// Heave low-pass filter order
    pub heave_order: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        DetectionConfig {
            smoothing_sigma: 8.0,
            snr_threshold: 30.0,
            closeness_factor: 2.0,
            heave_cutoff: 0.05,
            heave_order: 5,
        }
    }
}

/// One channel's contribution to a block of pings
#[derive(Debug, Clone)]
pub struct ChannelSounding {
    /// Transmit frequency in Hz
    pub frequency: f64,
    /// Pulse length in seconds
    pub pulse_length: f64,
    /// Sample interval in seconds
    pub sample_interval: f64,
    /// Sound speed in m/s
    pub sound_speed: f64,
    /// Received power in dB, shaped `samples x pings`
    pub power: Array2<f64>,
}

/// A per-ping detection on one channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelDetection {
    /// Detected sample index, `-1` for no detection
    pub sample_index: i64,
    /// Signal-to-noise ratio at the detection in dB
    pub snr: f64,
}

/// The consolidated detection for one ping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PingDetection {
    /// Two-way travel time in seconds
    pub travel_time: f64,
    /// Frequency of the channel the detection came from
    pub frequency: f64,
    /// Signal-to-noise ratio of the detection in dB
    pub snr: f64,
}

/// Convert a detected sample index to two-way travel time
///
/// The detection sits at the echo peak; half a pulse is removed to
/// place it at the leading edge.
pub fn travel_time(sample_index: i64, sample_interval: f64, pulse_length: f64) -> Option<f64> {
    if sample_index < 0 {
        return None;
    }
    Some((2.0 * sample_interval * sample_index as f64 - pulse_length / 2.0).max(0.0))
}

/// Detect the bottom on one channel's power image
pub fn detect_channel(channel: &ChannelSounding, config: &DetectionConfig) -> Vec<ChannelDetection> {
    let (samples, pings) = channel.power.dim();
    let mut out = vec![
        ChannelDetection {
            sample_index: -1,
            snr: 0.0,
        };
        pings
    ];
    if samples < 3 || pings == 0 {
        return out;
    }

    let smoothed = gaussian_smooth(&channel.power, config.smoothing_sigma);
    let gradient = vertical_gradient(&smoothed);
    let threshold = std_dev(&gradient);
    let mut mask = gradient.mapv(|g| g > threshold);
    // the filters smear into the first and last rows
    for j in 0..pings {
        mask[(0, j)] = false;
        mask[(samples - 1, j)] = false;
    }
    let (mut labels, class_count) = label_components(&mask);
    if class_count == 0 {
        return out;
    }

    // extend every class down through the rest of its rising edge so
    // the peak itself is inside the class
    for j in 0..pings {
        let mut i = 0;
        while i < samples {
            let class = labels[(i, j)];
            if class == 0 {
                i += 1;
                continue;
            }
            let mut k = i + 1;
            while k < samples && labels[(k, j)] == class {
                k += 1;
            }
            while k < samples && labels[(k, j)] == 0 && gradient[(k, j)] > 0.0 {
                labels[(k, j)] = class;
                k += 1;
            }
            i = k;
        }
    }

    let pulse_samples =
        ((channel.pulse_length / channel.sample_interval).round() as usize).min(samples - 1);

    struct ClassStats {
        // (sample, snr) per ping column
        columns: Vec<Option<(usize, f64)>>,
        count: usize,
        linear_power_sum: f64,
        snr_sum: f64,
    }
    let classes = class_count as usize;
    let mut stats: Vec<ClassStats> = (0..classes)
        .map(|_| ClassStats {
            columns: vec![None; pings],
            count: 0,
            linear_power_sum: 0.0,
            snr_sum: 0.0,
        })
        .collect();

    for j in 0..pings {
        // strongest sample per class in this column
        let mut best: Vec<Option<(usize, f64)>> = vec![None; classes + 1];
        for i in 0..samples {
            let class = labels[(i, j)] as usize;
            if class == 0 {
                continue;
            }
            let power = channel.power[(i, j)];
            if best[class].map_or(true, |(_, p)| power > p) {
                best[class] = Some((i, power));
            }
        }
        for (class, candidate) in best.iter().enumerate().skip(1) {
            let (row, peak) = match candidate {
                Some(v) => *v,
                None => continue,
            };
            // noise floor: mean power from the end of the transmit
            // pulse to the detection
            let noise = if row > pulse_samples {
                (pulse_samples..row)
                    .map(|i| channel.power[(i, j)])
                    .sum::<f64>()
                    / (row - pulse_samples) as f64
            } else {
                peak
            };
            let snr = peak - noise;
            let s = &mut stats[class - 1];
            s.columns[j] = Some((row, snr));
            s.count += 1;
            s.linear_power_sum += 10f64.powf(peak / 10.0);
            s.snr_sum += snr;
        }
    }

    // strongest class first; weaker classes may not claim a ping an
    // already assigned class covers
    let mut order: Vec<usize> = (0..classes).filter(|&c| stats[c].count > 0).collect();
    order.sort_by(|&x, &y| stats[y].linear_power_sum.total_cmp(&stats[x].linear_power_sum));
    let mut claimed = vec![false; pings];
    for &c in &order {
        let s = &stats[c];
        if s.snr_sum / (s.count as f64) < config.snr_threshold {
            continue;
        }
        if s
            .columns
            .iter()
            .enumerate()
            .any(|(j, v)| v.is_some() && claimed[j])
        {
            continue;
        }
        for (j, v) in s.columns.iter().enumerate() {
            if let Some((row, snr)) = v {
                claimed[j] = true;
                out[j] = ChannelDetection {
                    sample_index: *row as i64,
                    snr: *snr,
                };
            }
        }
    }
    out
}

/// Detect and consolidate across all channels of a group
///
/// Channels must share one sampling interval by design; a mismatch is
/// a protocol violation and fails the whole group. The consolidation
/// prefers the highest-frequency detection when it lies within
/// `closeness_factor * max pulse length` (in travel time) of the
/// lowest-frequency one, which is the most reliable.
pub fn detect_group(
    channels: &[ChannelSounding],
    config: &DetectionConfig,
) -> Result<Vec<Option<PingDetection>>> {
    let first = match channels.first() {
        Some(c) => c,
        None => return Ok(Vec::new()),
    };
    let sample_interval = first.sample_interval;
    for c in &channels[1..] {
        if (c.sample_interval - sample_interval).abs() > 1e-12 {
            return Err(Error::SamplingIntervalMismatch(
                sample_interval,
                c.sample_interval,
            ));
        }
    }
    let pings = first.power.ncols();
    let max_pulse = channels
        .iter()
        .map(|c| c.pulse_length)
        .fold(0.0_f64, f64::max);
    let detections: Vec<Vec<ChannelDetection>> =
        channels.iter().map(|c| detect_channel(c, config)).collect();

    let lo = channels
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.frequency.total_cmp(&b.frequency))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let hi = channels
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.frequency.total_cmp(&b.frequency))
        .map(|(i, _)| i)
        .unwrap_or(0);

    let mut out = Vec::with_capacity(pings);
    for j in 0..pings {
        let at = |ci: usize| -> Option<PingDetection> {
            let d = detections[ci][j];
            travel_time(d.sample_index, sample_interval, channels[ci].pulse_length).map(|tt| {
                PingDetection {
                    travel_time: tt,
                    frequency: channels[ci].frequency,
                    snr: d.snr,
                }
            })
        };
        let chosen = match (at(lo), at(hi)) {
            (Some(l), Some(h)) if lo != hi => {
                if (h.travel_time - l.travel_time).abs() <= config.closeness_factor * max_pulse {
                    Some(h)
                } else {
                    Some(l)
                }
            }
            (Some(l), _) => Some(l),
            (None, h) => h,
        };
        out.push(chosen);
    }
    Ok(out)
}

/// Estimate heave from a detected range time series
///
/// The ranges are resampled to a 1 Hz grid, low-pass filtered to
/// estimate the bathymetric trend and the residual is interpolated
/// back onto the ping times. Series too short to filter yield zeros.
pub fn heave_series(times: &[f64], ranges: &[f64], config: &DetectionConfig) -> Vec<f64> {
    debug_assert_eq!(times.len(), ranges.len());
    if times.len() < 2 {
        return vec![0.0; times.len()];
    }
    let t0 = times[0];
    let span = times[times.len() - 1] - t0;
    let n = span.floor() as usize + 1;
    let grid: Vec<f64> = (0..n).map(|i| t0 + i as f64).collect();
    let gridded = interp1(times, ranges, &grid);
    let (b, a) = butter_lowpass(config.heave_order, config.heave_cutoff, 1.0);
    let trend = filtfilt(&b, &a, &gridded);
    let residual: Vec<f64> = gridded.iter().zip(&trend).map(|(r, t)| r - t).collect();
    interp1(&grid, &residual, times)
}
