//! Synthetic raw byte streams for the integration tests
#![allow(dead_code)]

use ekraw::parser::raw::POWER_SCALE;

/// Seconds between the tick epoch (1601-01-01) and the POSIX epoch
pub const EPOCH_DELTA_SECONDS: u64 = 11_644_473_600;

/// 100 ns ticks for a whole-second POSIX time
pub fn ticks(unix_seconds: u64) -> u64 {
    (EPOCH_DELTA_SECONDS + unix_seconds) * 10_000_000
}

/// Frame a payload: leading length, tag, ticks, payload, length repeat
pub fn frame(tag: &[u8; 4], ticks: u64, payload: &[u8]) -> Vec<u8> {
    let len = (12 + payload.len()) as u32;
    let mut out = Vec::with_capacity(payload.len() + 20);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(tag);
    out.extend_from_slice(&ticks.to_le_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(&len.to_le_bytes());
    out
}

/// A null-padded fixed-width string field
pub fn fixed(text: &str, width: usize) -> Vec<u8> {
    let mut out = vec![0u8; width];
    let bytes = text.as_bytes();
    out[..bytes.len()].copy_from_slice(bytes);
    out
}

/// A CON0 payload with one calibration block per `(channel_id,
/// frequency)` pair
pub fn con0(survey: &str, channels: &[(&str, f32)]) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend(fixed(survey, 128));
    p.extend(fixed("transect-1", 128));
    p.extend(fixed("EK60", 128));
    p.extend(fixed("2.4.3", 30));
    p.extend(std::iter::repeat(0u8).take(98));
    p.extend((channels.len() as i32).to_le_bytes());
    for (channel_id, frequency) in channels {
        p.extend(fixed(channel_id, 128));
        p.extend(1i32.to_le_bytes());
        p.extend(frequency.to_le_bytes());
        // gain through dir_z
        for _ in 0..14 {
            p.extend(0f32.to_le_bytes());
        }
        for _ in 0..3 {
            for _ in 0..5 {
                p.extend(0f32.to_le_bytes());
            }
            p.extend([0u8; 8]);
        }
    }
    p
}

/// A RAW0 payload carrying power samples only
pub fn raw0(
    channel: i16,
    frequency: f32,
    pulse_length: f32,
    sample_interval: f32,
    power_db: &[f64],
) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend(channel.to_le_bytes());
    p.extend(1i16.to_le_bytes());
    p.extend(0f32.to_le_bytes());
    p.extend(frequency.to_le_bytes());
    p.extend(1000f32.to_le_bytes());
    p.extend(pulse_length.to_le_bytes());
    p.extend(0f32.to_le_bytes());
    p.extend(sample_interval.to_le_bytes());
    p.extend(1500f32.to_le_bytes());
    // absorption, heave, roll, pitch, temperature
    for _ in 0..5 {
        p.extend(0f32.to_le_bytes());
    }
    p.extend([0u8; 12]);
    p.extend(0i32.to_le_bytes());
    p.extend((power_db.len() as i32).to_le_bytes());
    for &db in power_db {
        let count = (db / POWER_SCALE).round() as i16;
        p.extend(count.to_le_bytes());
    }
    p
}

/// A RAW3 payload in the power sample layout
pub fn raw3(channel_id: &str, power_db: &[f64]) -> Vec<u8> {
    let mut p = fixed(channel_id, 128);
    p.push(1u8);
    p.push(0u8);
    p.extend([0u8; 2]);
    p.extend(0i32.to_le_bytes());
    p.extend((power_db.len() as i32).to_le_bytes());
    for &db in power_db {
        let count = (db / POWER_SCALE).round() as i16;
        p.extend(count.to_le_bytes());
    }
    p
}

/// An XML0 Configuration payload naming the installed channels
pub fn xml0_configuration(channel_ids: &[&str]) -> Vec<u8> {
    let mut doc = String::from(
        r#"<?xml version="1.0"?><Configuration><Header ApplicationName="EK80" Version="1.12.2" SurveyName="synthetic"/><Transceivers>"#,
    );
    for id in channel_ids {
        doc.push_str(&format!(r#"<Channel ChannelID="{id}"/>"#));
    }
    doc.push_str("</Transceivers></Configuration>");
    doc.into_bytes()
}

/// An XML0 Parameter payload for one channel's ping
pub fn xml0_parameter(
    channel_id: &str,
    frequency: f64,
    pulse_duration: f64,
    sample_interval: f64,
) -> Vec<u8> {
    format!(
        r#"<?xml version="1.0"?><Parameter><Channel ChannelID="{channel_id}" Frequency="{frequency}" PulseDuration="{pulse_duration}" SampleInterval="{sample_interval}"/></Parameter>"#
    )
    .into_bytes()
}

/// An XML0 Environment payload
pub fn xml0_environment(sound_speed: f64) -> Vec<u8> {
    format!(r#"<Environment SoundSpeed="{sound_speed}"/>"#).into_bytes()
}

/// A GGA fix near 48N 11E as an NME0 payload
pub fn gga() -> Vec<u8> {
    b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47".to_vec()
}

/// A flat noise floor with one Gaussian echo, as one ping's power
/// column in dB
pub fn echo_column(samples: usize, peak: usize) -> Vec<f64> {
    (0..samples)
        .map(|i| {
            let d = i as f64 - peak as f64;
            -100.0 + 40.0 * (-d * d / (2.0 * 9.0_f64.powi(2))).exp()
        })
        .collect()
}
