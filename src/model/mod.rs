//! The ekraw data model
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// The sounder family a raw file was recorded by
///
/// The model decides which datagram family carries sample data
/// (`RAW0` for the EK60, `RAW3` for the EK80) and where the
/// installation parameters come from (`CON0` vs. an `XML0`
/// Configuration document).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(Deserialize, Serialize)]
pub enum SounderModel {
    /// EK60-generation sounder (CON0 + RAW0)
    Ek60,
    /// EK80-generation sounder (XML0 + RAW3)
    Ek80,
}

/// One installed transducer/channel
#[derive(Debug, Clone)]
#[derive(Deserialize, Serialize)]
pub struct TransducerInstallation {
    /// The full channel-id string, e.g. `"GPT 38 kHz 009072033fa5 1-1 ES38B"`
    pub channel_id: String,
    /// Serial number parsed out of the channel id, when the id matched
    /// one of the documented token patterns
    pub serial_number: Option<u64>,
    /// Nominal frequency in Hz (zero when only the per-ping parameter
    /// records carry it, as on the EK80)
    pub frequency: f64,
    /// Alongship position offset in meters
    pub pos_x: f64,
    /// Athwartship position offset in meters
    pub pos_y: f64,
    /// Vertical position offset in meters
    pub pos_z: f64,
    /// Available pulse lengths in seconds
    pub pulse_length_table: Vec<f64>,
    /// Gain per pulse length in dB
    pub gain_table: Vec<f64>,
    /// Sa correction per pulse length in dB
    pub sa_correction_table: Vec<f64>,
}

/// One-time installation record extracted from the first configuration
/// datagram of a file
///
/// Sequential reading cannot start without this record: it fixes the
/// number of channels and the channel ordering that ping groups are
/// checked against.
#[derive(Debug, Clone)]
#[derive(Deserialize, Serialize)]
pub struct InstallationParameters {
    /// Survey name from the configuration header
    pub survey_name: String,
    /// Transect name from the configuration header
    pub transect_name: String,
    /// Sounder name from the configuration header
    pub sounder_name: String,
    /// Software version string
    pub version: String,
    /// Which sounder family recorded the file
    pub model: SounderModel,
    /// The installed transducers, in configuration order
    pub transducers: Vec<TransducerInstallation>,
}

impl InstallationParameters {
    /// The number of installed channels
    pub fn channel_count(&self) -> usize {
        self.transducers.len()
    }

    /// The channel-id strings, in configuration order
    pub fn transducer_names(&self) -> Vec<&str> {
        self.transducers.iter().map(|t| t.channel_id.as_str()).collect()
    }
}

/// An aggregated per-ping record produced after bottom detection
#[derive(Debug, Clone)]
#[derive(Deserialize, Serialize)]
pub struct PingRecord {
    /// The time shared by all sibling datagrams of the ping
    #[serde(with = "time::serde::timestamp")]
    pub timestamp: OffsetDateTime,
    /// Frequencies of the channels in the group, ascending
    pub frequencies: Vec<f64>,
    /// Two-way travel time of the consolidated bottom detection in
    /// seconds, `None` when no channel produced a detection
    pub travel_time: Option<f64>,
    /// Frequency of the channel the consolidated detection came from
    pub detection_frequency: Option<f64>,
    /// Sound speed reported by the sample datagrams in m/s
    pub sound_speed: f64,
    /// Alongship beam angle of the detection; not derived yet
    pub along_angle: Option<f64>,
    /// Athwartship beam angle of the detection; not derived yet
    pub athwart_angle: Option<f64>,
    /// Mean signal-to-noise ratio of the detecting class in dB
    pub quality_factor: Option<f64>,
    /// Number of sibling records the group closed with
    pub channel_count: usize,
}

/// A single point of the navigation time series
#[derive(Debug, Clone)]
#[derive(Deserialize, Serialize)]
pub struct NavigationRecord {
    /// Where the fix came from (NMEA sentence type or log file name)
    pub source: String,
    /// The time of the fix
    #[serde(with = "time::serde::timestamp")]
    pub timestamp: OffsetDateTime,
    /// Latitude in degrees, north positive
    pub latitude: Option<f64>,
    /// Longitude in degrees, east positive
    pub longitude: Option<f64>,
    /// Altitude in meters relative to the sentence's datum
    pub altitude: Option<f64>,
}

/// A single point of the attitude time series
#[derive(Debug, Clone)]
#[derive(Deserialize, Serialize)]
pub struct AttitudeRecord {
    /// Where the measurement came from (NMEA sentence type, or
    /// `"detected"` for the heave derived from bottom detections)
    pub source: String,
    /// The time of the measurement
    #[serde(with = "time::serde::timestamp")]
    pub timestamp: OffsetDateTime,
    /// Roll in degrees, starboard down positive
    pub roll: Option<f64>,
    /// Pitch in degrees, bow up positive
    pub pitch: Option<f64>,
    /// Heading in degrees east of north
    pub heading: Option<f64>,
    /// Heave in meters, up positive
    pub heave: Option<f64>,
}
