//! The CON0 configuration datagram
use crate::error::{Error, Result};
use crate::model::{InstallationParameters, SounderModel, TransducerInstallation};
use crate::parser::trimmed;
use binrw::binread;

/// A CON0 installation record: file-level names plus one calibration
/// block per installed transducer
#[binread]
#[br(little)]
#[derive(Debug, Clone, PartialEq)]
pub struct Con0 {
    #[br(count = 128, try_map = trimmed)]
    survey_name: String,
    #[br(count = 128, try_map = trimmed)]
    transect_name: String,
    #[br(count = 128, try_map = trimmed)]
    sounder_name: String,
    #[br(count = 30, try_map = trimmed)]
    version: String,
    #[br(pad_before = 98)]
    transducer_count: i32,
    #[br(count = transducer_count)]
    transducers: Vec<TransducerConfig>,
}

/// One transducer's calibration block within a CON0 record
#[binread]
#[br(little)]
#[derive(Debug, Clone, PartialEq)]
pub struct TransducerConfig {
    #[br(count = 128, try_map = trimmed)]
    channel_id: String,
    beam_type: i32,
    frequency: f32,
    gain: f32,
    equivalent_beam_angle: f32,
    beamwidth_alongship: f32,
    beamwidth_athwartship: f32,
    angle_sensitivity_alongship: f32,
    angle_sensitivity_athwartship: f32,
    angle_offset_alongship: f32,
    angle_offset_athwartship: f32,
    pos_x: f32,
    pos_y: f32,
    pos_z: f32,
    dir_x: f32,
    dir_y: f32,
    dir_z: f32,
    #[br(count = 5, pad_after = 8)]
    pulse_length_table: Vec<f32>,
    #[br(count = 5, pad_after = 8)]
    gain_table: Vec<f32>,
    #[br(count = 5, pad_after = 8)]
    sa_correction_table: Vec<f32>,
}

impl TransducerConfig {
    /// The full channel-id string
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Nominal frequency in Hz
    pub fn frequency(&self) -> f64 {
        f64::from(self.frequency)
    }
}

impl Con0 {
    /// Number of transducer calibration blocks in the record
    pub fn transducer_count(&self) -> usize {
        self.transducers.len()
    }

    /// The per-transducer calibration blocks
    pub fn transducers(&self) -> &[TransducerConfig] {
        &self.transducers
    }

    /// Build the one-time installation record sequential reading needs
    ///
    /// Serial numbers that fail to parse are logged and left empty; a
    /// bad channel-id string must not abort the read.
    pub fn installation(&self) -> InstallationParameters {
        let transducers = self
            .transducers
            .iter()
            .map(|t| {
                let serial_number = match serial_token(&t.channel_id) {
                    Ok(token) => u64::from_str_radix(token, 16).ok(),
                    Err(e) => {
                        tracing::warn!(channel_id = %t.channel_id, error = %e, "unparseable serial number");
                        None
                    }
                };
                TransducerInstallation {
                    channel_id: t.channel_id.clone(),
                    serial_number,
                    frequency: f64::from(t.frequency),
                    pos_x: f64::from(t.pos_x),
                    pos_y: f64::from(t.pos_y),
                    pos_z: f64::from(t.pos_z),
                    pulse_length_table: t.pulse_length_table.iter().map(|&v| f64::from(v)).collect(),
                    gain_table: t.gain_table.iter().map(|&v| f64::from(v)).collect(),
                    sa_correction_table: t
                        .sa_correction_table
                        .iter()
                        .map(|&v| f64::from(v))
                        .collect(),
                }
            })
            .collect();
        InstallationParameters {
            survey_name: self.survey_name.clone(),
            transect_name: self.transect_name.clone(),
            sounder_name: self.sounder_name.clone(),
            version: self.version.clone(),
            model: SounderModel::Ek60,
            transducers,
        }
    }
}

/// Extract the serial-number token from a channel-id string
///
/// Channel ids are space-delimited. Two layouts are in the wild: the
/// short three-token form carries the serial as the second-from-last
/// token, the six- and seven-token forms as the third-from-last. Any
/// other token count is unrecognized.
pub fn serial_token(channel_id: &str) -> Result<&str> {
    let tokens: Vec<&str> = channel_id.split_whitespace().collect();
    match tokens.len() {
        3 => Ok(tokens[tokens.len() - 2]),
        6 | 7 => Ok(tokens[tokens.len() - 3]),
        _ => Err(Error::SerialNumber(channel_id.to_string())),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn serial_from_three_tokens() {
        assert_eq!(serial_token("WBT 5426 ES200-7C").unwrap(), "5426");
    }

    #[test]
    fn serial_from_six_tokens() {
        assert_eq!(
            serial_token("GPT 38 kHz 009072033fa5 1-1 ES38B").unwrap(),
            "009072033fa5"
        );
    }

    #[test]
    fn serial_from_seven_tokens() {
        assert_eq!(
            serial_token("GPT 120 kHz Transducer 009072034295 4-1 ES120-7").unwrap(),
            "009072034295"
        );
    }

    #[test]
    fn serial_from_four_tokens_fails() {
        assert!(matches!(
            serial_token("GPT 38 kHz busted"),
            Err(Error::SerialNumber(_))
        ));
    }
}
