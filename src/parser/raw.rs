//! RAW0 (EK60) and RAW3 (EK80) sample datagrams
use crate::parser::trimmed;
use binrw::binread;

/// dB per count of the int16 power samples
pub const POWER_SCALE: f64 = 10.0 * std::f64::consts::LOG10_2 / 256.0;

/// Electrical degrees per count of the int8 angle samples
pub const ANGLE_SCALE: f64 = 180.0 / 128.0;

/// One split-beam angle sample
#[binread]
#[br(little)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnglePair {
    /// Athwartship angle count
    pub athwartship: i8,
    /// Alongship angle count
    pub alongship: i8,
}

/// One complex sample component pair
#[binread]
#[br(little)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComplexSample {
    /// Real part
    pub re: f32,
    /// Imaginary part
    pub im: f32,
}

/// An EK60 sample datagram
///
/// The mode bitmask gates the trailing arrays: bit 0 for power
/// samples, bit 1 for split-beam angle samples.
#[binread]
#[br(little)]
#[derive(Debug, Clone, PartialEq)]
pub struct Raw0 {
    /// One-based channel number
    pub channel: i16,
    /// Sample layout bitmask
    pub mode: i16,
    /// Transducer depth in meters
    pub transducer_depth: f32,
    /// Frequency in Hz
    pub frequency: f32,
    /// Transmit power in W
    pub transmit_power: f32,
    /// Pulse length in seconds
    pub pulse_length: f32,
    /// Bandwidth in Hz
    pub bandwidth: f32,
    /// Sample interval in seconds
    pub sample_interval: f32,
    /// Sound velocity in m/s
    pub sound_velocity: f32,
    /// Absorption coefficient in dB/m
    pub absorption_coefficient: f32,
    /// Heave snapshot in meters
    pub heave: f32,
    /// Roll snapshot in degrees
    pub roll: f32,
    /// Pitch snapshot in degrees
    pub pitch: f32,
    /// Water temperature in degrees C
    #[br(pad_after = 12)]
    pub temperature: f32,
    /// First sample of this datagram within the ping
    pub offset: i32,
    /// Number of samples
    pub sample_count: i32,
    #[br(if(mode & 0x1 != 0), count = sample_count)]
    power: Option<Vec<i16>>,
    #[br(if(mode & 0x2 != 0), count = sample_count)]
    angle: Option<Vec<AnglePair>>,
}

impl Raw0 {
    /// Power samples in dB, when the mode includes them
    pub fn power_db(&self) -> Option<Vec<f64>> {
        self.power
            .as_ref()
            .map(|p| p.iter().map(|&v| f64::from(v) * POWER_SCALE).collect())
    }

    /// Split-beam angles in electrical degrees `(athwartship,
    /// alongship)`, when the mode includes them
    pub fn angles_deg(&self) -> Option<Vec<(f64, f64)>> {
        self.angle.as_ref().map(|a| {
            a.iter()
                .map(|s| {
                    (
                        f64::from(s.athwartship) * ANGLE_SCALE,
                        f64::from(s.alongship) * ANGLE_SCALE,
                    )
                })
                .collect()
        })
    }
}

/// An EK80 sample datagram
///
/// Channels are identified by the channel-id string rather than a
/// number. `mode_low` selects the sample layout: values below 8 are
/// the power/angle layout of the EK60, bit 3 switches to complex
/// samples with `mode_high` components per sample.
#[binread]
#[br(little)]
#[derive(Debug, Clone, PartialEq)]
pub struct Raw3 {
    /// The channel-id string naming the transducer
    #[br(count = 128, try_map = trimmed)]
    pub channel_id: String,
    /// Sample layout selector
    pub mode_low: u8,
    /// Complex components per sample when in complex mode
    #[br(pad_after = 2)]
    pub mode_high: u8,
    /// First sample of this datagram within the ping
    pub offset: i32,
    /// Number of samples
    pub sample_count: i32,
    #[br(if(mode_low & 0x8 == 0 && mode_low & 0x1 != 0), count = sample_count)]
    power: Option<Vec<i16>>,
    #[br(if(mode_low & 0x8 == 0 && mode_low & 0x2 != 0), count = sample_count)]
    angle: Option<Vec<AnglePair>>,
    #[br(if(mode_low & 0x8 != 0), count = sample_count * mode_high as i32)]
    complex: Option<Vec<ComplexSample>>,
}

impl Raw3 {
    /// Power samples in dB
    ///
    /// Power-layout samples are scaled like RAW0; complex-layout
    /// samples are reduced to dB from the mean squared magnitude of
    /// their components.
    pub fn power_db(&self) -> Option<Vec<f64>> {
        if let Some(p) = &self.power {
            return Some(p.iter().map(|&v| f64::from(v) * POWER_SCALE).collect());
        }
        let complex = self.complex.as_ref()?;
        let n = usize::from(self.mode_high).max(1);
        Some(
            complex
                .chunks(n)
                .map(|row| {
                    let mean_sq = row
                        .iter()
                        .map(|s| f64::from(s.re).powi(2) + f64::from(s.im).powi(2))
                        .sum::<f64>()
                        / row.len() as f64;
                    10.0 * mean_sq.max(f64::MIN_POSITIVE).log10()
                })
                .collect(),
        )
    }

    /// Split-beam angles in electrical degrees `(athwartship,
    /// alongship)`, when present
    pub fn angles_deg(&self) -> Option<Vec<(f64, f64)>> {
        self.angle.as_ref().map(|a| {
            a.iter()
                .map(|s| {
                    (
                        f64::from(s.athwartship) * ANGLE_SCALE,
                        f64::from(s.alongship) * ANGLE_SCALE,
                    )
                })
                .collect()
        })
    }

    /// The complex sample matrix shaped `(samples, components)`
    pub fn complex_samples(&self) -> Option<Vec<&[ComplexSample]>> {
        let complex = self.complex.as_ref()?;
        let n = usize::from(self.mode_high).max(1);
        Some(complex.chunks(n).collect())
    }
}
