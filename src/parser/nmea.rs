//! The NME0 datagram: an NMEA-0183 style sentence
//!
//! Only the sentence subset a survey actually navigates by is parsed
//! into fields; everything else keeps its type so a mapper can still
//! route it. Malformed input never aborts the stream: it decodes to an
//! empty record.

/// Sentence types the decoder knows how to field-parse
pub const PARSED_SENTENCES: [&str; 9] = [
    "GGA", "GLL", "RMC", "HDT", "DTM", "VLW", "ZDA", "ALR", "PASHR",
];

/// A decoded NME0 record
///
/// Every field is optional; which ones are populated depends on the
/// sentence type. A malformed sentence leaves everything `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Nme0 {
    /// Two-character talker id
    pub talker: Option<String>,
    /// Sentence type, e.g. `"GGA"` or `"PASHR"`
    pub sentence_type: Option<String>,
    /// Latitude in degrees, north positive
    pub latitude: Option<f64>,
    /// Longitude in degrees, east positive
    pub longitude: Option<f64>,
    /// Antenna altitude in meters (GGA)
    pub altitude: Option<f64>,
    /// True heading in degrees (HDT, PASHR)
    pub heading: Option<f64>,
    /// Roll in degrees (PASHR)
    pub roll: Option<f64>,
    /// Pitch in degrees (PASHR)
    pub pitch: Option<f64>,
    /// Heave in meters (PASHR)
    pub heave: Option<f64>,
    /// Speed over ground in m/s (RMC)
    pub speed: Option<f64>,
}

const KNOTS_TO_MPS: f64 = 0.514444;

impl Nme0 {
    /// Decode an NME0 payload
    pub fn parse(payload: &[u8]) -> Nme0 {
        let text = String::from_utf8_lossy(payload);
        let sentence = text.trim_end_matches('\0').trim();
        let mut rec = Nme0::default();

        if !sentence.starts_with('$') {
            return rec;
        }
        let body = match sentence.find('*') {
            Some(i) => &sentence[..i],
            None => sentence,
        };
        let fields: Vec<&str> = body.split(',').collect();
        let id = fields[0].trim_start_matches('$');
        if id.len() < 5 {
            return rec;
        }
        let stype = if id.ends_with("PASHR") {
            "PASHR".to_string()
        } else {
            id[id.len() - 3..].to_string()
        };
        if !PARSED_SENTENCES.contains(&stype.as_str()) {
            return rec;
        }
        rec.talker = Some(id[..id.len() - stype.len()].to_string());
        rec.sentence_type = Some(stype.clone());

        match stype.as_str() {
            "GGA" => {
                rec.latitude = angle(&fields, 2, 3);
                rec.longitude = angle(&fields, 4, 5);
                rec.altitude = number(&fields, 9);
            }
            "GLL" => {
                rec.latitude = angle(&fields, 1, 2);
                rec.longitude = angle(&fields, 3, 4);
            }
            "RMC" => {
                rec.latitude = angle(&fields, 3, 4);
                rec.longitude = angle(&fields, 5, 6);
                rec.speed = number(&fields, 7).map(|kn| kn * KNOTS_TO_MPS);
            }
            "HDT" => {
                rec.heading = number(&fields, 1);
            }
            "PASHR" => {
                rec.heading = number(&fields, 2);
                rec.roll = number(&fields, 4);
                rec.pitch = number(&fields, 5);
                rec.heave = number(&fields, 6);
            }
            // recognized, no positional fields worth keeping
            _ => {}
        }
        rec
    }
}

fn number(fields: &[&str], index: usize) -> Option<f64> {
    fields.get(index).and_then(|v| v.trim().parse().ok())
}

/// Decode a `ddmm.mmmm` / hemisphere field pair into signed degrees
fn angle(fields: &[&str], value_index: usize, hemi_index: usize) -> Option<f64> {
    let raw: f64 = fields.get(value_index)?.trim().parse().ok()?;
    let degrees = (raw / 100.0).trunc();
    let minutes = raw - degrees * 100.0;
    let value = degrees + minutes / 60.0;
    match fields.get(hemi_index)?.trim() {
        "N" | "E" => Some(value),
        "S" | "W" => Some(-value),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_gga() {
        let rec = Nme0::parse(b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47");
        assert_eq!(rec.sentence_type.as_deref(), Some("GGA"));
        assert_eq!(rec.talker.as_deref(), Some("GP"));
        let lat = rec.latitude.unwrap();
        assert!((lat - 48.1173).abs() < 1e-4);
        let lon = rec.longitude.unwrap();
        assert!((lon - 11.5166).abs() < 1e-3);
        assert_eq!(rec.altitude, Some(545.4));
    }

    #[test]
    fn parse_rmc_southern_hemisphere() {
        let rec = Nme0::parse(b"$GPRMC,081836,A,3751.65,S,14507.36,E,000.0,360.0,130998,011.3,E*62");
        assert!(rec.latitude.unwrap() < 0.0);
        assert!(rec.longitude.unwrap() > 0.0);
        assert_eq!(rec.speed, Some(0.0));
    }

    #[test]
    fn parse_pashr() {
        let rec = Nme0::parse(b"$PASHR,085335.000,204.32,T,-1.50,0.57,0.10,0.420,0.420,0.570,1,0*06");
        assert_eq!(rec.sentence_type.as_deref(), Some("PASHR"));
        assert_eq!(rec.heading, Some(204.32));
        assert_eq!(rec.roll, Some(-1.50));
        assert_eq!(rec.pitch, Some(0.57));
        assert_eq!(rec.heave, Some(0.10));
    }

    #[test]
    fn malformed_sentence_decodes_empty() {
        assert_eq!(Nme0::parse(b"not an nmea sentence"), Nme0::default());
        assert_eq!(Nme0::parse(b"$GP"), Nme0::default());
        // unknown type: recognized as nothing, no panic
        assert_eq!(Nme0::parse(b"$GPXYZ,1,2,3").sentence_type, None);
    }
}
