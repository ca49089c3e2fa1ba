//! Sequential reading of a raw datagram stream
//!
//! The reader consumes the stream in file order, bootstraps the
//! installation parameters from the first configuration datagram,
//! groups sibling sample datagrams that share a ping timestamp into
//! channel groups and hands the assembled power matrices to bottom
//! detection. Navigation and attitude are extracted inline from NME0
//! datagrams, or from sibling `*.gps.csv` logs when the stream carries
//! no usable position sentences.
use crate::algorithms::bottom_detection::{
    detect_group, heave_series, ChannelSounding, DetectionConfig, PingDetection,
};
use crate::error::{Error, Result};
use crate::model::{
    AttitudeRecord, InstallationParameters, NavigationRecord, PingRecord, SounderModel,
    TransducerInstallation,
};
use crate::parser::con0::serial_token;
use crate::parser::cursor::RawCursor;
use crate::parser::datagram::{
    next_datagram, resync_after_corrupt, ticks_to_datetime, DatagramBody,
};
use crate::parser::nmea::Nme0;
use crate::parser::raw::{Raw0, Raw3};
use crate::parser::xml0::{Xml0, XmlKind};
use ndarray::Array2;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek};
use std::path::{Path, PathBuf};

/// Default water sound speed when no environment record has arrived
const DEFAULT_SOUND_SPEED: f64 = 1500.0;

/// How many datagrams the position-source scan looks at
const NAV_SCAN_RECORDS: usize = 100;

/// Options for a sequential read
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// First byte of the read window; a nonzero value marks a chunked
    /// read that resynchronizes before consuming records
    pub start_ptr: u64,
    /// Exclusive end of the read window, `None` for end of file
    pub end_ptr: Option<u64>,
    /// Bottom-detection tuning
    pub detection: DetectionConfig,
}

/// Everything a sequential read produces
#[derive(Debug, Serialize)]
pub struct SurveyData {
    /// The installation parameters the file opened with
    pub installation: InstallationParameters,
    /// One record per closed channel group, in stream order
    pub pings: Vec<PingRecord>,
    /// Position time series, sorted by time
    pub navigation: Vec<NavigationRecord>,
    /// Attitude time series, sorted by time, including the heave
    /// derived from the detected ranges
    pub attitude: Vec<AttitudeRecord>,
}

/// A sequential reader over one raw file or byte stream
pub struct RawReader<R> {
    cursor: RawCursor<R>,
    path: Option<PathBuf>,
    options: ReadOptions,
}

impl RawReader<BufReader<File>> {
    /// Open a raw file for a full sequential read
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, ReadOptions::default())
    }

    /// Open a raw file with explicit options
    pub fn open_with<P: AsRef<Path>>(path: P, options: ReadOptions) -> Result<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let cursor = RawCursor::bounded(reader, options.start_ptr, options.end_ptr)?;
        Ok(RawReader {
            cursor,
            path: Some(path.as_ref().to_path_buf()),
            options,
        })
    }
}

impl<R: Read + Seek> RawReader<R> {
    /// Wrap an in-memory or otherwise anonymous byte stream
    ///
    /// Without a path there is no side-car navigation fallback; the
    /// stream must carry NMEA positions itself.
    pub fn new(reader: R, options: ReadOptions) -> Result<Self> {
        let cursor = RawCursor::bounded(reader, options.start_ptr, options.end_ptr)?;
        Ok(RawReader {
            cursor,
            path: None,
            options,
        })
    }

    /// Consume the window and assemble the survey records
    pub fn read_all(&mut self) -> Result<SurveyData> {
        let chunked = self.options.start_ptr > 0;

        // the configuration datagram opens the file, even when this
        // reader's window starts elsewhere
        self.cursor.seek(0)?;
        let first = next_datagram(&mut self.cursor)?.ok_or(Error::MissingInstallation)?;
        let installation = match first.decode()? {
            DatagramBody::Configuration(con0) => con0.installation(),
            DatagramBody::Xml(xml) if xml.kind == XmlKind::Configuration => {
                installation_from_xml(&xml)
            }
            _ => return Err(Error::MissingInstallation),
        };

        if chunked {
            self.cursor.seek(self.options.start_ptr)?;
            self.cursor.resync()?;
        }

        let nav_source = self.select_nav_source()?;
        let mut navigation = Vec::new();
        let nav_sentence = match nav_source {
            NavSource::Sentence(s) => Some(s),
            NavSource::External(records) => {
                navigation = records;
                None
            }
        };

        let mut attitude: Vec<AttitudeRecord> = Vec::new();
        let mut groups = Grouping::new(&installation, chunked);
        let mut sound_speed = DEFAULT_SOUND_SPEED;

        loop {
            let dg = match next_datagram(&mut self.cursor) {
                Ok(Some(dg)) => dg,
                Ok(None) => break,
                Err(Error::CorruptFrame { offset, lead, trail }) => {
                    tracing::warn!(offset, lead, trail, "corrupt frame, resynchronizing");
                    match resync_after_corrupt(&mut self.cursor, offset) {
                        Ok(_) => continue,
                        Err(Error::StartByteNotFound) => break,
                        Err(e) => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            };
            match dg.type_tag.as_str() {
                "RAW0" if installation.model == SounderModel::Ek60 => match dg.decode() {
                    Ok(DatagramBody::Sample0(raw)) => {
                        groups.feed_raw0(dg.ticks, raw, sound_speed);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(offset = dg.offset, error = %e, "undecodable RAW0 body, skipping");
                    }
                },
                "RAW3" if installation.model == SounderModel::Ek80 => match dg.decode() {
                    Ok(DatagramBody::Sample3(raw)) => {
                        groups.feed_raw3(dg.ticks, raw, sound_speed);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(offset = dg.offset, error = %e, "undecodable RAW3 body, skipping");
                    }
                },
                "XML0" => {
                    if let Ok(DatagramBody::Xml(xml)) = dg.decode() {
                        match xml.kind {
                            XmlKind::Parameter if installation.model == SounderModel::Ek80 => {
                                groups.feed_parameter(dg.ticks, xml, sound_speed);
                            }
                            XmlKind::Environment => {
                                if let Some(ss) = xml.get_f64("SoundSpeed") {
                                    sound_speed = ss;
                                }
                            }
                            // the bootstrap configuration was already taken
                            _ => {}
                        }
                    }
                }
                "NME0" => {
                    if let Ok(DatagramBody::Nmea(rec)) = dg.decode() {
                        route_nmea(
                            &rec,
                            dg.ticks,
                            nav_sentence.as_deref(),
                            &mut navigation,
                            &mut attitude,
                        );
                    }
                }
                _ => {}
            }
        }
        groups.finish(sound_speed);

        if navigation.is_empty() {
            return Err(Error::NoNavigationSource);
        }

        let pings = self.detect(&installation, &groups.closed, &mut attitude)?;

        navigation.sort_by_key(|r| r.timestamp);
        attitude.sort_by_key(|r| r.timestamp);

        Ok(SurveyData {
            installation,
            pings,
            navigation,
            attitude,
        })
    }

    /// Pick the position source by scanning the next ~100 datagrams
    ///
    /// NMEA sentences win in the fixed precedence GGA, RMC, GLL; with
    /// none present the reader falls back to `*.gps.csv` logs beside
    /// the input file.
    fn select_nav_source(&mut self) -> Result<NavSource> {
        let resume = self.cursor.tell()?;
        let mut present: Vec<String> = Vec::new();
        for _ in 0..NAV_SCAN_RECORDS {
            let dg = match next_datagram(&mut self.cursor) {
                Ok(Some(dg)) => dg,
                Ok(None) => break,
                Err(Error::CorruptFrame { offset, .. }) => {
                    if resync_after_corrupt(&mut self.cursor, offset).is_err() {
                        break;
                    }
                    continue;
                }
                Err(e) => return Err(e),
            };
            if dg.type_tag != "NME0" {
                continue;
            }
            if let Ok(DatagramBody::Nmea(rec)) = dg.decode() {
                if let Some(stype) = rec.sentence_type {
                    if !present.contains(&stype) {
                        present.push(stype);
                    }
                }
            }
        }
        self.cursor.seek(resume)?;

        for wanted in ["GGA", "RMC", "GLL"] {
            if present.iter().any(|s| s == wanted) {
                return Ok(NavSource::Sentence(wanted.to_string()));
            }
        }
        let external = match &self.path {
            Some(path) => load_position_logs(path)?,
            None => Vec::new(),
        };
        if external.is_empty() {
            return Err(Error::NoNavigationSource);
        }
        Ok(NavSource::External(external))
    }

    /// Run bottom detection over the closed groups and emit one
    /// record per group
    fn detect(
        &self,
        installation: &InstallationParameters,
        closed: &[ClosedGroup],
        attitude: &mut Vec<AttitudeRecord>,
    ) -> Result<Vec<PingRecord>> {
        let expected = installation.channel_count();
        let full: Vec<usize> = closed
            .iter()
            .enumerate()
            .filter(|(_, g)| g.channels.len() == expected && expected > 0)
            .map(|(i, _)| i)
            .collect();

        let mut detections: Vec<Option<PingDetection>> = vec![None; closed.len()];
        if !full.is_empty() {
            let soundings: Vec<ChannelSounding> = (0..expected)
                .map(|k| assemble_sounding(closed, &full, k))
                .collect();
            let per_ping = detect_group(&soundings, &self.options.detection)?;
            for (col, &gi) in full.iter().enumerate() {
                detections[gi] = per_ping.get(col).copied().flatten();
            }
        }

        // derived heave from the detected range series
        let mut times = Vec::new();
        let mut ranges = Vec::new();
        for (gi, det) in detections.iter().enumerate() {
            if let Some(d) = det {
                let t = ticks_to_datetime(closed[gi].ticks);
                times.push(t.unix_timestamp_nanos() as f64 / 1e9);
                ranges.push(closed[gi].sound_speed() * d.travel_time / 2.0);
            }
        }
        if times.len() > 1 {
            let heave = heave_series(&times, &ranges, &self.options.detection);
            for (i, &t) in times.iter().enumerate() {
                attitude.push(AttitudeRecord {
                    source: "detected".to_string(),
                    timestamp: time::OffsetDateTime::UNIX_EPOCH
                        + time::Duration::seconds_f64(t),
                    roll: None,
                    pitch: None,
                    heading: None,
                    heave: Some(heave[i]),
                });
            }
        }

        Ok(closed
            .iter()
            .zip(&detections)
            .map(|(g, det)| PingRecord {
                timestamp: ticks_to_datetime(g.ticks),
                frequencies: g.channels.iter().map(|c| c.frequency).collect(),
                travel_time: det.map(|d| d.travel_time),
                detection_frequency: det.map(|d| d.frequency),
                sound_speed: g.sound_speed(),
                along_angle: None,
                athwart_angle: None,
                quality_factor: det.map(|d| d.snr),
                channel_count: g.channels.len(),
            })
            .collect())
    }
}

enum NavSource {
    Sentence(String),
    External(Vec<NavigationRecord>),
}

/// One channel of a closed group
#[derive(Debug)]
struct ClosedChannel {
    frequency: f64,
    pulse_length: f64,
    sample_interval: f64,
    sound_speed: f64,
    power: Vec<f64>,
}

/// A channel group that has been closed and sorted by frequency
#[derive(Debug)]
pub(crate) struct ClosedGroup {
    ticks: u64,
    channels: Vec<ClosedChannel>,
}

impl ClosedGroup {
    fn sound_speed(&self) -> f64 {
        self.channels
            .first()
            .map_or(DEFAULT_SOUND_SPEED, |c| c.sound_speed)
    }
}

/// The open-group state machine of the sequential reader
///
/// The group in progress is explicit state here rather than a shared
/// "current packet" on the reader: each datagram is fed in and the
/// group closes when the timestamp moves on or the expected channel
/// count is reached.
struct Grouping {
    expected: usize,
    model: SounderModel,
    open: Option<OpenGroup>,
    leading: bool,
    closed: Vec<ClosedGroup>,
}

struct OpenGroup {
    ticks: u64,
    raw0: Vec<Raw0>,
    raw3: Vec<Raw3>,
    parameters: Vec<Xml0>,
}

impl Grouping {
    fn new(installation: &InstallationParameters, chunked: bool) -> Self {
        Grouping {
            expected: installation.channel_count(),
            model: installation.model,
            open: None,
            leading: chunked,
            closed: Vec::new(),
        }
    }

    fn feed_raw0(&mut self, ticks: u64, raw: Raw0, sound_speed: f64) {
        self.roll_over(ticks, sound_speed);
        let group = self.open.get_or_insert_with(|| OpenGroup::new(ticks));
        group.raw0.push(raw);
        self.close_if_complete(sound_speed);
    }

    fn feed_raw3(&mut self, ticks: u64, raw: Raw3, sound_speed: f64) {
        self.roll_over(ticks, sound_speed);
        let group = self.open.get_or_insert_with(|| OpenGroup::new(ticks));
        group.raw3.push(raw);
        self.close_if_complete(sound_speed);
    }

    fn feed_parameter(&mut self, ticks: u64, xml: Xml0, sound_speed: f64) {
        self.roll_over(ticks, sound_speed);
        let group = self.open.get_or_insert_with(|| OpenGroup::new(ticks));
        group.parameters.push(xml);
        self.close_if_complete(sound_speed);
    }

    /// Close the open group when a different ping timestamp arrives
    fn roll_over(&mut self, ticks: u64, sound_speed: f64) {
        if self.open.as_ref().is_some_and(|g| g.ticks != ticks) {
            self.close(sound_speed);
        }
    }

    fn close_if_complete(&mut self, sound_speed: f64) {
        let complete = match (&self.open, self.model) {
            (Some(g), SounderModel::Ek60) => g.raw0.len() >= self.expected,
            (Some(g), SounderModel::Ek80) => {
                g.raw3.len() >= self.expected && g.parameters.len() >= self.expected
            }
            (None, _) => false,
        };
        if complete {
            self.close(sound_speed);
        }
    }

    /// Flush the stream tail: whatever group is still open closes as-is
    fn finish(&mut self, sound_speed: f64) {
        self.close(sound_speed);
    }

    fn close(&mut self, sound_speed: f64) {
        let group = match self.open.take() {
            Some(g) => g,
            None => return,
        };
        let partial = match self.model {
            SounderModel::Ek60 => group.raw0.len() != self.expected,
            SounderModel::Ek80 => {
                group.raw3.len() != self.expected || group.parameters.len() != self.expected
            }
        };
        let leading = std::mem::replace(&mut self.leading, false);
        if partial && leading {
            // the head of this chunk's window caught the tail of a
            // group whose start belongs to the previous chunk
            tracing::debug!(ticks = group.ticks, "dropping partial leading group");
            return;
        }
        if partial {
            tracing::warn!(
                ticks = group.ticks,
                expected = self.expected,
                "channel group closed with a record count mismatch, processing best effort"
            );
        }
        let mut channels: Vec<ClosedChannel> = match self.model {
            SounderModel::Ek60 => group
                .raw0
                .iter()
                .map(|raw| ClosedChannel {
                    frequency: f64::from(raw.frequency),
                    pulse_length: f64::from(raw.pulse_length),
                    sample_interval: f64::from(raw.sample_interval),
                    sound_speed: f64::from(raw.sound_velocity),
                    power: raw.power_db().unwrap_or_default(),
                })
                .collect(),
            SounderModel::Ek80 => group
                .raw3
                .iter()
                .map(|raw| {
                    let param = group
                        .parameters
                        .iter()
                        .find(|p| p.channel_id() == Some(raw.channel_id.as_str()));
                    if param.is_none() {
                        tracing::warn!(
                            channel_id = %raw.channel_id,
                            "RAW3 record without a matching parameter record"
                        );
                    }
                    ClosedChannel {
                        frequency: param.and_then(|p| p.frequency()).unwrap_or(0.0),
                        pulse_length: param
                            .and_then(|p| p.get_f64("PulseDuration"))
                            .unwrap_or(0.0),
                        sample_interval: param
                            .and_then(|p| p.get_f64("SampleInterval"))
                            .unwrap_or(0.0),
                        sound_speed,
                        power: raw.power_db().unwrap_or_default(),
                    }
                })
                .collect(),
        };
        channels.sort_by(|a, b| a.frequency.total_cmp(&b.frequency));
        self.closed.push(ClosedGroup {
            ticks: group.ticks,
            channels,
        });
    }
}

impl OpenGroup {
    fn new(ticks: u64) -> Self {
        OpenGroup {
            ticks,
            raw0: Vec::new(),
            raw3: Vec::new(),
            parameters: Vec::new(),
        }
    }
}

/// Stack one channel's power columns across the full groups
fn assemble_sounding(closed: &[ClosedGroup], full: &[usize], k: usize) -> ChannelSounding {
    let template = &closed[full[0]].channels[k];
    let samples = full
        .iter()
        .map(|&gi| closed[gi].channels[k].power.len())
        .max()
        .unwrap_or(0);
    let mut power = Array2::from_elem((samples, full.len()), 0.0);
    for (col, &gi) in full.iter().enumerate() {
        let p = &closed[gi].channels[k].power;
        let fill = p.iter().cloned().fold(f64::INFINITY, f64::min);
        let fill = if fill.is_finite() { fill } else { 0.0 };
        for i in 0..samples {
            power[(i, col)] = p.get(i).copied().unwrap_or(fill);
        }
    }
    ChannelSounding {
        frequency: template.frequency,
        pulse_length: template.pulse_length,
        sample_interval: template.sample_interval,
        sound_speed: template.sound_speed,
        power,
    }
}

/// Route one NMEA record into the navigation or attitude series
fn route_nmea(
    rec: &Nme0,
    ticks: u64,
    nav_sentence: Option<&str>,
    navigation: &mut Vec<NavigationRecord>,
    attitude: &mut Vec<AttitudeRecord>,
) {
    let stype = match &rec.sentence_type {
        Some(s) => s.as_str(),
        None => return,
    };
    let timestamp = ticks_to_datetime(ticks);
    if Some(stype) == nav_sentence {
        navigation.push(NavigationRecord {
            source: stype.to_string(),
            timestamp,
            latitude: rec.latitude,
            longitude: rec.longitude,
            altitude: rec.altitude,
        });
    }
    if matches!(stype, "HDT" | "PASHR") {
        attitude.push(AttitudeRecord {
            source: stype.to_string(),
            timestamp,
            roll: rec.roll,
            pitch: rec.pitch,
            heading: rec.heading,
            heave: rec.heave,
        });
    }
}

/// Build installation parameters from an XML0 Configuration document
pub fn installation_from_xml(xml: &Xml0) -> InstallationParameters {
    let transducers = xml
        .channel_ids()
        .into_iter()
        .map(|channel_id| {
            let serial_number = match serial_token(channel_id) {
                Ok(token) => u64::from_str_radix(token, 16).ok(),
                Err(e) => {
                    tracing::warn!(channel_id, error = %e, "unparseable serial number");
                    None
                }
            };
            TransducerInstallation {
                channel_id: channel_id.to_string(),
                serial_number,
                frequency: 0.0,
                pos_x: 0.0,
                pos_y: 0.0,
                pos_z: 0.0,
                pulse_length_table: Vec::new(),
                gain_table: Vec::new(),
                sa_correction_table: Vec::new(),
            }
        })
        .collect();
    InstallationParameters {
        survey_name: xml.get("SurveyName").unwrap_or_default().to_string(),
        transect_name: xml.get("TransectName").unwrap_or_default().to_string(),
        sounder_name: xml.get("ApplicationName").unwrap_or_default().to_string(),
        version: xml.get("Version").unwrap_or_default().to_string(),
        model: SounderModel::Ek80,
        transducers,
    }
}

/// Load and merge every `*.gps.csv` log beside the input file
///
/// Rows are `unix_time,latitude,longitude[,altitude]`; lines that do
/// not parse (headers, blanks) are skipped. The merged series is
/// sorted by time.
fn load_position_logs(source: &Path) -> Result<Vec<NavigationRecord>> {
    let dir = source.parent().unwrap_or_else(|| Path::new("."));
    let mut records = Vec::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Ok(records),
    };
    for entry in entries {
        let path = entry?.path();
        let name = match path.file_name() {
            Some(n) => n.to_string_lossy().into_owned(),
            None => continue,
        };
        if !name.ends_with(".gps.csv") {
            continue;
        }
        let reader = BufReader::new(File::open(&path)?);
        for line in reader.lines() {
            let line = line?;
            let mut fields = line.split(',').map(str::trim);
            let (time, lat, lon) = match (fields.next(), fields.next(), fields.next()) {
                (Some(t), Some(la), Some(lo)) => (t, la, lo),
                _ => continue,
            };
            let (Ok(time), Ok(lat), Ok(lon)) =
                (time.parse::<f64>(), lat.parse::<f64>(), lon.parse::<f64>())
            else {
                continue;
            };
            let altitude = fields.next().and_then(|a| a.parse().ok());
            records.push(NavigationRecord {
                source: name.clone(),
                timestamp: time::OffsetDateTime::UNIX_EPOCH
                    + time::Duration::seconds_f64(time),
                latitude: Some(lat),
                longitude: Some(lon),
                altitude,
            });
        }
    }
    records.sort_by_key(|r| r.timestamp);
    Ok(records)
}
