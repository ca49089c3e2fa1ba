//! Byte-offset indexing of raw files
//!
//! A [`FileMap`] is built in one linear pass and maps a record key to
//! the chronologically ordered byte offsets of its datagrams, so a
//! consumer can seek straight to the n-th record of a type without
//! re-scanning the file.
use crate::error::{Error, Result};
use crate::parser::cursor::RawCursor;
use crate::parser::datagram::{next_datagram, resync_after_corrupt, ticks_to_datetime, Datagram, DatagramBody};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// One indexed datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct MapEntry {
    /// Byte offset of the frame's length field
    pub offset: u64,
    /// Raw timestamp in 100 ns ticks since 1601-01-01
    pub ticks: u64,
    /// Channel number, for keys routed by channel (RAW0)
    pub channel: Option<i32>,
}

impl MapEntry {
    /// The entry's timestamp as a UTC datetime
    pub fn timestamp(&self) -> OffsetDateTime {
        ticks_to_datetime(self.ticks)
    }
}

/// A byte-offset index over one raw file's datagrams
///
/// Keys are type tags, except for the records a consumer looks up by
/// sub-type: `RAW0` entries carry their channel number, `RAW3`
/// datagrams are keyed by their channel-id string and `NME0` datagrams
/// by their three-letter sentence type. After [`finalize`]
/// (FileMap::finalize) each key's entries are sorted ascending by
/// timestamp; the map is a terminal artifact and is not updated
/// afterwards.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct FileMap {
    entries: BTreeMap<String, Vec<MapEntry>>,
    finalized: bool,
}

impl FileMap {
    /// Build a map with one linear pass over the cursor's window
    ///
    /// Headers are decoded for every frame; bodies only where the key
    /// needs body content (channel routing). Corrupt frames are logged
    /// and skipped by resynchronizing to the next aligned record.
    pub fn build<R: Read + Seek>(cursor: &mut RawCursor<R>) -> Result<FileMap> {
        let mut map = FileMap::default();
        cursor.rewind()?;
        loop {
            let dg = match next_datagram(cursor) {
                Ok(Some(dg)) => dg,
                Ok(None) => break,
                Err(Error::CorruptFrame { offset, lead, trail }) => {
                    tracing::warn!(offset, lead, trail, "corrupt frame while mapping, resynchronizing");
                    match resync_after_corrupt(cursor, offset) {
                        Ok(_) => continue,
                        Err(Error::StartByteNotFound) => break,
                        Err(e) => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            };
            let (key, channel) = map_key(&dg);
            map.entries.entry(key).or_default().push(MapEntry {
                offset: dg.offset,
                ticks: dg.ticks,
                channel,
            });
        }
        Ok(map)
    }

    /// Sort every key's entries ascending by timestamp
    ///
    /// Idempotent; the sort is stable so same-timestamp siblings keep
    /// their file order.
    pub fn finalize(&mut self) {
        for entries in self.entries.values_mut() {
            entries.sort_by_key(|e| e.ticks);
        }
        self.finalized = true;
    }

    /// Whether [`finalize`](FileMap::finalize) has run
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// The byte offset of the `index`-th chronological record of `key`
    pub fn lookup(&self, key: &str, index: usize) -> Result<u64> {
        self.entries
            .get(key)
            .and_then(|entries| entries.get(index))
            .map(|e| e.offset)
            .ok_or_else(|| Error::RecordNotFound {
                key: key.to_string(),
                index,
            })
    }

    /// The entries recorded under `key`
    pub fn get(&self, key: &str) -> Option<&[MapEntry]> {
        self.entries.get(key).map(|v| v.as_slice())
    }

    /// Iterate over `(key, entries)` pairs, sorted by key
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[MapEntry])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// The keys present in the map, sorted
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    /// Total number of indexed datagrams
    pub fn len(&self) -> usize {
        self.entries.values().map(|v| v.len()).sum()
    }

    /// Whether the map holds no entries at all
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The side-car path for a source file: its file name with the
    /// final three characters replaced by `nav`
    pub fn sidecar_path(source: &Path) -> PathBuf {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let keep = name.chars().count().saturating_sub(3);
        let stem: String = name.chars().take(keep).collect();
        source.with_file_name(format!("{stem}nav"))
    }

    /// Serialize the map to the side-car of `source`
    pub fn save(&self, source: &Path) -> Result<PathBuf> {
        let path = Self::sidecar_path(source);
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer(writer, self)?;
        Ok(path)
    }

    /// Load the side-car of `source`
    ///
    /// A pure structural read; the map is trusted and never validated
    /// against the live file, so a stale side-car silently yields
    /// wrong offsets.
    pub fn load(source: &Path) -> Result<FileMap> {
        let path = Self::sidecar_path(source);
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// The map key and optional channel extra for one datagram
fn map_key(dg: &Datagram) -> (String, Option<i32>) {
    match dg.type_tag.as_str() {
        "RAW0" => match dg.decode() {
            Ok(DatagramBody::Sample0(raw)) => (dg.type_tag.clone(), Some(i32::from(raw.channel))),
            _ => {
                tracing::warn!(offset = dg.offset, "undecodable RAW0 body while mapping");
                (dg.type_tag.clone(), None)
            }
        },
        "RAW3" => match dg.decode() {
            Ok(DatagramBody::Sample3(raw)) => (raw.channel_id, None),
            _ => {
                tracing::warn!(offset = dg.offset, "undecodable RAW3 body while mapping");
                (dg.type_tag.clone(), None)
            }
        },
        "NME0" => match dg.decode() {
            Ok(DatagramBody::Nmea(rec)) => (
                rec.sentence_type.unwrap_or_else(|| dg.type_tag.clone()),
                None,
            ),
            _ => (dg.type_tag.clone(), None),
        },
        tag => (tag.to_string(), None),
    }
}
