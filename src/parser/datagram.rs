//! Framed datagram reading and type dispatch
use crate::error::{Error, Result};
use crate::parser::con0::Con0;
use crate::parser::cursor::RawCursor;
use crate::parser::nmea::Nme0;
use crate::parser::raw::{Raw0, Raw3};
use crate::parser::xml0::Xml0;
use binrw::{BinRead, BinReaderExt};
use std::io::{Read, Seek};
use time::OffsetDateTime;

/// Bytes of the in-frame header (type tag plus timestamp ticks)
pub const HEADER_LEN: u32 = 12;

/// Seconds between the 1601-01-01 tick epoch and the POSIX epoch
const EPOCH_DELTA_SECONDS: i128 = 11_644_473_600;

/// Convert 100 ns ticks since 1601-01-01 to a UTC datetime
pub fn ticks_to_datetime(ticks: u64) -> OffsetDateTime {
    let unix_nanos = ticks as i128 * 100 - EPOCH_DELTA_SECONDS * 1_000_000_000;
    OffsetDateTime::from_unix_timestamp_nanos(unix_nanos).unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

/// One framed record, header decoded, body still raw
///
/// Body decoding is deferred: a mapping pass only needs the type tag,
/// offset and timestamp, so [`decode`](Datagram::decode) is called only
/// when the caller actually wants the structured record.
#[derive(Debug, Clone)]
pub struct Datagram {
    /// Byte offset of the frame's leading length field
    pub offset: u64,
    /// Body length from the frame header
    pub length: u32,
    /// Four-character type tag
    pub type_tag: String,
    /// Raw timestamp in 100 ns ticks since 1601-01-01
    pub ticks: u64,
    /// Body bytes after the tag and timestamp
    pub payload: Vec<u8>,
}

/// The decoded body of a datagram
#[derive(Debug, Clone)]
pub enum DatagramBody {
    /// CON0 installation and calibration record
    Configuration(Con0),
    /// RAW0 (EK60) sample record
    Sample0(Raw0),
    /// RAW3 (EK80) sample record
    Sample3(Raw3),
    /// XML0 parameter/environment/configuration document
    Xml(Xml0),
    /// NME0 navigation or attitude sentence
    Nmea(Nme0),
    /// TAG0 free-text annotation
    Annotation(String),
    /// A tag without a registered decoder; the stream continues
    Undecoded,
}

impl Datagram {
    /// The frame timestamp as a UTC datetime
    pub fn timestamp(&self) -> OffsetDateTime {
        ticks_to_datetime(self.ticks)
    }

    /// Decode the body according to the type tag
    ///
    /// Unknown tags are not an error: they decode to
    /// [`DatagramBody::Undecoded`] with a warning so a scan never
    /// stops on a record it merely does not understand.
    pub fn decode(&self) -> Result<DatagramBody> {
        let mut cur = std::io::Cursor::new(self.payload.as_slice());
        let body = match self.type_tag.as_str() {
            "CON0" => DatagramBody::Configuration(Con0::read(&mut cur)?),
            "RAW0" => DatagramBody::Sample0(Raw0::read(&mut cur)?),
            "RAW3" => DatagramBody::Sample3(Raw3::read(&mut cur)?),
            "XML0" => DatagramBody::Xml(Xml0::parse(&self.payload)),
            "NME0" => DatagramBody::Nmea(Nme0::parse(&self.payload)),
            "TAG0" => DatagramBody::Annotation(
                String::from_utf8_lossy(&self.payload)
                    .trim_end_matches('\0')
                    .to_string(),
            ),
            tag => {
                tracing::warn!(tag, offset = self.offset, "no decoder for datagram type");
                DatagramBody::Undecoded
            }
        };
        Ok(body)
    }
}

/// Read the next frame from the cursor
///
/// Returns `Ok(None)` at the window bound or when a frame sticks out
/// past `end_ptr` while still fitting the underlying stream (a frame
/// cut by the window belongs to the next chunk's reader).
///
/// # Errors
///
/// [`Error::CorruptFrame`] when the trailing length field does not
/// repeat the leading one, or when the leading length cannot hold the
/// in-frame header, or when it reaches past the end of the stream
/// itself. The caller recovers with [`resync_after_corrupt`].
pub fn next_datagram<R: Read + Seek>(cursor: &mut RawCursor<R>) -> Result<Option<Datagram>> {
    let offset = cursor.tell()?;
    if cursor.remaining()? < (HEADER_LEN + 8) as u64 {
        return Ok(None);
    }
    let stream_len = cursor.stream_len();
    let reader = cursor.get_mut();
    let length: u32 = reader.read_le()?;
    if length < HEADER_LEN || offset + 8 + length as u64 > stream_len {
        return Err(Error::CorruptFrame {
            offset,
            lead: length,
            trail: 0,
        });
    }
    if cursor.remaining()? < length as u64 + 4 {
        return Ok(None);
    }
    let reader = cursor.get_mut();
    let tag: [u8; 4] = reader.read_le()?;
    let ticks: u64 = reader.read_le()?;
    let mut payload = vec![0u8; (length - HEADER_LEN) as usize];
    reader.read_exact(&mut payload)?;
    let trail: u32 = reader.read_le()?;
    if trail != length {
        return Err(Error::CorruptFrame {
            offset,
            lead: length,
            trail,
        });
    }
    Ok(Some(Datagram {
        offset,
        length,
        type_tag: String::from_utf8_lossy(&tag).into_owned(),
        ticks,
        payload,
    }))
}

/// Recover from a corrupt frame at `offset`
///
/// Skips past the frame's (valid-looking) tag bytes and resynchronizes
/// to the next known tag, so the scan continues from the next aligned
/// record. A bounded loop in the caller replaces the recursive retry
/// this format's readers traditionally use.
pub fn resync_after_corrupt<R: Read + Seek>(
    cursor: &mut RawCursor<R>,
    offset: u64,
) -> Result<u64> {
    cursor.seek(offset + 8)?;
    cursor.resync()
}
