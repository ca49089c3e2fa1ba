//! Error types for raw-file reading

use thiserror::Error;

/// Errors produced while reading, mapping or post-processing a raw file
#[derive(Debug, Error)]
pub enum Error {
    /// The leading and trailing length fields of a frame disagree
    #[error("corrupt frame at byte {offset}: leading length {lead} != trailing length {trail}")]
    CorruptFrame {
        /// Byte offset of the frame's length field
        offset: u64,
        /// Length field at the start of the frame
        lead: u32,
        /// Length field at the end of the frame
        trail: u32,
    },

    /// A resync scan exhausted its window without finding a known type tag
    #[error("no datagram start found before the search bound was exhausted")]
    StartByteNotFound,

    /// The stream did not open with a CON0 or XML0 Configuration datagram
    #[error("no installation parameters: the first datagram must be CON0 or an XML0 Configuration")]
    MissingInstallation,

    /// Channels grouped into one ping report different sampling intervals
    #[error("sampling interval differs across channels in one ping group: {0} != {1}")]
    SamplingIntervalMismatch(f64, f64),

    /// Neither NMEA sentences nor a sibling position log could provide navigation
    #[error("no navigation source: no usable NMEA sentences and no *.gps.csv log found")]
    NoNavigationSource,

    /// A file-map lookup failed
    #[error("no record for key {key:?} at index {index}")]
    RecordNotFound {
        /// The map key that was queried
        key: String,
        /// The chronological index that was queried
        index: usize,
    },

    /// A channel-id string did not match any known serial-number pattern
    #[error("cannot parse a serial number from channel id {0:?}")]
    SerialNumber(String),

    /// An underlying binary parse failed
    #[error(transparent)]
    BinRw(#[from] binrw::Error),

    /// An underlying I/O operation failed
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Side-car map (de)serialization failed
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;
