//! Parsing the EK raw datagram format
pub mod con0;
pub mod cursor;
pub mod datagram;
pub mod nmea;
pub mod raw;
pub mod xml0;

/// Decode a fixed-width, null-padded field into a trimmed string
pub(crate) fn trimmed(x: Vec<u8>) -> Result<String, std::string::FromUtf8Error> {
    String::from_utf8(x).map(|s| s.trim_end_matches('\0').trim().to_string())
}
