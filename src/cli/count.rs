//! Count the datagrams in a raw file by type
use crate::error::{Error, Result};
use crate::parser::cursor::RawCursor;
use crate::parser::datagram::{next_datagram, resync_after_corrupt};
use std::collections::BTreeMap;
use std::io::{stdout, BufReader, Read, Seek, Write};

fn count_datagrams<R: Read + Seek>(cursor: &mut RawCursor<R>) -> Result<BTreeMap<String, i64>> {
    let mut counts = BTreeMap::new();
    loop {
        let dg = match next_datagram(cursor) {
            Ok(Some(dg)) => dg,
            Ok(None) => break,
            Err(Error::CorruptFrame { offset, .. }) => {
                tracing::warn!(offset, "corrupt frame while counting, resynchronizing");
                match resync_after_corrupt(cursor, offset) {
                    Ok(_) => continue,
                    Err(Error::StartByteNotFound) => break,
                    Err(e) => return Err(e),
                }
            }
            Err(e) => return Err(e),
        };
        *counts.entry(dg.type_tag).or_insert(0) += 1;
    }
    Ok(counts)
}

/// Count datagrams by type tag and print one `count\ttag` line each
pub fn count(path: std::path::PathBuf, output: Option<std::path::PathBuf>) -> Result<()> {
    let f = std::fs::File::open(path)?;
    let mut cursor = RawCursor::new(BufReader::new(f))?;
    let counts = count_datagrams(&mut cursor)?;

    match output {
        Some(path) => {
            let mut writer = std::fs::File::create(path)?;
            for (key, value) in &counts {
                writeln!(writer, "{}\t{}", value, key)?;
            }
        }
        None => {
            let mut writer = stdout().lock();
            for (key, value) in &counts {
                writeln!(writer, "{}\t{}", value, key)?;
            }
        }
    };
    Ok(())
}
