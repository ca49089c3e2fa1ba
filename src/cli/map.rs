//! Build and save the offset index of a raw file
use crate::error::Result;
use crate::mapper::FileMap;
use crate::parser::cursor::RawCursor;
use std::fs::File;
use std::io::{BufReader, BufWriter};

/// Index a raw file and save the finalized map
///
/// Without an explicit output path the map lands in the file's
/// side-car. A per-key entry count summary goes to stdout.
pub fn map(path: std::path::PathBuf, output: Option<std::path::PathBuf>) -> Result<()> {
    let f = File::open(&path)?;
    let mut cursor = RawCursor::new(BufReader::new(f))?;
    let mut map = FileMap::build(&mut cursor)?;
    map.finalize();

    let written = match output {
        Some(out) => {
            let writer = BufWriter::new(File::create(&out)?);
            serde_json::to_writer(writer, &map)?;
            out
        }
        None => map.save(&path)?,
    };

    println!("Map: {}", written.display());
    for (key, entries) in map.iter() {
        println!("\t{}\t{}", entries.len(), key);
    }
    Ok(())
}
