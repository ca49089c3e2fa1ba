//! Sequential read with bottom detection, emitted as JSON
use crate::error::Result;
use crate::reader::{RawReader, ReadOptions};
use std::io::{stdout, BufWriter};

/// Read a raw file's window, run detection and write the survey
/// records as one JSON document
pub fn detect(
    path: std::path::PathBuf,
    output: Option<std::path::PathBuf>,
    start_ptr: u64,
    end_ptr: Option<u64>,
    snr_threshold: Option<f64>,
) -> Result<()> {
    let mut options = ReadOptions {
        start_ptr,
        end_ptr,
        ..ReadOptions::default()
    };
    if let Some(snr) = snr_threshold {
        options.detection.snr_threshold = snr;
    }

    let mut reader = RawReader::open_with(&path, options)?;
    let data = reader.read_all()?;
    tracing::info!(
        pings = data.pings.len(),
        detections = data.pings.iter().filter(|p| p.travel_time.is_some()).count(),
        navigation = data.navigation.len(),
        attitude = data.attitude.len(),
        "read {}",
        path.display()
    );

    match output {
        Some(out) => {
            let writer = BufWriter::new(std::fs::File::create(out)?);
            serde_json::to_writer(writer, &data)?;
        }
        None => {
            let writer = stdout().lock();
            serde_json::to_writer(writer, &data)?;
        }
    };
    Ok(())
}
