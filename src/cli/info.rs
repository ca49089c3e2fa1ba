//! Print a summary of a raw file
use crate::error::{Error, Result};
use crate::mapper::FileMap;
use crate::model::{InstallationParameters, SounderModel};
use crate::parser::cursor::RawCursor;
use crate::parser::datagram::{next_datagram, DatagramBody};
use crate::parser::xml0::XmlKind;
use crate::reader::installation_from_xml;
use std::io::BufReader;
use time::OffsetDateTime;

/// Print the installation, the record counts and the time span of a
/// raw file
pub fn info<P: AsRef<std::path::Path>>(path: P) -> Result<()> {
    let f = std::fs::File::open(path.as_ref())?;
    let mut cursor = RawCursor::new(BufReader::new(f))?;

    let first = next_datagram(&mut cursor)?.ok_or(Error::MissingInstallation)?;
    let installation: InstallationParameters = match first.decode()? {
        DatagramBody::Configuration(con0) => con0.installation(),
        DatagramBody::Xml(xml) if xml.kind == XmlKind::Configuration => {
            installation_from_xml(&xml)
        }
        _ => return Err(Error::MissingInstallation),
    };

    let mut map = FileMap::build(&mut cursor)?;
    map.finalize();

    let mut start_date = OffsetDateTime::now_utc();
    let mut end_date = OffsetDateTime::UNIX_EPOCH;
    for (_, entries) in map.iter() {
        for entry in entries {
            let t = entry.timestamp();
            if t < start_date {
                start_date = t;
            }
            if t > end_date {
                end_date = t;
            }
        }
    }

    println!("File: {}", path.as_ref().display());
    println!(
        "Model: {}",
        match installation.model {
            SounderModel::Ek60 => "EK60",
            SounderModel::Ek80 => "EK80",
        }
    );
    println!("Survey: {}", installation.survey_name);
    println!("Transect: {}", installation.transect_name);
    println!("Sounder: {}", installation.sounder_name);
    println!("Version: {}", installation.version);
    println!("Start date: {}", start_date);
    println!("End date: {}", end_date);
    println!("Channels:");
    for t in &installation.transducers {
        match t.serial_number {
            Some(serial) => println!("\t{} (serial {:x})", t.channel_id, serial),
            None => println!("\t{}", t.channel_id),
        }
    }
    println!("Datagrams:");
    for (key, entries) in map.iter() {
        println!("\t{}\t{}", entries.len(), key);
    }

    Ok(())
}
