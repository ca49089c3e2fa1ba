//! The XML0 datagram: a structured text document
//!
//! EK80 files embed machine-generated XML with all data carried in
//! element attributes. The documents are flat and regular enough that
//! a small scanner is sufficient; the decoder flattens every
//! attribute of every element into one ordered key/value list,
//! renaming colliding keys with a positional suffix.

/// The recognized document roots
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlKind {
    /// One-time installation and transducer metadata
    Configuration,
    /// Water-column environment settings
    Environment,
    /// Per-ping, per-channel transmit settings
    Parameter,
    /// Any other root element
    Other(String),
}

/// A decoded XML0 document
#[derive(Debug, Clone)]
pub struct Xml0 {
    /// Which root element the document carries
    pub kind: XmlKind,
    /// Every attribute of every element, in document order, with
    /// colliding names suffixed `_1`, `_2`, ...
    pub attributes: Vec<(String, String)>,
}

impl Xml0 {
    /// Decode an XML0 payload
    ///
    /// The writer occasionally appends a stray null byte after the
    /// final closing tag, so the text is truncated at the last `>`
    /// before scanning. A payload with no element at all decodes to
    /// an empty `Other` document rather than an error.
    pub fn parse(payload: &[u8]) -> Xml0 {
        let text = String::from_utf8_lossy(payload);
        let text = match text.rfind('>') {
            Some(i) => &text[..=i],
            None => "",
        };

        let mut kind = None;
        let mut attributes = Vec::new();
        let mut seen = std::collections::HashMap::new();

        let bytes = text.as_bytes();
        let mut pos = 0;
        while let Some(open) = find_byte(bytes, pos, b'<') {
            let close = match find_byte(bytes, open, b'>') {
                Some(c) => c,
                None => break,
            };
            pos = close + 1;
            let inner = text[open + 1..close].trim().trim_end_matches('/').trim();
            if inner.is_empty() || inner.starts_with(['/', '?', '!']) {
                continue;
            }
            let (name, rest) = match inner.split_once(char::is_whitespace) {
                Some((n, r)) => (n, r),
                None => (inner, ""),
            };
            if kind.is_none() {
                kind = Some(match name {
                    "Configuration" => XmlKind::Configuration,
                    "Environment" => XmlKind::Environment,
                    "Parameter" => XmlKind::Parameter,
                    other => XmlKind::Other(other.to_string()),
                });
            }
            for (key, value) in parse_attributes(rest) {
                let n = seen.entry(key.clone()).or_insert(0usize);
                let stored = if *n == 0 {
                    key
                } else {
                    format!("{}_{}", key, n)
                };
                *n += 1;
                attributes.push((stored, value));
            }
        }

        Xml0 {
            kind: kind.unwrap_or_else(|| XmlKind::Other(String::new())),
            attributes,
        }
    }

    /// Look up an attribute by its (possibly suffixed) flattened name
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Look up an attribute and parse it as a float
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    /// All `ChannelID` attribute values, in document order
    pub fn channel_ids(&self) -> Vec<&str> {
        self.attributes
            .iter()
            .filter(|(k, _)| k == "ChannelID" || k.starts_with("ChannelID_"))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// The channel-id a Parameter document applies to
    pub fn channel_id(&self) -> Option<&str> {
        self.get("ChannelID")
    }

    /// Transmit frequency of a Parameter document in Hz
    ///
    /// Falls back to the center of the sweep for FM pings.
    pub fn frequency(&self) -> Option<f64> {
        self.get_f64("Frequency").or_else(|| {
            let lo = self.get_f64("FrequencyStart")?;
            let hi = self.get_f64("FrequencyEnd")?;
            Some((lo + hi) / 2.0)
        })
    }
}

fn find_byte(bytes: &[u8], from: usize, needle: u8) -> Option<usize> {
    bytes[from..].iter().position(|&b| b == needle).map(|i| from + i)
}

fn parse_attributes(mut rest: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    loop {
        rest = rest.trim_start();
        let eq = match rest.find('=') {
            Some(i) => i,
            None => break,
        };
        let key = rest[..eq].trim().to_string();
        let after = rest[eq + 1..].trim_start();
        if !after.starts_with('"') {
            break;
        }
        let end = match after[1..].find('"') {
            Some(i) => i + 1,
            None => break,
        };
        out.push((key, after[1..end].to_string()));
        rest = &after[end + 1..];
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parameter_document() {
        let doc = br#"<?xml version="1.0"?><Parameter><Channel ChannelID="WBT 5426 ES200-7C" Frequency="200000" PulseDuration="0.001" SampleInterval="0.000064"/></Parameter>"#;
        let xml = Xml0::parse(doc);
        assert_eq!(xml.kind, XmlKind::Parameter);
        assert_eq!(xml.channel_id(), Some("WBT 5426 ES200-7C"));
        assert_eq!(xml.frequency(), Some(200000.0));
        assert_eq!(xml.get_f64("SampleInterval"), Some(6.4e-5));
    }

    #[test]
    fn trailing_null_is_tolerated() {
        let doc = b"<Environment SoundSpeed=\"1481.3\"/>\0";
        let xml = Xml0::parse(doc);
        assert_eq!(xml.kind, XmlKind::Environment);
        assert_eq!(xml.get_f64("SoundSpeed"), Some(1481.3));
    }

    #[test]
    fn colliding_keys_get_positional_suffixes() {
        let doc = br#"<Configuration><Transducer TransducerName="A"/><Transducer TransducerName="B"/></Configuration>"#;
        let xml = Xml0::parse(doc);
        assert_eq!(xml.get("TransducerName"), Some("A"));
        assert_eq!(xml.get("TransducerName_1"), Some("B"));
    }

    #[test]
    fn channel_ids_in_document_order() {
        let doc = br#"<Configuration><Channels><Channel ChannelID="first"/><Channel ChannelID="second"/></Channels></Configuration>"#;
        let xml = Xml0::parse(doc);
        assert_eq!(xml.channel_ids(), vec!["first", "second"]);
    }
}
