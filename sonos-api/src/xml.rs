//! serde helpers for the namespaced XML Sonos embeds in its responses

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use serde::de::DeserializeOwned;

use crate::error::{ApiError, Result};

/// Strip prefixes and drop namespace declarations, then deserialize.
///
/// DIDL-Lite mixes `dc:`, `upnp:` and `r:` prefixes; after stripping, serde
/// structs can name fields by local name only.
pub(crate) fn parse<T: DeserializeOwned>(xml: &str) -> Result<T> {
    let stripped = strip_namespaces(xml)?;
    quick_xml::de::from_str(&stripped).map_err(|e| ApiError::ParseError(e.to_string()))
}

/// `<dc:title xmlns:dc="…">x</dc:title>` becomes `<title>x</title>`.
///
/// Text and attribute values are copied without being unescaped.
pub(crate) fn strip_namespaces(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));

    loop {
        let event = reader
            .read_event()
            .map_err(|e| ApiError::ParseError(format!("malformed XML: {e}")))?;
        let written = match event {
            Event::Eof => break,
            Event::Start(start) => writer.write_event(Event::Start(local_start(&start))),
            Event::Empty(start) => writer.write_event(Event::Empty(local_start(&start))),
            Event::End(end) => {
                let name = String::from_utf8_lossy(end.local_name().as_ref()).into_owned();
                writer.write_event(Event::End(BytesEnd::new(name)))
            }
            other => writer.write_event(other),
        };
        written.map_err(|e| ApiError::ParseError(e.to_string()))?;
    }

    String::from_utf8(writer.into_inner()).map_err(|e| ApiError::ParseError(e.to_string()))
}

fn local_start(start: &BytesStart<'_>) -> BytesStart<'static> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let mut local = BytesStart::new(name);
    for attr in start.attributes().flatten() {
        let key = attr.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            continue;
        }
        local.push_attribute((attr.key.local_name().as_ref(), attr.value.as_ref()));
    }
    local
}
