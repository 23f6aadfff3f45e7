//! XMP packet extraction from DNG files
//!
//! DJI aircraft write their flight telemetry as attributes of the
//! `rdf:Description` element of an XMP packet, stored in TIFF tag 700 of the
//! DNG container. This module pulls that packet out of the container with
//! kamadak-exif, parses it into a small element tree with quick-xml, and
//! flattens the description into a key/value map using the xmltodict naming
//! convention (`@prefix:Name` for attributes, `prefix:Name` for text children).

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{MetadataError, Result};

/// Raw description record: namespaced key to unconverted string value
pub type MetadataMap = BTreeMap<String, String>;

/// TIFF tag holding the XMP packet (0x02BC)
pub const XMP_TAG: exif::Tag = exif::Tag(exif::Context::Tiff, 0x02bc);

/// Nested keys leading from the document root to the flat description record
pub const DESCRIPTION_PATH: [&str; 3] = ["x:xmpmeta", "rdf:RDF", "rdf:Description"];

/// One element of a parsed XMP packet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmpNode {
    /// Attributes in document order, keyed by qualified name
    pub attributes: Vec<(String, String)>,
    /// Child elements in document order, keyed by qualified name
    pub children: Vec<(String, XmpNode)>,
    /// Concatenated, trimmed character data
    pub text: Option<String>,
}

impl XmpNode {
    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| MetadataError::Xml(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| MetadataError::Xml(e.to_string()))?
                .into_owned();
            attributes.push((key, value));
        }

        Ok(Self {
            attributes,
            ..Self::default()
        })
    }

    /// First child element with the given qualified name
    pub fn child(&self, name: &str) -> Option<&XmpNode> {
        self.children
            .iter()
            .find(|(child_name, _)| child_name == name)
            .map(|(_, node)| node)
    }

    /// All child elements with the given qualified name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmpNode> + 'a {
        self.children
            .iter()
            .filter(move |(child_name, _)| child_name == name)
            .map(|(_, node)| node)
    }

    /// Value of an attribute by qualified name
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn is_leaf(&self) -> bool {
        self.attributes.is_empty() && self.children.is_empty()
    }

    fn append_text(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        match &mut self.text {
            Some(existing) => existing.push_str(text),
            None => self.text = Some(text.to_string()),
        }
    }
}

/// Parse an XMP packet into an element tree rooted at a synthetic document node.
pub fn parse_xmp_tree(packet: &[u8]) -> Result<XmpNode> {
    let mut reader = Reader::from_reader(packet);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<(String, XmpNode)> = vec![(String::new(), XmpNode::default())];

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| MetadataError::Xml(format!("at byte {}: {}", reader.buffer_position(), e)))?;

        match event {
            Event::Start(ref e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                stack.push((name, XmpNode::from_start(e)?));
            }
            Event::Empty(ref e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let node = XmpNode::from_start(e)?;
                if let Some((_, parent)) = stack.last_mut() {
                    parent.children.push((name, node));
                }
            }
            Event::Text(ref e) => {
                let raw = std::str::from_utf8(e).map_err(|e| MetadataError::Xml(e.to_string()))?;
                let text = quick_xml::escape::unescape(raw)
                    .map_err(|e| MetadataError::Xml(e.to_string()))?;
                if let Some((_, node)) = stack.last_mut() {
                    node.append_text(&text);
                }
            }
            Event::CData(ref e) => {
                let text = String::from_utf8_lossy(e);
                if let Some((_, node)) = stack.last_mut() {
                    node.append_text(&text);
                }
            }
            Event::End(_) => {
                // quick-xml checks end names, so the top of the stack is the element being closed
                if stack.len() > 1 {
                    if let Some((name, node)) = stack.pop() {
                        if let Some((_, parent)) = stack.last_mut() {
                            parent.children.push((name, node));
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if stack.len() != 1 {
        let open = stack.last().map(|(name, _)| name.clone()).unwrap_or_default();
        return Err(MetadataError::Xml(format!("unclosed element `{open}`")));
    }

    Ok(stack.pop().map(|(_, root)| root).unwrap_or_default())
}

/// Descend `x:xmpmeta` → `rdf:RDF` → `rdf:Description` and flatten the description.
///
/// When the packet splits the description over several `rdf:Description`
/// siblings, they are merged in document order and the first occurrence of a
/// key wins.
pub fn description_record(root: &XmpNode) -> Result<MetadataMap> {
    let [meta_key, rdf_key, description_key] = DESCRIPTION_PATH;

    let rdf = root
        .child(meta_key)
        .ok_or_else(|| MetadataError::MissingKey(meta_key.to_string()))?
        .child(rdf_key)
        .ok_or_else(|| MetadataError::MissingKey(rdf_key.to_string()))?;

    let mut descriptions = rdf.children_named(description_key).peekable();
    if descriptions.peek().is_none() {
        return Err(MetadataError::MissingKey(description_key.to_string()));
    }

    let mut record = MetadataMap::new();
    for description in descriptions {
        for (key, value) in &description.attributes {
            record.entry(format!("@{key}")).or_insert_with(|| value.clone());
        }
        for (name, child) in &description.children {
            match &child.text {
                Some(text) if child.is_leaf() => {
                    record.entry(name.clone()).or_insert_with(|| text.clone());
                }
                _ => {}
            }
        }
    }

    Ok(record)
}

/// Parse an XMP packet straight into its flat description record.
pub fn parse_xmp_packet(packet: &[u8]) -> Result<MetadataMap> {
    let tree = parse_xmp_tree(trim_packet(packet))?;
    description_record(&tree)
}

/// Read the XMP packet embedded in a TIFF-structured raw file.
///
/// Every IFD is searched; when several carry the tag the last one read wins.
pub fn read_xmp_packet(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path).map_err(|source| MetadataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);

    let exif = exif::Reader::new()
        .read_from_container(&mut reader)
        .map_err(|source| MetadataError::Container {
            path: path.to_path_buf(),
            source,
        })?;

    exif.fields()
        .filter(|field| field.tag == XMP_TAG)
        .filter_map(|field| packet_bytes(&field.value))
        .last()
        .ok_or_else(|| MetadataError::MissingXmp(path.to_path_buf()))
}

/// Read and flatten the XMP description record of a raw image.
pub fn read_raw_metadata(path: &Path) -> Result<MetadataMap> {
    let packet = read_xmp_packet(path)?;
    log::debug!("{}: {} byte XMP packet", path.display(), packet.len());
    parse_xmp_packet(&packet)
}

fn packet_bytes(value: &exif::Value) -> Option<Vec<u8>> {
    match value {
        exif::Value::Byte(bytes) => Some(bytes.clone()),
        exif::Value::Undefined(bytes, _) => Some(bytes.clone()),
        exif::Value::Ascii(parts) => Some(parts.concat()),
        _ => None,
    }
}

/// Strip NUL and whitespace padding writers leave around the packet
fn trim_packet(packet: &[u8]) -> &[u8] {
    let is_padding = |b: &u8| *b == 0 || b.is_ascii_whitespace();
    let start = packet.iter().position(|b| !is_padding(b)).unwrap_or(packet.len());
    let end = packet.iter().rposition(|b| !is_padding(b)).map_or(start, |i| i + 1);
    &packet[start..end]
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs;
    use tempfile::tempdir;

    pub(crate) const DJI_XMP: &str = r#"<?xpacket begin="" id="W5M0MpCehiHzreSzNTczkc9d"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/">
 <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <rdf:Description rdf:about="DJI Meta Data"
    xmlns:xmp="http://ns.adobe.com/xap/1.0/"
    xmlns:drone-dji="http://www.dji.com/drone-dji/1.0/"
   xmp:CreateDate="2023-06-14T10:21:33"
   xmp:ModifyDate="2023-06-14T10:21:33"
   drone-dji:GpsLatitude="+46.520415"
   drone-dji:GpsLongitude="+6.566781"
   drone-dji:AbsoluteAltitude="+512.34"
   drone-dji:RelativeAltitude="+80.10"
   drone-dji:GimbalRollDegree="+0.00"
   drone-dji:GimbalYawDegree="-93.40"
   drone-dji:GimbalPitchDegree="-90.00"
   drone-dji:FlightRollDegree="+1.20"
   drone-dji:FlightYawDegree="-92.80"
   drone-dji:FlightPitchDegree="-3.40"
   drone-dji:FlightXSpeed="+3.0"
   drone-dji:FlightYSpeed="-4.0"
   drone-dji:FlightZSpeed="+0.1"
   drone-dji:CamReverse="0"
   drone-dji:GimbalReverse="0"
   drone-dji:DewarpFlag="0">
   <crs:Version>7.0</crs:Version>
  </rdf:Description>
 </rdf:RDF>
</x:xmpmeta>
<?xpacket end="w"?>"#;

    /// Minimal little-endian TIFF with a single IFD holding the given entries.
    /// Each entry is `(tag, field type, element size, payload)`.
    pub(crate) fn tiff_bytes(entries: &[(u16, u16, usize, &[u8])]) -> Vec<u8> {
        let ifd_len = 2 + entries.len() * 12 + 4;
        let mut data_offset = 8 + ifd_len;
        let mut header = Vec::new();
        let mut data = Vec::new();

        header.extend_from_slice(b"II");
        header.extend_from_slice(&42u16.to_le_bytes());
        header.extend_from_slice(&8u32.to_le_bytes());
        header.extend_from_slice(&(entries.len() as u16).to_le_bytes());

        for (tag, field_type, elem_size, payload) in entries {
            header.extend_from_slice(&tag.to_le_bytes());
            header.extend_from_slice(&field_type.to_le_bytes());
            header.extend_from_slice(&((payload.len() / elem_size) as u32).to_le_bytes());
            if payload.len() <= 4 {
                let mut inline = [0u8; 4];
                inline[..payload.len()].copy_from_slice(payload);
                header.extend_from_slice(&inline);
            } else {
                header.extend_from_slice(&(data_offset as u32).to_le_bytes());
                data.extend_from_slice(payload);
                if payload.len() % 2 == 1 {
                    data.push(0);
                }
                data_offset = 8 + ifd_len + data.len();
            }
        }
        header.extend_from_slice(&0u32.to_le_bytes());
        header.extend_from_slice(&data);
        header
    }

    pub(crate) fn dng_with_xmp(xmp: &str) -> Vec<u8> {
        let mut packet = xmp.as_bytes().to_vec();
        packet.extend_from_slice(&[0, 0, 0]);
        tiff_bytes(&[(0x02bc, 1, 1, &packet)])
    }

    #[test]
    fn test_parse_dji_description() -> Result<()> {
        let record = parse_xmp_packet(DJI_XMP.as_bytes())?;

        assert_eq!(record.get("@drone-dji:GpsLatitude").map(String::as_str), Some("+46.520415"));
        assert_eq!(record.get("@xmp:CreateDate").map(String::as_str), Some("2023-06-14T10:21:33"));
        assert_eq!(record.get("@rdf:about").map(String::as_str), Some("DJI Meta Data"));
        assert_eq!(record.get("crs:Version").map(String::as_str), Some("7.0"));
        Ok(())
    }

    #[test]
    fn test_merges_split_descriptions() -> Result<()> {
        let xmp = r#"<x:xmpmeta xmlns:x="adobe:ns:meta/">
          <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
            <rdf:Description xmp:CreateDate="2023-01-01T00:00:00"/>
            <rdf:Description drone-dji:GpsLatitude="+1.5" xmp:CreateDate="ignored"/>
          </rdf:RDF>
        </x:xmpmeta>"#;

        let record = parse_xmp_packet(xmp.as_bytes())?;
        assert_eq!(record.get("@xmp:CreateDate").map(String::as_str), Some("2023-01-01T00:00:00"));
        assert_eq!(record.get("@drone-dji:GpsLatitude").map(String::as_str), Some("+1.5"));
        Ok(())
    }

    #[test]
    fn test_missing_descent_keys() {
        let no_rdf = br#"<x:xmpmeta xmlns:x="adobe:ns:meta/"><other/></x:xmpmeta>"#;
        match parse_xmp_packet(no_rdf) {
            Err(MetadataError::MissingKey(key)) => assert_eq!(key, "rdf:RDF"),
            other => panic!("expected missing rdf:RDF, got {:?}", other),
        }

        let no_description = br#"<x:xmpmeta><rdf:RDF></rdf:RDF></x:xmpmeta>"#;
        match parse_xmp_packet(no_description) {
            Err(MetadataError::MissingKey(key)) => assert_eq!(key, "rdf:Description"),
            other => panic!("expected missing rdf:Description, got {:?}", other),
        }

        match parse_xmp_packet(b"<rdf:RDF/>") {
            Err(MetadataError::MissingKey(key)) => assert_eq!(key, "x:xmpmeta"),
            other => panic!("expected missing x:xmpmeta, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_packet() {
        let mismatched = br#"<x:xmpmeta><rdf:RDF></x:xmpmeta>"#;
        assert!(matches!(parse_xmp_packet(mismatched), Err(MetadataError::Xml(_))));

        let unclosed = br#"<x:xmpmeta><rdf:RDF>"#;
        assert!(matches!(parse_xmp_tree(unclosed), Err(MetadataError::Xml(_))));
    }

    #[test]
    fn test_child_lookup_outlives_name() -> Result<()> {
        let tree = parse_xmp_tree(DJI_XMP.as_bytes())?;

        let rdf = {
            let key = String::from("x:xmpmeta");
            tree.child(&key).and_then(|meta| meta.child("rdf:RDF"))
        };
        let description = rdf.and_then(|rdf| rdf.child("rdf:Description")).expect("description");
        assert_eq!(description.attribute("drone-dji:GpsLongitude"), Some("+6.566781"));
        assert!(tree.child("rdf:RDF").is_none());
        Ok(())
    }

    #[test]
    fn test_trim_packet_padding() {
        assert_eq!(trim_packet(b"\0 <a/>\n\0\0"), b"<a/>");
        assert_eq!(trim_packet(b"\0\0"), b"");
    }

    #[test]
    fn test_read_xmp_from_tiff() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("DJI_0001.DNG");
        fs::write(&path, dng_with_xmp(DJI_XMP))?;

        let record = read_raw_metadata(&path)?;
        assert_eq!(record.get("@drone-dji:FlightYawDegree").map(String::as_str), Some("-92.80"));
        Ok(())
    }

    #[test]
    fn test_tiff_without_xmp_tag() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("DJI_0002.DNG");
        // ImageWidth only
        fs::write(&path, tiff_bytes(&[(0x0100, 3, 2, &640u16.to_le_bytes())]))?;

        assert!(matches!(read_raw_metadata(&path), Err(MetadataError::MissingXmp(_))));
        Ok(())
    }

    #[test]
    fn test_unreadable_inputs() -> Result<()> {
        let dir = tempdir()?;

        let missing = dir.path().join("absent.DNG");
        assert!(matches!(read_raw_metadata(&missing), Err(MetadataError::Io { .. })));

        let not_tiff = dir.path().join("DJI_0003.DNG");
        fs::write(&not_tiff, b"definitely not a tiff file")?;
        assert!(matches!(read_raw_metadata(&not_tiff), Err(MetadataError::Container { .. })));
        Ok(())
    }
}
