//! Minimal product header (`.HDR`) reader and patcher.
//!
//! Only the handful of elements needed to open and subset a product are
//! read. Patching streams the document through quick-xml and replaces the
//! text of selected elements, leaving everything else byte-for-byte intact.
use std::io::Cursor;
use std::path::Path;

use chrono::NaiveDateTime;
use quick_xml::events::{BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

use crate::core::grid::GeoRect;

pub const UTC_PREFIX: &str = "UTC=";
pub const UTC_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("I/O error reading header {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("Missing header element `{0}`")]
    MissingField(&'static str),
    #[error("Cannot parse header element `{field}` value `{value}`")]
    Parse { field: &'static str, value: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductHeader {
    pub file_name: String,
    pub file_type: String,
    pub datablock_schema: String,
    pub validity_start: Option<NaiveDateTime>,
    pub validity_stop: Option<NaiveDateTime>,
    pub grid_point_count: Option<u64>,
    pub bounds: Option<GeoRect>,
}

/// Parse `UTC=yyyy-MM-ddTHH:mm:ss`; placeholder dates such as
/// `UTC=9999-99-99T99:99:99` yield `None`.
pub fn parse_utc(text: &str) -> Option<NaiveDateTime> {
    let t = text.trim();
    let t = t.strip_prefix(UTC_PREFIX).unwrap_or(t);
    let t = t.get(..19).unwrap_or(t);
    NaiveDateTime::parse_from_str(t, UTC_FORMAT).ok()
}

pub fn format_utc(t: &NaiveDateTime) -> String {
    format!("{}{}", UTC_PREFIX, t.format(UTC_FORMAT))
}

impl ProductHeader {
    pub fn read(path: &Path) -> Result<Self, HeaderError> {
        let xml = std::fs::read_to_string(path).map_err(|source| HeaderError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse_str(&xml)
    }

    pub fn parse_str(xml: &str) -> Result<Self, HeaderError> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);
        let mut buf = Vec::new();
        let mut curr = String::new();
        let mut header = ProductHeader::default();
        let (mut min_lat, mut max_lat, mut min_lon, mut max_lon) = (None, None, None, None);

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => {
                    curr = String::from_utf8_lossy(e.name().as_ref()).to_string();
                }
                Event::End(_) => curr.clear(),
                Event::Text(e) => {
                    let txt = e.unescape()?;
                    let txt = txt.trim();
                    match curr.as_str() {
                        "File_Name" => header.file_name = txt.to_string(),
                        "File_Type" => header.file_type = txt.to_string(),
                        "Datablock_Schema" => header.datablock_schema = txt.to_string(),
                        "Validity_Start" => header.validity_start = parse_utc(txt),
                        "Validity_Stop" => header.validity_stop = parse_utc(txt),
                        "Grid_Point_Count" => {
                            let count = txt.parse().map_err(|_| HeaderError::Parse {
                                field: "Grid_Point_Count",
                                value: txt.to_string(),
                            })?;
                            header.grid_point_count = Some(count);
                        }
                        "Min_Latitude" => min_lat = Some(parse_f64("Min_Latitude", txt)?),
                        "Max_Latitude" => max_lat = Some(parse_f64("Max_Latitude", txt)?),
                        "Min_Longitude" => min_lon = Some(parse_f64("Min_Longitude", txt)?),
                        "Max_Longitude" => max_lon = Some(parse_f64("Max_Longitude", txt)?),
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if header.datablock_schema.is_empty() {
            return Err(HeaderError::MissingField("Datablock_Schema"));
        }
        if let (Some(lat0), Some(lat1), Some(lon0), Some(lon1)) =
            (min_lat, max_lat, min_lon, max_lon)
        {
            header.bounds = Some(GeoRect::new(lon0, lat0, lon1, lat1));
        }
        Ok(header)
    }
}

fn parse_f64(field: &'static str, txt: &str) -> Result<f64, HeaderError> {
    txt.parse().map_err(|_| HeaderError::Parse {
        field,
        value: txt.to_string(),
    })
}

/// Header elements to rewrite when writing a derived product
#[derive(Debug, Clone, Default)]
pub struct HeaderPatch {
    pub file_name: Option<String>,
    pub validity_start: Option<NaiveDateTime>,
    pub validity_stop: Option<NaiveDateTime>,
    pub grid_point_count: Option<u64>,
    pub bounds: Option<GeoRect>,
}

impl HeaderPatch {
    fn replacement(&self, element: &str) -> Option<String> {
        match element {
            "File_Name" => self.file_name.clone(),
            "Validity_Start" => self.validity_start.as_ref().map(format_utc),
            "Validity_Stop" => self.validity_stop.as_ref().map(format_utc),
            "Grid_Point_Count" => self.grid_point_count.map(|n| n.to_string()),
            "Min_Latitude" => self.bounds.map(|b| format!("{:.6}", b.lat_min)),
            "Max_Latitude" => self.bounds.map(|b| format!("{:.6}", b.lat_max)),
            "Min_Longitude" => self.bounds.map(|b| format!("{:.6}", b.lon_min)),
            "Max_Longitude" => self.bounds.map(|b| format!("{:.6}", b.lon_max)),
            _ => None,
        }
    }

    /// Return `xml` with the patched element texts replaced.
    pub fn apply(&self, xml: &str) -> Result<String, HeaderError> {
        let mut reader = Reader::from_str(xml);
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        let mut buf = Vec::new();
        let mut curr = String::new();

        loop {
            let event = reader.read_event_into(&mut buf)?;
            match event {
                Event::Eof => break,
                Event::Start(ref e) => {
                    curr = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    writer.write_event(event)?;
                }
                Event::End(_) => {
                    curr.clear();
                    writer.write_event(event)?;
                }
                Event::Text(_) => match self.replacement(&curr) {
                    Some(value) => writer.write_event(Event::Text(BytesText::new(&value)))?,
                    None => writer.write_event(event)?,
                },
                other => writer.write_event(other)?,
            }
            buf.clear();
        }

        let bytes = writer.into_inner().into_inner();
        String::from_utf8(bytes).map_err(|e| HeaderError::Parse {
            field: "document",
            value: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HDR: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Earth_Explorer_Header>
  <Fixed_Header>
    <File_Name>SM_OPER_MIR_SCLF1C_20100601T000000_20100601T010000_400_001_1</File_Name>
    <File_Type>MIR_SCLF1C</File_Type>
    <Validity_Period>
      <Validity_Start>UTC=2010-06-01T00:00:00</Validity_Start>
      <Validity_Stop>UTC=2010-06-01T01:00:00</Validity_Stop>
    </Validity_Period>
  </Fixed_Header>
  <Variable_Header>
    <Datablock_Schema>DBL_SM_OPER_MIR_SCLF1C_0400</Datablock_Schema>
    <Grid_Point_Count>3</Grid_Point_Count>
    <Min_Latitude>-10.5</Min_Latitude>
    <Max_Latitude>20.25</Max_Latitude>
    <Min_Longitude>5.0</Min_Longitude>
    <Max_Longitude>35.0</Max_Longitude>
  </Variable_Header>
</Earth_Explorer_Header>
"#;

    #[test]
    fn reads_fields() {
        let h = ProductHeader::parse_str(HDR).unwrap();
        assert_eq!(h.file_type, "MIR_SCLF1C");
        assert_eq!(h.datablock_schema, "DBL_SM_OPER_MIR_SCLF1C_0400");
        assert_eq!(h.grid_point_count, Some(3));
        assert_eq!(
            h.validity_start.map(|t| format_utc(&t)).as_deref(),
            Some("UTC=2010-06-01T00:00:00")
        );
        let b = h.bounds.unwrap();
        assert_eq!((b.lon_min, b.lat_min, b.lon_max, b.lat_max), (5.0, -10.5, 35.0, 20.25));
    }

    #[test]
    fn placeholder_dates_are_none() {
        assert!(parse_utc("UTC=9999-99-99T99:99:99").is_none());
        assert!(parse_utc("UTC=2012-01-02T03:04:05.123456").is_some());
    }

    #[test]
    fn patch_round_trip() {
        let start = parse_utc("UTC=2010-06-01T00:10:00").unwrap();
        let patch = HeaderPatch {
            file_name: Some("SUBSET".into()),
            validity_start: Some(start),
            validity_stop: None,
            grid_point_count: Some(1),
            bounds: Some(GeoRect::new(6.0, -1.0, 7.0, 1.0)),
        };
        let patched = patch.apply(HDR).unwrap();
        let h = ProductHeader::parse_str(&patched).unwrap();
        assert_eq!(h.file_name, "SUBSET");
        assert_eq!(h.validity_start, Some(start));
        assert_eq!(
            h.validity_stop.map(|t| format_utc(&t)).as_deref(),
            Some("UTC=2010-06-01T01:00:00")
        );
        assert_eq!(h.grid_point_count, Some(1));
        assert_eq!(h.bounds, Some(GeoRect::new(6.0, -1.0, 7.0, 1.0)));
        assert_eq!(h.datablock_schema, "DBL_SM_OPER_MIR_SCLF1C_0400");
        assert!(patched.contains("<Validity_Period>"));
    }

    #[test]
    fn missing_schema_is_an_error() {
        let xml =
            "<Earth_Explorer_Header><File_Type>MIR_SCLF1C</File_Type></Earth_Explorer_Header>";

        assert!(matches!(
            ProductHeader::parse_str(xml),
            Err(HeaderError::MissingField("Datablock_Schema"))
        ));
    }
}
