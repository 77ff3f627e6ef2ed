//! Air-raid shelters from a KML export.
//!
//! Each `<Placemark>` carries a name, an `<ExtendedData>` block of
//! `<Data name="…"><value>…</value></Data>` pairs, and usually a
//! `<Point><coordinates>lon,lat[,alt]</coordinates></Point>`. When the point
//! is missing the `緯經度` field ("lat,lon") is used instead.
//!
//! A placemark without `<ExtendedData>` is logged and dropped. One whose
//! coordinates are unreadable or out of range is kept as ungeocoded. Only a
//! document that is not well-formed KML fails the whole fetch.

use std::collections::HashMap;

use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use shelter_core::{
  UpstreamError,
  disaster::DisasterKinds,
  geo::GeoPoint,
  shelter::{AIR_RAID_CATEGORY, Location, NewShelter, UNKNOWN_ADDRESS},
  source::ShelterSource,
};
use thiserror::Error;

use crate::client::HttpFetcher;

const FIELD_CATEGORY: &str = "類別";
const FIELD_ADDRESS: &str = "地址";
const FIELD_CAPACITY: &str = "可容納人數";
const FIELD_LAT_LON: &str = "緯經度";

/// Name given to a placemark with no `<name>`.
const UNKNOWN_NAME: &str = "未知";

// ─── Per-placemark failures ──────────────────────────────────────────────────

/// Why a single placemark was skipped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseSkip {
  #[error("placemark has no ExtendedData")]
  MissingExtendedData,
}

/// Why a kept placemark ended up ungeocoded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationIssue {
  #[error("unreadable coordinates {0:?}")]
  BadCoordinates(String),

  #[error("coordinates out of range: {0}")]
  OutOfRange(#[from] shelter_core::Error),
}

/// Result of walking one KML document. Indices count placemarks in document
/// order.
#[derive(Debug, Default)]
pub struct KmlBatch {
  pub shelters:   Vec<NewShelter>,
  pub skipped:    Vec<(usize, ParseSkip)>,
  pub ungeocoded: Vec<(usize, LocationIssue)>,
}

// ─── Placemark ───────────────────────────────────────────────────────────────

/// Raw fields collected while walking one `<Placemark>`.
#[derive(Debug, Default)]
struct Placemark {
  name:        Option<String>,
  /// `None` when the placemark has no `<ExtendedData>` element at all.
  data:        Option<HashMap<String, String>>,
  coordinates: Option<String>,
}

impl Placemark {
  fn field(&self, name: &str) -> Option<&str> {
    self
      .data
      .as_ref()?
      .get(name)
      .map(|v| v.trim())
      .filter(|v| !v.is_empty())
  }

  fn location(&self) -> Result<Location, LocationIssue> {
    if let Some(raw) = self.coordinates.as_deref() {
      // lon,lat[,alt]
      let (lon, lat) = split_pair(raw)?;
      return point(lat, lon);
    }
    if let Some(raw) = self.field(FIELD_LAT_LON) {
      let (lat, lon) = split_pair(raw)?;
      return point(lat, lon);
    }
    Ok(Location::Ungeocoded)
  }

  fn into_new_shelter(self) -> Result<(NewShelter, Option<LocationIssue>), ParseSkip> {
    if self.data.is_none() {
      return Err(ParseSkip::MissingExtendedData);
    }
    let (location, issue) = match self.location() {
      Ok(location) => (location, None),
      Err(issue) => (Location::Ungeocoded, Some(issue)),
    };

    let name = self
      .name
      .as_deref()
      .map(str::trim)
      .filter(|n| !n.is_empty())
      .unwrap_or(UNKNOWN_NAME);
    let mut shelter = NewShelter::new(name, self.field(FIELD_ADDRESS).unwrap_or(UNKNOWN_ADDRESS));
    shelter.category = Some(self.field(FIELD_CATEGORY).unwrap_or(AIR_RAID_CATEGORY).to_owned());
    shelter.capacity = self.field(FIELD_CAPACITY).map(parse_capacity).unwrap_or(0);
    shelter.supported_disasters = DisasterKinds::AIR_RAID;
    shelter.location = location;
    Ok((shelter, issue))
  }
}

fn split_pair(raw: &str) -> Result<(f64, f64), LocationIssue> {
  let bad = || LocationIssue::BadCoordinates(raw.to_owned());
  let mut parts = raw.trim().split(',').map(|p| p.trim().parse::<f64>());
  match (parts.next(), parts.next()) {
    (Some(Ok(a)), Some(Ok(b))) => Ok((a, b)),
    _ => Err(bad()),
  }
}

fn point(latitude: f64, longitude: f64) -> Result<Location, LocationIssue> {
  let p = GeoPoint::new(latitude, longitude)?;
  Ok(Location::from_coordinates(p.latitude, p.longitude))
}

/// The export writes capacities as decimals ("120.0"); keep the whole part.
fn parse_capacity(raw: &str) -> u32 {
  match raw.parse::<f64>() {
    Ok(v) if v.is_finite() && v > 0.0 => v.trunc().min(f64::from(u32::MAX)) as u32,
    _ => 0,
  }
}

// ─── Document walk ───────────────────────────────────────────────────────────

/// Which text node we are inside, relative to the current placemark.
#[derive(Debug, Clone, PartialEq)]
enum Capture {
  None,
  Name,
  Value(String),
  Coordinates,
}

fn local_name(name: &[u8]) -> &[u8] {
  match name.iter().rposition(|&b| b == b':') {
    Some(pos) => &name[pos + 1..],
    None => name,
  }
}

fn data_name(e: &BytesStart<'_>) -> Result<Option<String>, UpstreamError> {
  let attr = e
    .try_get_attribute("name")
    .map_err(|err| UpstreamError::Malformed(err.to_string()))?;
  attr
    .map(|a| {
      a.unescape_value()
        .map(|v| v.into_owned())
        .map_err(|err| UpstreamError::Malformed(err.to_string()))
    })
    .transpose()
}

/// Walk a KML document, mapping each placemark.
pub fn parse_kml(xml: &str) -> Result<KmlBatch, UpstreamError> {
  if xml.trim().is_empty() {
    return Ok(KmlBatch::default());
  }

  let mut reader = quick_xml::Reader::from_str(xml);
  reader.config_mut().trim_text(true);

  let mut saw_root = false;
  let mut depth_in_placemark = 0usize;
  let mut current: Option<Placemark> = None;
  let mut data_field: Option<String> = None;
  let mut capture = Capture::None;
  let mut text = String::new();
  let mut index = 0usize;

  let mut batch = KmlBatch::default();

  loop {
    match reader.read_event() {
      Ok(Event::Start(ref e)) => {
        let qname = e.name();
        let local = local_name(qname.as_ref());
        if local == b"kml" {
          saw_root = true;
        }

        if let Some(pm) = current.as_mut() {
          depth_in_placemark += 1;
          match local {
            b"name" if depth_in_placemark == 1 => capture = Capture::Name,
            b"ExtendedData" => {
              pm.data.get_or_insert_with(HashMap::new);
            }
            b"Data" => data_field = data_name(e)?,
            b"value" => {
              if let Some(field) = data_field.clone() {
                capture = Capture::Value(field);
              }
            }
            b"coordinates" => capture = Capture::Coordinates,
            _ => {}
          }
          text.clear();
        } else if local == b"Placemark" {
          current = Some(Placemark::default());
          depth_in_placemark = 0;
        }
      }
      Ok(Event::Empty(ref e)) => {
        let qname = e.name();
        if let Some(pm) = current.as_mut() {
          if local_name(qname.as_ref()) == b"ExtendedData" {
            pm.data.get_or_insert_with(HashMap::new);
          }
        }
      }
      Ok(Event::Text(ref e)) if capture != Capture::None => {
        let chunk = e
          .unescape()
          .map_err(|err| UpstreamError::Malformed(err.to_string()))?;
        text.push_str(&chunk);
      }
      Ok(Event::CData(e)) if capture != Capture::None => {
        text.push_str(&String::from_utf8_lossy(&e.into_inner()));
      }
      Ok(Event::End(ref e)) => {
        let qname = e.name();
        let local = local_name(qname.as_ref());
        let Some(pm) = current.as_mut() else { continue };

        if depth_in_placemark == 0 {
          // Closing </Placemark>.
          if let Some(done) = current.take() {
            match done.into_new_shelter() {
              Ok((shelter, issue)) => {
                batch.shelters.push(shelter);
                if let Some(issue) = issue {
                  batch.ungeocoded.push((index, issue));
                }
              }
              Err(reason) => batch.skipped.push((index, reason)),
            }
          }
          index += 1;
          continue;
        }
        depth_in_placemark -= 1;

        match std::mem::replace(&mut capture, Capture::None) {
          Capture::Name if local == b"name" => pm.name = Some(std::mem::take(&mut text)),
          Capture::Value(field) if local == b"value" => {
            // First occurrence of a field wins.
            if let Some(data) = pm.data.as_mut() {
              data.entry(field).or_insert_with(|| std::mem::take(&mut text));
            }
          }
          Capture::Coordinates if local == b"coordinates" => {
            pm.coordinates = Some(std::mem::take(&mut text));
          }
          other => capture = other,
        }
        if local == b"Data" {
          data_field = None;
        }
      }
      Ok(Event::Eof) => break,
      Err(e) => return Err(UpstreamError::Malformed(e.to_string())),
      _ => {}
    }
  }

  if !saw_root {
    return Err(UpstreamError::Malformed("document has no <kml> root".into()));
  }
  if current.is_some() {
    return Err(UpstreamError::Malformed("unterminated <Placemark>".into()));
  }

  Ok(batch)
}

// ─── Source ──────────────────────────────────────────────────────────────────

pub struct AirRaidSource {
  http: HttpFetcher,
  url:  String,
}

impl AirRaidSource {
  pub fn new(http: HttpFetcher, url: impl Into<String>) -> Self {
    Self { http, url: url.into() }
  }
}

#[async_trait]
impl ShelterSource for AirRaidSource {
  fn name(&self) -> &str { "air-raid" }

  async fn fetch(&self) -> Result<Vec<NewShelter>, UpstreamError> {
    let body = self.http.get_text(&self.url).await?;
    let batch = parse_kml(&body)?;

    for (placemark, reason) in &batch.skipped {
      tracing::warn!(source = self.name(), placemark, error = %reason, "skipping placemark");
    }
    for (placemark, issue) in &batch.ungeocoded {
      tracing::warn!(
        source = self.name(),
        placemark,
        error = %issue,
        "keeping placemark without location"
      );
    }
    tracing::debug!(
      source = self.name(),
      count = batch.shelters.len(),
      skipped = batch.skipped.len(),
      ungeocoded = batch.ungeocoded.len(),
      "parsed KML"
    );
    Ok(batch.shelters)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const KML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <name>防空避難處所</name>
    <Folder>
      <name>信義區</name>
      <Placemark>
        <name>台北101地下二樓</name>
        <description><![CDATA[類別: 公有]]></description>
        <ExtendedData>
          <Data name="類別"><value>公有建築</value></Data>
          <Data name="地址"><value>臺北市信義區信義路五段7號</value></Data>
          <Data name="可容納人數"><value>2000.0</value></Data>
          <Data name="地下樓層數"><value>2</value></Data>
        </ExtendedData>
        <Point><coordinates>121.5644722,25.0339639,0</coordinates></Point>
      </Placemark>
      <Placemark>
        <name>台北車站 B1</name>
        <ExtendedData>
          <Data name="地址"><value>臺北市中正區北平西路3號</value></Data>
          <Data name="可容納人數"><value>abc</value></Data>
          <Data name="緯經度"><value>25.0478, 121.5170</value></Data>
        </ExtendedData>
      </Placemark>
      <Placemark>
        <name>No data</name>
        <Point><coordinates>121.5,25.0,0</coordinates></Point>
      </Placemark>
      <Placemark>
        <name>Broken point</name>
        <ExtendedData>
          <Data name="地址"><value>somewhere</value></Data>
        </ExtendedData>
        <Point><coordinates>east,north</coordinates></Point>
      </Placemark>
      <Placemark>
        <ExtendedData>
          <Data name="可容納人數"><value>35.9</value></Data>
        </ExtendedData>
        <Point><coordinates>0,0,0</coordinates></Point>
      </Placemark>
      <Placemark>
        <name>Off the map</name>
        <ExtendedData/>
        <Point><coordinates>121.5,95.0,0</coordinates></Point>
      </Placemark>
    </Folder>
  </Document>
</kml>"#;

  #[test]
  fn only_placemarks_without_extended_data_are_skipped() {
    let batch = parse_kml(KML).unwrap();
    assert_eq!(batch.shelters.len(), 5);
    assert_eq!(batch.skipped, vec![(2, ParseSkip::MissingExtendedData)]);

    let ungeocoded: Vec<usize> = batch.ungeocoded.iter().map(|(i, _)| *i).collect();
    assert_eq!(ungeocoded, vec![3, 5]);
    assert!(matches!(batch.ungeocoded[0].1, LocationIssue::BadCoordinates(_)));
    assert!(matches!(batch.ungeocoded[1].1, LocationIssue::OutOfRange(_)));
  }

  #[test]
  fn bad_coordinates_keep_the_record_ungeocoded() {
    let shelters = parse_kml(KML).unwrap().shelters;

    let broken = &shelters[2];
    assert_eq!(broken.name, "Broken point");
    assert_eq!(broken.address, "somewhere");
    assert_eq!(broken.location, Location::Ungeocoded);

    let off_map = &shelters[4];
    assert_eq!(off_map.name, "Off the map");
    assert_eq!(off_map.location, Location::Ungeocoded);
    assert_eq!(off_map.supported_disasters, DisasterKinds::AIR_RAID);
  }

  #[test]
  fn point_coordinates_are_lon_lat() {
    let shelters = parse_kml(KML).unwrap().shelters;
    let first = &shelters[0];
    assert_eq!(first.name, "台北101地下二樓");
    assert_eq!(first.category.as_deref(), Some("公有建築"));
    assert_eq!(first.address, "臺北市信義區信義路五段7號");
    assert_eq!(first.capacity, 2000);
    assert_eq!(
      first.location,
      Location::Geocoded { latitude: 25.0339639, longitude: 121.5644722 }
    );
  }

  #[test]
  fn falls_back_to_lat_lon_field() {
    let shelters = parse_kml(KML).unwrap().shelters;
    let second = &shelters[1];
    assert_eq!(second.category.as_deref(), Some(AIR_RAID_CATEGORY));
    assert_eq!(second.capacity, 0);
    assert_eq!(second.location, Location::Geocoded { latitude: 25.0478, longitude: 121.5170 });
  }

  #[test]
  fn defaults_for_missing_fields() {
    let shelters = parse_kml(KML).unwrap().shelters;
    let nameless = &shelters[3];
    assert_eq!(nameless.name, UNKNOWN_NAME);
    assert_eq!(nameless.address, UNKNOWN_ADDRESS);
    assert_eq!(nameless.capacity, 35);
    assert_eq!(nameless.location, Location::Ungeocoded);
  }

  #[test]
  fn only_the_air_raid_bit_is_set() {
    let shelters = parse_kml(KML).unwrap().shelters;
    assert!(
      shelters
        .iter()
        .all(|s| s.supported_disasters == DisasterKinds::AIR_RAID && !s.accessible)
    );
  }

  #[test]
  fn malformed_documents_fail_the_batch() {
    let mismatched = "<kml><Document><Placemark></Document></kml>";
    assert!(matches!(parse_kml(mismatched), Err(UpstreamError::Malformed(_))));

    assert!(matches!(parse_kml("<html><body/></html>"), Err(UpstreamError::Malformed(_))));
    assert!(matches!(parse_kml("not xml at all"), Err(UpstreamError::Malformed(_))));
  }

  #[test]
  fn blank_body_is_empty() {
    let batch = parse_kml("   ").unwrap();
    assert!(batch.shelters.is_empty());
    assert!(batch.skipped.is_empty());
  }
}
