//! Natural-disaster shelters from the city open-data JSON dataset.
//!
//! Payload shape (only the fields we read):
//!
//! ```json
//! { "result": { "results": [ { "名稱": "…", "門牌地址": "…", "水災": "Y", … } ] } }
//! ```
//!
//! The dataset carries no coordinates, so every record is ungeocoded.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use shelter_core::{
  UpstreamError,
  disaster::DisasterKinds,
  shelter::{Location, NewShelter},
  source::ShelterSource,
};

use crate::{
  client::HttpFetcher,
  flags::{is_accessible, supported_kinds},
};

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Dataset {
  result: ResultSet,
}

#[derive(Debug, Deserialize)]
struct ResultSet {
  #[serde(default)]
  results: Vec<RawShelter>,
}

/// One dataset row. Every column is text upstream, but numbers sometimes
/// slip through unquoted, so each field accepts either.
#[derive(Debug, Default, Deserialize)]
struct RawShelter {
  #[serde(rename = "名稱", default, deserialize_with = "loose_text")]
  name:          Option<String>,
  #[serde(rename = "門牌地址", default, deserialize_with = "loose_text")]
  address:       Option<String>,
  #[serde(rename = "類型", default, deserialize_with = "loose_text")]
  category:      Option<String>,
  #[serde(rename = "水災", default, deserialize_with = "loose_text")]
  flooding:      Option<String>,
  #[serde(rename = "震災", default, deserialize_with = "loose_text")]
  earthquake:    Option<String>,
  #[serde(rename = "土石流", default, deserialize_with = "loose_text")]
  landslide:     Option<String>,
  #[serde(rename = "海嘯", default, deserialize_with = "loose_text")]
  tsunami:       Option<String>,
  #[serde(rename = "無障礙設施", default, deserialize_with = "loose_text")]
  accessible:    Option<String>,
  #[serde(rename = "容納人數", default, deserialize_with = "loose_text")]
  capacity:      Option<String>,
  #[serde(rename = "收容所面積（平方公尺）", default, deserialize_with = "loose_text")]
  area:          Option<String>,
  #[serde(rename = "聯絡人連絡電話", default, deserialize_with = "loose_text")]
  contact_phone: Option<String>,
  #[serde(rename = "管理人連絡電話", default, deserialize_with = "loose_text")]
  manager_phone: Option<String>,
}

fn loose_text<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(match serde_json::Value::deserialize(de)? {
    serde_json::Value::String(s) => Some(s),
    serde_json::Value::Number(n) => Some(n.to_string()),
    serde_json::Value::Bool(b) => Some(b.to_string()),
    _ => None,
  })
}

impl RawShelter {
  fn flag(&self, kind: DisasterKinds) -> Option<&str> {
    let raw = match kind {
      DisasterKinds::FLOODING => &self.flooding,
      DisasterKinds::EARTHQUAKE => &self.earthquake,
      DisasterKinds::LANDSLIDE => &self.landslide,
      DisasterKinds::TSUNAMI => &self.tsunami,
      _ => return None,
    };
    raw.as_deref()
  }

  fn into_new_shelter(self) -> NewShelter {
    let supported_disasters = supported_kinds(|kind| self.flag(kind));
    let accessible = is_accessible(self.accessible.as_deref());

    let mut shelter =
      NewShelter::new(self.name.unwrap_or_default(), self.address.unwrap_or_default());
    shelter.category = non_blank(self.category);
    shelter.capacity = parse_count(self.capacity.as_deref());
    shelter.supported_disasters = supported_disasters;
    shelter.accessible = accessible;
    shelter.location = Location::Ungeocoded;
    shelter.phone = non_blank(self.contact_phone).or_else(|| non_blank(self.manager_phone));
    shelter.floor_area_sqm = parse_count(self.area.as_deref());
    shelter
  }
}

fn non_blank(value: Option<String>) -> Option<String> {
  value.filter(|v| !v.trim().is_empty())
}

/// Whole, non-negative number; anything else is 0.
fn parse_count(raw: Option<&str>) -> u32 {
  raw
    .and_then(|s| s.trim().parse::<u32>().ok())
    .unwrap_or(0)
}

/// Map a dataset body into unified records. A blank body is an empty
/// dataset; anything that is not the expected shape fails the whole batch.
pub fn parse_dataset(body: &str) -> Result<Vec<NewShelter>, UpstreamError> {
  if body.trim().is_empty() {
    return Ok(Vec::new());
  }

  let dataset: Dataset =
    serde_json::from_str(body).map_err(|e| UpstreamError::Malformed(e.to_string()))?;

  Ok(
    dataset
      .result
      .results
      .into_iter()
      .map(RawShelter::into_new_shelter)
      .collect(),
  )
}

// ─── Source ──────────────────────────────────────────────────────────────────

pub struct NaturalDisasterSource {
  http: HttpFetcher,
  url:  String,
}

impl NaturalDisasterSource {
  pub fn new(http: HttpFetcher, url: impl Into<String>) -> Self {
    Self { http, url: url.into() }
  }
}

#[async_trait]
impl ShelterSource for NaturalDisasterSource {
  fn name(&self) -> &str { "natural-disaster" }

  async fn fetch(&self) -> Result<Vec<NewShelter>, UpstreamError> {
    let body = self.http.get_text(&self.url).await?;
    let shelters = parse_dataset(&body)?;
    tracing::debug!(source = self.name(), count = shelters.len(), "parsed dataset");
    Ok(shelters)
  }
}
