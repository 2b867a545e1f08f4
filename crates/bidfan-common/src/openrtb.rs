use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Subset of an OpenRTB 2.x bid request: the fields the broker reads or
/// rewrites. Unknown fields survive round-trips inside `ext`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BidRequest {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imp: Vec<Imp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<App>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<Site>,
    /// Accepted currencies in order of preference.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cur: Vec<String>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub test: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmax: Option<u64>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub ext: Value,
}

fn is_zero(v: &u8) -> bool {
    *v == 0
}

impl BidRequest {
    /// Reads `ext.prebid.<key>` if present.
    pub fn prebid_ext(&self, key: &str) -> Option<&Value> {
        self.ext.get("prebid").and_then(|p| p.get(key))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Imp {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native: Option<NativeImp>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub banner: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub video: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub ext: Value,
}

/// Native placement: `request` holds the serialized native request document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NativeImp {
    pub request: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ver: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct App {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub ext: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Site {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub ext: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Bid {
    pub id: String,
    pub impid: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dealid: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub ext: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SeatBid {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bid: Vec<Bid>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub seat: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BidResponse {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seatbid: Vec<SeatBid>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cur: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub ext: Value,
}
