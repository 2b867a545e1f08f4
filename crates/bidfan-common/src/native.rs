use serde::{Deserialize, Serialize};

/// Native ad request document, carried serialized inside `imp.native.request`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NativeRequest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<NativeRequestAsset>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NativeRequestAsset {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<NativeImageAsset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<NativeDataAsset>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NativeImageAsset {
    /// Image asset type per the IAB native taxonomy; 0 means unset.
    #[serde(default, rename = "type")]
    pub asset_type: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NativeDataAsset {
    #[serde(default, rename = "type")]
    pub asset_type: i64,
}

/// Native ad response markup, parsed out of a bid's `adm`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NativeResponse {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<NativeResponseAsset>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NativeResponseAsset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<NativeResponseImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<NativeResponseData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NativeResponseImage {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<i64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NativeResponseData {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<i64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
}
