use bidfan_common::openrtb::Bid;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BidType {
    #[default]
    Banner,
    Video,
    Audio,
    Native,
}

impl std::fmt::Display for BidType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BidType::Banner => "banner",
            BidType::Video => "video",
            BidType::Audio => "audio",
            BidType::Native => "native",
        };
        write!(f, "{s}")
    }
}

/// Becomes `seatbid[].bid[].ext.prebid.meta` on the final response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BidMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub adapter_code: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advertiser_domains: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub media_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BidVideo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub primary_category: String,
}

/// One bid as decoded by an adapter, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypedBid {
    pub bid: Bid,
    pub bid_type: BidType,
    pub bid_meta: Option<BidMeta>,
    pub bid_video: Option<BidVideo>,
    pub deal_priority: i32,
    /// Alternate seat this bid claims; empty means the adapter's own seat.
    pub seat: String,
}

/// Everything an adapter decoded out of one endpoint response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BidderResponse {
    /// ISO currency code of the bid prices; empty means unspecified.
    pub currency: String,
    pub bids: Vec<TypedBid>,
}

impl BidderResponse {
    pub fn with_capacity(capacity: usize) -> Self {
        BidderResponse { currency: String::new(), bids: Vec::with_capacity(capacity) }
    }
}
