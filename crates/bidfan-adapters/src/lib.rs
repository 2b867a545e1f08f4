use bidfan_common::errors::BidderError;
use bidfan_common::openrtb::BidRequest;
use bytes::Bytes;
use http::{HeaderMap, Method};

pub mod bids;
pub mod generic;

pub use bids::{BidMeta, BidType, BidVideo, BidderResponse, TypedBid};
pub use generic::GenericOrtbBidder;

/// One outbound HTTP request an adapter wants dispatched.
#[derive(Debug, Clone, Default)]
pub struct RequestData {
    pub method: Method,
    pub uri: String,
    pub body: Vec<u8>,
    pub headers: HeaderMap,
}

/// The raw answer to one outbound call.
#[derive(Debug, Clone)]
pub struct ResponseData {
    pub status_code: u16,
    pub body: Bytes,
    pub headers: HeaderMap,
}

/// Request-scoped facts an adapter may want while encoding.
#[derive(Debug, Clone, Default)]
pub struct ExtraRequestInfo {
    /// Forwarded `Sec-GPC` value; "1" means the signal is set.
    pub global_privacy_control_header: String,
}

/// Contract every demand adapter satisfies.
///
/// `make_requests` and `make_bids` are pure translations between the internal
/// bid request model and the endpoint's wire protocol; all I/O, deadlines and
/// normalization happen in the runner. Errors describe why a bid (or no-bid)
/// is less than ideal and end up user-facing, so messages should help
/// publishers understand what happened.
pub trait Bidder: Send + Sync {
    /// Encode outbound requests for this bid request. Returning no requests
    /// and no errors is itself treated as an error by the runner.
    fn make_requests(
        &self,
        request: &BidRequest,
        info: &ExtraRequestInfo,
    ) -> (Vec<RequestData>, Vec<BidderError>);

    /// Decode one endpoint response into typed bids. `request_sent` is the
    /// exact outbound request the response answers.
    fn make_bids(
        &self,
        request: &BidRequest,
        request_sent: &RequestData,
        response: &ResponseData,
    ) -> (Option<BidderResponse>, Vec<BidderError>);

    /// Optional: build a notification request to fire when `request_sent`
    /// missed the deadline. Adapters without the capability inherit `None`.
    fn make_timeout_notification(
        &self,
        _request_sent: &RequestData,
    ) -> Option<Result<RequestData, String>> {
        None
    }
}
