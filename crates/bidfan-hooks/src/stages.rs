use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use bidfan_adapters::{BidderResponse, TypedBid};
use bidfan_common::openrtb::{BidRequest, BidResponse, SeatBid};
use http::{HeaderMap, Method, Uri};

use crate::changeset::{HookError, HookResult};
use crate::invocation::ModuleInvocationContext;

/// Mutable view of the inbound HTTP request available to entrypoint hooks.
/// Framing stays with the ingress layer; hooks see headers and query only.
#[derive(Debug, Clone, Default)]
pub struct RequestParts {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub query: BTreeMap<String, String>,
}

impl RequestParts {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        let query = uri
            .query()
            .map(|q| {
                q.split('&')
                    .filter_map(|pair| {
                        let (k, v) = pair.split_once('=')?;
                        Some((k.to_string(), v.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();
        RequestParts { method, uri, headers, query }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EntrypointPayload {
    pub request: RequestParts,
    pub body: Vec<u8>,
}

/// The auction request before any parsing: raw body bytes.
pub type RawAuctionPayload = Vec<u8>;

#[derive(Debug, Clone, Default)]
pub struct ProcessedAuctionPayload {
    pub bid_request: BidRequest,
}

#[derive(Debug, Clone, Default)]
pub struct BidderRequestPayload {
    pub bid_request: BidRequest,
    pub bidder: String,
}

#[derive(Debug, Clone, Default)]
pub struct RawBidderResponsePayload {
    pub bids: Vec<TypedBid>,
    pub bidder: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessedBidResponsePayload {
    pub response: BidderResponse,
    pub bidder: String,
}

#[derive(Debug, Clone, Default)]
pub struct AllProcessedBidResponsesPayload {
    /// Per-bidder seat bids after normalization, keyed by bidder name.
    pub responses: HashMap<String, Vec<SeatBid>>,
}

#[derive(Debug, Clone, Default)]
pub struct AuctionResponsePayload {
    pub bid_response: BidResponse,
}

#[async_trait]
pub trait EntrypointHook: Send + Sync {
    async fn call(
        &self,
        ctx: ModuleInvocationContext,
        payload: EntrypointPayload,
    ) -> Result<HookResult<EntrypointPayload>, HookError>;
}

#[async_trait]
pub trait RawAuctionHook: Send + Sync {
    async fn call(
        &self,
        ctx: ModuleInvocationContext,
        payload: RawAuctionPayload,
    ) -> Result<HookResult<RawAuctionPayload>, HookError>;
}

#[async_trait]
pub trait ProcessedAuctionHook: Send + Sync {
    async fn call(
        &self,
        ctx: ModuleInvocationContext,
        payload: ProcessedAuctionPayload,
    ) -> Result<HookResult<ProcessedAuctionPayload>, HookError>;
}

#[async_trait]
pub trait BidderRequestHook: Send + Sync {
    async fn call(
        &self,
        ctx: ModuleInvocationContext,
        payload: BidderRequestPayload,
    ) -> Result<HookResult<BidderRequestPayload>, HookError>;
}

#[async_trait]
pub trait RawBidderResponseHook: Send + Sync {
    async fn call(
        &self,
        ctx: ModuleInvocationContext,
        payload: RawBidderResponsePayload,
    ) -> Result<HookResult<RawBidderResponsePayload>, HookError>;
}

#[async_trait]
pub trait ProcessedBidResponseHook: Send + Sync {
    async fn call(
        &self,
        ctx: ModuleInvocationContext,
        payload: ProcessedBidResponsePayload,
    ) -> Result<HookResult<ProcessedBidResponsePayload>, HookError>;
}

#[async_trait]
pub trait AllProcessedBidResponsesHook: Send + Sync {
    async fn call(
        &self,
        ctx: ModuleInvocationContext,
        payload: AllProcessedBidResponsesPayload,
    ) -> Result<HookResult<AllProcessedBidResponsesPayload>, HookError>;
}

#[async_trait]
pub trait AuctionResponseHook: Send + Sync {
    async fn call(
        &self,
        ctx: ModuleInvocationContext,
        payload: AuctionResponsePayload,
    ) -> Result<HookResult<AuctionResponsePayload>, HookError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_parts_parses_query() {
        let uri: Uri = "https://broker.example/openrtb2/auction?foo=bar&debug=1"
            .parse()
            .unwrap();
        let parts = RequestParts::new(Method::POST, uri, HeaderMap::new());
        assert_eq!(parts.query.get("foo").map(String::as_str), Some("bar"));
        assert_eq!(parts.query.get("debug").map(String::as_str), Some("1"));
        assert!(parts.query.get("missing").is_none());
    }
}
