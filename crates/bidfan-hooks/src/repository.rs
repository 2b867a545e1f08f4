use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::stages::{
    AllProcessedBidResponsesHook, AuctionResponseHook, BidderRequestHook, EntrypointHook,
    ProcessedAuctionHook, ProcessedBidResponseHook, RawAuctionHook, RawBidderResponseHook,
};

/// Startup-time configuration problems. Never surfaced at request time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("hook repository already contains hook \"{code}\" for module \"{module}\"")]
    DuplicateHook { module: String, code: String },
    #[error("hook \"{code}\" of module \"{module}\" does not implement any stage interface")]
    EmptyHookSet { module: String, code: String },
    #[error("failed to init \"{module}\" module: {reason}")]
    ModuleBuild { module: String, reason: String },
}

/// The stage interfaces one registered hook implements. A hook may serve
/// several stages; serving none is a startup error.
#[derive(Clone, Default)]
pub struct HookSet {
    pub entrypoint: Option<Arc<dyn EntrypointHook>>,
    pub raw_auction: Option<Arc<dyn RawAuctionHook>>,
    pub processed_auction: Option<Arc<dyn ProcessedAuctionHook>>,
    pub bidder_request: Option<Arc<dyn BidderRequestHook>>,
    pub raw_bidder_response: Option<Arc<dyn RawBidderResponseHook>>,
    pub processed_bid_response: Option<Arc<dyn ProcessedBidResponseHook>>,
    pub all_processed_bid_responses: Option<Arc<dyn AllProcessedBidResponsesHook>>,
    pub auction_response: Option<Arc<dyn AuctionResponseHook>>,
}

impl HookSet {
    pub fn is_empty(&self) -> bool {
        self.entrypoint.is_none()
            && self.raw_auction.is_none()
            && self.processed_auction.is_none()
            && self.bidder_request.is_none()
            && self.raw_bidder_response.is_none()
            && self.processed_bid_response.is_none()
            && self.all_processed_bid_responses.is_none()
            && self.auction_response.is_none()
    }
}

impl std::fmt::Debug for HookSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookSet")
            .field("entrypoint", &self.entrypoint.is_some())
            .field("raw_auction", &self.raw_auction.is_some())
            .field("processed_auction", &self.processed_auction.is_some())
            .field("bidder_request", &self.bidder_request.is_some())
            .field("raw_bidder_response", &self.raw_bidder_response.is_some())
            .field("processed_bid_response", &self.processed_bid_response.is_some())
            .field(
                "all_processed_bid_responses",
                &self.all_processed_bid_responses.is_some(),
            )
            .field("auction_response", &self.auction_response.is_some())
            .finish()
    }
}

/// Registered hook implementations indexed by `(module, hook code)`, with a
/// typed lookup per stage. Populated once at boot; read-only afterwards.
#[derive(Debug, Default)]
pub struct HookRepository {
    hooks: HashMap<(String, String), HookSet>,
}

impl HookRepository {
    pub fn register(&mut self, module: &str, code: &str, set: HookSet) -> Result<(), ConfigError> {
        if set.is_empty() {
            return Err(ConfigError::EmptyHookSet {
                module: module.to_string(),
                code: code.to_string(),
            });
        }
        let key = (module.to_string(), code.to_string());
        if self.hooks.contains_key(&key) {
            return Err(ConfigError::DuplicateHook {
                module: module.to_string(),
                code: code.to_string(),
            });
        }
        self.hooks.insert(key, set);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    fn get(&self, module: &str, code: &str) -> Option<&HookSet> {
        self.hooks.get(&(module.to_string(), code.to_string()))
    }

    pub fn entrypoint_hook(&self, module: &str, code: &str) -> Option<Arc<dyn EntrypointHook>> {
        self.get(module, code).and_then(|s| s.entrypoint.clone())
    }

    pub fn raw_auction_hook(&self, module: &str, code: &str) -> Option<Arc<dyn RawAuctionHook>> {
        self.get(module, code).and_then(|s| s.raw_auction.clone())
    }

    pub fn processed_auction_hook(
        &self,
        module: &str,
        code: &str,
    ) -> Option<Arc<dyn ProcessedAuctionHook>> {
        self.get(module, code).and_then(|s| s.processed_auction.clone())
    }

    pub fn bidder_request_hook(&self, module: &str, code: &str) -> Option<Arc<dyn BidderRequestHook>> {
        self.get(module, code).and_then(|s| s.bidder_request.clone())
    }

    pub fn raw_bidder_response_hook(
        &self,
        module: &str,
        code: &str,
    ) -> Option<Arc<dyn RawBidderResponseHook>> {
        self.get(module, code).and_then(|s| s.raw_bidder_response.clone())
    }

    pub fn processed_bid_response_hook(
        &self,
        module: &str,
        code: &str,
    ) -> Option<Arc<dyn ProcessedBidResponseHook>> {
        self.get(module, code).and_then(|s| s.processed_bid_response.clone())
    }

    pub fn all_processed_bid_responses_hook(
        &self,
        module: &str,
        code: &str,
    ) -> Option<Arc<dyn AllProcessedBidResponsesHook>> {
        self.get(module, code)
            .and_then(|s| s.all_processed_bid_responses.clone())
    }

    pub fn auction_response_hook(
        &self,
        module: &str,
        code: &str,
    ) -> Option<Arc<dyn AuctionResponseHook>> {
        self.get(module, code).and_then(|s| s.auction_response.clone())
    }
}
