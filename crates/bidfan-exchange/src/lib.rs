pub mod adscert;
pub mod bidder;
pub mod client_trace;
pub mod currency;
pub mod debug;
pub mod fanout;
pub mod native;

pub use adscert::{NilSigner, Signer};
pub use bidder::{
    BidRequestOptions, BidderAdapter, BidderAdapterConfig, BidderRequest, Compression,
    NormalizedBid, NormalizedSeatBid, TimeoutNotificationConfig,
};
pub use client_trace::{ClientTrace, TracingResolver};
pub use currency::{ConversionError, Conversions, StaticRates};
pub use debug::HttpCallDebug;
pub use fanout::{run_auction, AuctionDeps, AuctionResult};
