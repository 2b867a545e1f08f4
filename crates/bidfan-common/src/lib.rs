pub mod account;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod native;
pub mod openrtb;
pub mod version;

pub use account::{Account, AlternateBidderCodes, AlternateBidderCodesBidder};
pub use config::{EndpointPlanConfig, ExecutionPlanConfig, GroupConfig, HookRefConfig, StagePlanConfig};
pub use errors::{BidderError, WarningCode};
pub use metrics::{InMemoryMetrics, MetricsSink, NilMetrics};
pub use openrtb::{App, Bid, BidRequest, BidResponse, Imp, NativeImp, SeatBid, Site};

pub mod telemetry;
