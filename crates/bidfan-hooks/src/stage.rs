/// The eight lifecycle stages at which hooks may run, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Entrypoint,
    RawAuction,
    ProcessedAuction,
    BidderRequest,
    RawBidderResponse,
    ProcessedBidResponse,
    AllProcessedBidResponses,
    AuctionResponse,
}

impl Stage {
    /// The stage's name as it appears in execution plan configuration.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Entrypoint => "entrypoint",
            Stage::RawAuction => "rawauction",
            Stage::ProcessedAuction => "procauction",
            Stage::BidderRequest => "bidrequest",
            Stage::RawBidderResponse => "rawbidresponse",
            Stage::ProcessedBidResponse => "procbidresponse",
            Stage::AllProcessedBidResponses => "allprocbidresponses",
            Stage::AuctionResponse => "auctionresponse",
        }
    }

    pub fn all() -> [Stage; 8] {
        [
            Stage::Entrypoint,
            Stage::RawAuction,
            Stage::ProcessedAuction,
            Stage::BidderRequest,
            Stage::RawBidderResponse,
            Stage::ProcessedBidResponse,
            Stage::AllProcessedBidResponses,
            Stage::AuctionResponse,
        ]
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
