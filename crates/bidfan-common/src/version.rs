use crate::openrtb::BidRequest;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Builds the `X-Prebid` header value: the server identity, plus the client
/// channel advertised in `ext.prebid.channel` when present.
pub fn x_prebid_header(request: &BidRequest, version: &str) -> String {
    let server = format!("bidfan/{version}");

    let channel = request.prebid_ext("channel").and_then(|c| {
        let name = c.get("name")?.as_str()?;
        if name.is_empty() {
            return None;
        }
        match c.get("version").and_then(|v| v.as_str()) {
            Some(ver) if !ver.is_empty() => Some(format!("{name}/{ver}")),
            _ => Some(name.to_string()),
        }
    });

    match channel {
        Some(channel) => format!("{channel},{server}"),
        None => server,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_only() {
        let req = BidRequest::default();
        assert_eq!(x_prebid_header(&req, "0.4.0"), "bidfan/0.4.0");
    }

    #[test]
    fn test_with_channel() {
        let req = BidRequest {
            ext: serde_json::json!({"prebid": {"channel": {"name": "pbjs", "version": "7.32"}}}),
            ..Default::default()
        };
        assert_eq!(x_prebid_header(&req, "0.4.0"), "pbjs/7.32,bidfan/0.4.0");
    }

    #[test]
    fn test_channel_without_version() {
        let req = BidRequest {
            ext: serde_json::json!({"prebid": {"channel": {"name": "amp"}}}),
            ..Default::default()
        };
        assert_eq!(x_prebid_header(&req, "0.4.0"), "amp,bidfan/0.4.0");
    }
}
