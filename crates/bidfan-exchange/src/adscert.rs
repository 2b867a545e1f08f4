/// Header carrying the ads.cert call-sign signature on outbound requests.
pub const SIGN_HEADER: &str = "X-Ads-Cert-Auth";

/// Ads-cert request signer. The cryptographic implementation lives with the
/// host; the runner only needs a signature string for the outbound call.
pub trait Signer: Send + Sync {
    fn sign(&self, destination_url: &str, body: &[u8]) -> Result<String, String>;
}

/// Signer used when the feature is off; always produces an empty signature.
#[derive(Debug, Default)]
pub struct NilSigner;

impl Signer for NilSigner {
    fn sign(&self, _destination_url: &str, _body: &[u8]) -> Result<String, String> {
        Ok(String::new())
    }
}
