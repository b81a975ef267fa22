use hmac::{Hmac, Mac};
use sha2::Sha256;

// Create a type alias for the HMAC-SHA256 implementation.
type HmacSha256 = Hmac<Sha256>;

/// Creates the `api-signature` header value for a BitMEX request.
///
/// BitMEX signs `verb + path + expires + body`, where `path` is the full
/// request path including `/api/v1` and any query string exactly as sent,
/// and `body` is the JSON body (empty for GET).
///
/// # Returns
///
/// A hexadecimal string representation of the signature.
pub fn sign_request(secret: &str, verb: &str, path: &str, expires: i64, body: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");

    mac.update(verb.as_bytes());
    mac.update(path.as_bytes());
    mac.update(expires.to_string().as_bytes());
    mac.update(body.as_bytes());

    hex::encode(mac.finalize().into_bytes())
}
