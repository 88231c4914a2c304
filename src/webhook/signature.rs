use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{digest::InvalidLength, Hmac, Mac};
use sha2::Sha256;

/// Header carrying the platform's signature of the raw request body.
pub const SIGNATURE_HEADER: &str = "x-line-signature";

/// Verify a LINE webhook signature: base64 of HMAC-SHA256 over the raw body,
/// keyed with the channel secret.
pub fn verify(channel_secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = BASE64.decode(signature.trim()) else {
        return false;
    };

    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(channel_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);

    // Constant-time comparison
    mac.verify_slice(&expected).is_ok()
}

/// Signature the platform would send for `body`.
pub fn sign(channel_secret: &str, body: &[u8]) -> Result<String, InvalidLength> {
    let mut mac = Hmac::<Sha256>::new_from_slice(channel_secret.as_bytes())?;
    mac.update(body);
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}
