use {
    hmac::{Hmac, Mac},
    sha2::Sha256,
};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the SoftPro 360 payload signature.
pub const SIGNATURE_HEADER: &str = "x-softpro-signature";

/// Verify an HMAC-SHA256 signature over the exact raw payload bytes.
///
/// Accepts `sha256=<hex>` or bare hex. Anything malformed, empty or
/// mismatched yields `false`; this never errors.
pub fn validate_signature(raw_payload: &[u8], signature_header: &str, secret: &str) -> bool {
    let sig = signature_header.trim();
    let hex_sig = sig.strip_prefix("sha256=").unwrap_or(sig);
    if hex_sig.is_empty() {
        return false;
    }

    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(raw_payload);

    // verify_slice compares in constant time.
    mac.verify_slice(&expected).is_ok()
}

/// `sha256=<hex>` signature for `raw_payload`, as the provider sends it.
pub fn sign_payload(raw_payload: &[u8], secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(raw_payload);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}
