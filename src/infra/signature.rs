use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Verifies a gateway webhook signature header of the form
/// `sha512=<hex digest>` against the raw request body. The core records the
/// signature either way; the ingesting edge decides whether to reject.
pub fn verify_signature(payload: &str, signature_header: &str, secret: &str) -> bool {
    let hex_digest = match signature_header
        .strip_prefix("sha512=")
        .or_else(|| signature_header.strip_prefix("SHA512="))
    {
        Some(digest) => digest,
        None => return false,
    };
    let expected = match hex::decode(hex_digest) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = match HmacSha512::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(payload.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

/// Signs a payload the way the gateway does; used by tests and local tools.
pub fn sign_payload(payload: &str, secret: &str) -> String {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .expect("hmac accepts keys of any length");
    mac.update(payload.as_bytes());
    format!("sha512={}", hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_verifies() {
        let signature = sign_payload("{\"id\":1}", "secret");
        assert!(verify_signature("{\"id\":1}", &signature, "secret"));
        // Uppercase scheme is accepted too.
        let upper = signature.replacen("sha512=", "SHA512=", 1);
        assert!(verify_signature("{\"id\":1}", &upper, "secret"));
    }

    #[test]
    fn tampered_payload_fails() {
        let signature = sign_payload("{\"id\":1}", "secret");
        assert!(!verify_signature("{\"id\":2}", &signature, "secret"));
        assert!(!verify_signature("{\"id\":1}", &signature, "other-secret"));
    }

    #[test]
    fn malformed_headers_fail_closed() {
        assert!(!verify_signature("{}", "", "secret"));
        assert!(!verify_signature("{}", "md5=abc", "secret"));
        assert!(!verify_signature("{}", "sha512=not-hex", "secret"));
    }
}
