//! Aliyun RPC-style request signing (signature version 1.0)
//!
//! ```text
//! canonical      = join("&", sorted(enc(key) "=" enc(value)))
//! string_to_sign = METHOD "&" enc("/") "&" enc(canonical)
//! signature      = base64(HMAC-SHA1(secret "&", string_to_sign))
//! ```
//!
//! `enc` is RFC 3986 percent-encoding: only `A-Z a-z 0-9 - _ . ~` are left
//! as is, space becomes `%20`. The server recomputes this byte for byte.

use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::collections::BTreeMap;

type HmacSha1 = Hmac<Sha1>;

pub fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Sorted, encoded `key=value` pairs joined with `&`.
pub fn canonicalize(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{}={}", percent_encode(key), percent_encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn string_to_sign(method: &str, canonical: &str) -> String {
    format!(
        "{}&{}&{}",
        method,
        percent_encode("/"),
        percent_encode(canonical)
    )
}

/// Signature of `params` (which must not contain `Signature` itself).
pub fn sign(method: &str, params: &BTreeMap<String, String>, access_key_secret: &str) -> String {
    let string_to_sign = string_to_sign(method, &canonicalize(params));

    let key = format!("{}&", access_key_secret);
    let mut mac = HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(string_to_sign.as_bytes());

    STANDARD.encode(mac.finalize().into_bytes())
}
