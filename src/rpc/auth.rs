//! Challenge-response handshake run over a fresh framed connection before any
//! RPC traffic.
//!
//! The challenging side sends [`CHALLENGE`] followed by a tagged random nonce,
//! the answering side replies with `HMAC-SHA256(secret, nonce)` and the
//! challenger answers with [`WELCOME`] or [`FAILURE`].

use crate::rpc::transport::{FrameReader, FrameWriter};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::io::{self, Read, Write};

pub const CHALLENGE: &[u8] = b"#CHALLENGE#";
pub const WELCOME: &[u8] = b"#WELCOME#";
pub const FAILURE: &[u8] = b"#FAILURE#";

/// Digest tag prepended to nonces and responses.
pub const DIGEST_TAG: &[u8] = b"{sha256}";
/// Number of random bytes in a nonce.
pub const NONCE_LEN: usize = 40;
/// Shortest nonce an answering side accepts.
const MIN_NONCE_LEN: usize = 20;
/// Handshake messages are tiny, anything above this is rejected unread.
const MAX_MESSAGE_LEN: usize = 256;
/// A digest tag must close within this many bytes.
const MAX_TAG_LEN: usize = 20;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("digest received was wrong")]
    WrongDigest,
    #[error("digest sent was rejected")]
    Rejected,
    #[error("challenge expected, got {0} bytes without the marker")]
    NoChallenge(usize),
    #[error("challenge too short: {0} bytes")]
    ChallengeTooShort(usize),
    #[error("unsupported digest `{0}`")]
    UnsupportedDigest(String),
    #[error(transparent)]
    IO(#[from] io::Error),
}

/// Answer a challenge sent by the peer.
pub fn answer_challenge<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    secret: &[u8],
) -> Result<(), AuthError> {
    let message = reader.recv_bytes_max(MAX_MESSAGE_LEN)?;
    let nonce = message
        .strip_prefix(CHALLENGE)
        .ok_or(AuthError::NoChallenge(message.len()))?;
    if nonce.len() < MIN_NONCE_LEN {
        return Err(AuthError::ChallengeTooShort(nonce.len()));
    }

    writer.send_bytes(&create_response(secret, nonce)?)?;

    let verdict = reader.recv_bytes_max(MAX_MESSAGE_LEN)?;
    if verdict != WELCOME {
        return Err(AuthError::Rejected);
    }
    Ok(())
}

/// Challenge the peer and check its answer.
pub fn deliver_challenge<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    secret: &[u8],
) -> Result<(), AuthError> {
    let mut nonce = DIGEST_TAG.to_vec();
    let mut random = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut random);
    nonce.extend_from_slice(&random);

    writer.send_bytes(&[CHALLENGE, &nonce[..]].concat())?;

    let response = reader.recv_bytes_max(MAX_MESSAGE_LEN)?;
    if verify_response(secret, &nonce, &response) {
        writer.send_bytes(WELCOME)?;
        Ok(())
    } else {
        writer.send_bytes(FAILURE)?;
        Err(AuthError::WrongDigest)
    }
}

fn mac(secret: &[u8]) -> HmacSha256 {
    HmacSha256::new_from_slice(secret).expect("hmac accepts keys of any size")
}

fn digest_tag(message: &[u8]) -> Option<&[u8]> {
    if message.first() != Some(&b'{') {
        return None;
    }
    let end = message.iter().take(MAX_TAG_LEN).position(|&b| b == b'}')?;
    Some(&message[..=end])
}

fn create_response(secret: &[u8], nonce: &[u8]) -> Result<Vec<u8>, AuthError> {
    let mut mac = mac(secret);
    mac.update(nonce);
    let digest = mac.finalize().into_bytes();

    match digest_tag(nonce) {
        None => Ok(digest.to_vec()),
        Some(tag) if tag == DIGEST_TAG => Ok([DIGEST_TAG, &digest[..]].concat()),
        Some(tag) => Err(AuthError::UnsupportedDigest(
            String::from_utf8_lossy(tag).into_owned(),
        )),
    }
}

fn verify_response(secret: &[u8], nonce: &[u8], response: &[u8]) -> bool {
    let digest = response.strip_prefix(DIGEST_TAG).unwrap_or(response);
    let mut mac = mac(secret);
    mac.update(nonce);
    mac.verify_slice(digest).is_ok()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tagged_nonce_gets_tagged_response() {
        let nonce = [DIGEST_TAG, &[7u8; NONCE_LEN]].concat();
        let response = create_response(b"secret password", &nonce).unwrap();
        assert!(response.starts_with(DIGEST_TAG));
        assert_eq!(response.len(), DIGEST_TAG.len() + 32);
        assert!(verify_response(b"secret password", &nonce, &response));
        assert!(!verify_response(b"other", &nonce, &response));
    }

    #[test]
    fn test_raw_nonce_gets_raw_response() {
        let nonce = [3u8; NONCE_LEN];
        let response = create_response(b"key", &nonce).unwrap();
        assert_eq!(response.len(), 32);
        assert!(verify_response(b"key", &nonce, &response));
    }

    #[test]
    fn test_unknown_digest_rejected() {
        let nonce = [b"{md5}".as_slice(), &[1u8; NONCE_LEN]].concat();
        assert!(matches!(
            create_response(b"key", &nonce),
            Err(AuthError::UnsupportedDigest(tag)) if tag == "{md5}"
        ));
    }

    #[test]
    fn test_hmac_sha256_reference_vector() {
        // RFC 4231, test case 2
        let mut mac = mac(b"Jefe");
        mac.update(b"what do ya want for nothing?");
        let digest = mac.finalize().into_bytes();
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        assert_eq!(
            hex,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }
}
