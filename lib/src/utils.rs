use crate::consts::TIME_LAYOUT;
use chrono::NaiveDateTime;
use rand::RngCore;

/// Random identifier of `len` bytes from the OS RNG, hex encoded.
pub fn random_hex_id(len: usize) -> String {
    let mut buf = vec![0u8; len];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

/// The current UTC time in the canonical layout.
pub fn now_string() -> String {
    chrono::Utc::now().format(TIME_LAYOUT).to_string()
}

/// Parse a timestamp in the canonical layout.
pub fn parse_timestamp(raw: &str) -> chrono::ParseResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIME_LAYOUT)
}
