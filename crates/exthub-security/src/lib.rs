mod checksum;
mod signing;

pub use checksum::{sha256_hex, short_digest};
pub use signing::TrustedKey;
