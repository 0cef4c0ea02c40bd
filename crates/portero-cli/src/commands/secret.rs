//! Secret generation.

use portero_token::ClaimsCodec;

/// Print a fresh signing secret: 32 random bytes, hex encoded.
///
/// Only the secret goes to stdout so the output can be piped.
pub fn run_secret() {
    println!("{}", ClaimsCodec::generate_hex_secret());
}
