use argon2::password_hash::rand_core::{OsRng, RngCore};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

const INVITATION_TOKEN_BYTES: usize = 32;

/// 256 random bits, URL-safe. Used verbatim as the `token` query parameter.
pub(crate) fn generate_invitation_token() -> String {
    let mut bytes = [0u8; INVITATION_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
