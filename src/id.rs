use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64, Engine};
use rand::RngCore;

/// number of random bytes in a generated session id
const ID_BYTES: usize = 32;

/// Generates a random, url-safe session id from 32 bytes of
/// thread-local cryptographic randomness.
///
/// # Example
///
/// ```rust
/// # use pluggable_session::{generate_id, is_well_formed_id};
/// let id = generate_id();
/// assert!(is_well_formed_id(&id));
/// assert_ne!(id, generate_id());
/// ```
pub fn generate_id() -> String {
    let mut key = [0u8; ID_BYTES];
    rand::thread_rng().fill_bytes(&mut key);
    BASE64.encode(key)
}

/// Returns true if `id` has the shape produced by [`generate_id`].
pub fn is_well_formed_id(id: &str) -> bool {
    BASE64
        .decode(id)
        .map(|bytes| bytes.len() == ID_BYTES)
        .unwrap_or(false)
}
