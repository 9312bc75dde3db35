//! Shared key generation for storage backends.
//!
//! Key format: `media/{user_id}/{kind}/{timestamp_ms}-{suffix}.{ext}`.
//! The millisecond timestamp plus an 8-character random suffix keeps keys
//! collision-resistant across workers without any coordination; a fresh key
//! is generated per uploaded artifact, never reused.

use chrono::Utc;
use rand::distr::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

const SUFFIX_LEN: usize = 8;

/// Generate a storage key for a processed artifact.
///
/// `kind` names the artifact class (`video`, `audio`, `thumbnail`,
/// `waveform`), `ext` the file extension without a dot.
pub fn generate_media_key(user_id: Uuid, kind: &str, ext: &str) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect();

    format!(
        "media/{}/{}/{}-{}.{}",
        user_id,
        kind,
        Utc::now().timestamp_millis(),
        suffix,
        ext
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_has_expected_shape() {
        let user = Uuid::new_v4();
        let key = generate_media_key(user, "thumbnail", "jpg");
        assert!(key.starts_with(&format!("media/{}/thumbnail/", user)));
        assert!(key.ends_with(".jpg"));
        assert!(!key.contains(".."));
        assert!(!key.starts_with('/'));
    }

    #[test]
    fn consecutive_keys_differ() {
        let user = Uuid::new_v4();
        let a = generate_media_key(user, "video", "mp4");
        let b = generate_media_key(user, "video", "mp4");
        assert_ne!(a, b);
    }
}
