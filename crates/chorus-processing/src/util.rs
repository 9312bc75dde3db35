use std::path::Path;

/// Lower-cased extension of a storage key or path, if any.
pub(crate) fn extension_of(key: &str) -> Option<String> {
    Path::new(key)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_extracted_and_lowercased() {
        assert_eq!(extension_of("media/u/raw/1-abc.MP4"), Some("mp4".to_string()));
        assert_eq!(extension_of("media/u/raw/noext"), None);
        assert_eq!(extension_of("a.tar.gz"), Some("gz".to_string()));
    }
}
