use std::path::Path;

const FALLBACK_MIME: &str = "application/octet-stream";

/// Guesses the MIME type of media to upload, sniffing magic bytes before
/// falling back to the file extension.
pub fn detect_mime(path: &Path, bytes: &[u8]) -> &'static str {
    if let Some(mime) = sniff(bytes) {
        return mime;
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("pdf") => "application/pdf",
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("txt") => "text/plain",
        Some("json") => "application/json",
        Some("jsonl") => "application/jsonl",
        _ => {
            tracing::warn!(
                "Unrecognized media type for {} (first 4 bytes: {:02X?}), falling back to {}",
                path.display(),
                &bytes[..bytes.len().min(4)],
                FALLBACK_MIME
            );
            FALLBACK_MIME
        }
    }
}

fn sniff(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x41, 0x56, 0x45, ..] => Some("audio/wav"),
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        [0x25, 0x50, 0x44, 0x46, ..] => Some("application/pdf"),
        [_, _, _, _, 0x66, 0x74, 0x79, 0x70, b'q', b't', ..] => Some("video/quicktime"),
        [_, _, _, _, 0x66, 0x74, 0x79, 0x70, ..] => Some("video/mp4"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(name: &str, bytes: &[u8]) -> &'static str {
        detect_mime(Path::new(name), bytes)
    }

    #[test]
    fn test_detect_png() {
        assert_eq!(
            detect("logo", &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A]),
            "image/png"
        );
    }

    #[test]
    fn test_detect_jpeg() {
        assert_eq!(detect("photo", &[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
    }

    #[test]
    fn test_detect_webp() {
        assert_eq!(
            detect(
                "a",
                &[0x52, 0x49, 0x46, 0x46, 0x00, 0x00, 0x00, 0x00, 0x57, 0x45, 0x42, 0x50]
            ),
            "image/webp"
        );
    }

    #[test]
    fn test_detect_mp4_and_quicktime() {
        assert_eq!(
            detect("clip", &[0, 0, 0, 0x20, b'f', b't', b'y', b'p', b'i', b's', b'o', b'm']),
            "video/mp4"
        );
        assert_eq!(
            detect("clip", &[0, 0, 0, 0x14, b'f', b't', b'y', b'p', b'q', b't', b' ', b' ']),
            "video/quicktime"
        );
    }

    #[test]
    fn test_magic_bytes_win_over_extension() {
        assert_eq!(detect("mislabeled.png", &[0xFF, 0xD8, 0xFF, 0xDB]), "image/jpeg");
    }

    #[test]
    fn test_extension_fallback_is_case_insensitive() {
        assert_eq!(detect("notes.TXT", b"hello"), "text/plain");
        assert_eq!(detect("requests.jsonl", b"{}"), "application/jsonl");
    }

    #[test]
    fn test_unknown_falls_back_to_octet_stream() {
        assert_eq!(detect("blob.bin", &[0x00, 0x01, 0x02, 0x03]), FALLBACK_MIME);
        assert_eq!(detect("empty", &[]), FALLBACK_MIME);
    }
}
