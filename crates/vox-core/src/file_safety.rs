//! Upload validation for media submissions.
//!
//! Multi-layer protection:
//! 1. Size ceiling
//! 2. Extension allowlist (audio and video containers only)
//! 3. Magic byte detection for executables masquerading as media

use once_cell::sync::Lazy;
use std::collections::HashSet;

use crate::defaults::{AUDIO_EXTENSIONS, VIDEO_EXTENSIONS};
use crate::{Error, FileType, Result};

/// Magic byte signatures for executable files
pub const MAGIC_SIGNATURES: &[(&str, &[u8])] = &[
    ("Windows PE/MZ", &[0x4D, 0x5A]),           // MZ header
    ("ELF", &[0x7F, 0x45, 0x4C, 0x46]),         // Linux ELF
    ("Mach-O 32", &[0xFE, 0xED, 0xFA, 0xCE]),   // macOS 32-bit
    ("Mach-O 64", &[0xFE, 0xED, 0xFA, 0xCF]),   // macOS 64-bit
    ("Mach-O Fat", &[0xCA, 0xFE, 0xBA, 0xBE]),  // Universal binary (also Java)
    ("WebAssembly", &[0x00, 0x61, 0x73, 0x6D]), // WASM
];

static AUDIO: Lazy<HashSet<&'static str>> =
    Lazy::new(|| AUDIO_EXTENSIONS.iter().copied().collect());

static VIDEO: Lazy<HashSet<&'static str>> =
    Lazy::new(|| VIDEO_EXTENSIONS.iter().copied().collect());

fn extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Map a file name to its media category by extension.
pub fn classify_extension(filename: &str) -> Option<FileType> {
    let ext = extension(filename)?;
    if AUDIO.contains(ext.as_str()) {
        Some(FileType::Audio)
    } else if VIDEO.contains(ext.as_str()) {
        Some(FileType::Video)
    } else {
        None
    }
}

/// Validate an uploaded file before any job is created.
pub fn validate_upload(filename: &str, data: &[u8], max_size_bytes: u64) -> Result<FileType> {
    if filename.trim().is_empty() {
        return Err(Error::InvalidInput("No file selected".to_string()));
    }
    if data.is_empty() {
        return Err(Error::InvalidInput("Uploaded file is empty".to_string()));
    }
    if data.len() as u64 > max_size_bytes {
        return Err(Error::PayloadTooLarge(format!(
            "File exceeds maximum size of {} bytes",
            max_size_bytes
        )));
    }

    let file_type = classify_extension(filename).ok_or_else(|| {
        Error::UnsupportedFormat(format!(
            "File type not supported. Allowed: {}",
            AUDIO_EXTENSIONS
                .iter()
                .chain(VIDEO_EXTENSIONS)
                .copied()
                .collect::<Vec<_>>()
                .join(", ")
        ))
    })?;

    for (name, magic) in MAGIC_SIGNATURES {
        if data.starts_with(magic) {
            return Err(Error::UnsupportedFormat(format!(
                "Executable file detected: {}",
                name
            )));
        }
    }

    Ok(file_type)
}

/// Detect the MIME type of media bytes.
///
/// Magic bytes win; otherwise the extension decides, and anything unknown is
/// reported as `application/octet-stream`.
pub fn detect_content_type(filename: &str, data: &[u8]) -> String {
    if let Some(kind) = infer::get(data) {
        return kind.mime_type().to_string();
    }

    extension(filename)
        .and_then(|ext| mime_from_extension(&ext))
        .unwrap_or("application/octet-stream")
        .to_string()
}

fn mime_from_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "mp3" => Some("audio/mpeg"),
        "wav" => Some("audio/wav"),
        "flac" => Some("audio/flac"),
        "m4a" => Some("audio/mp4"),
        "aac" => Some("audio/aac"),
        "ogg" => Some("audio/ogg"),
        "wma" => Some("audio/x-ms-wma"),
        "mp4" => Some("video/mp4"),
        "avi" => Some("video/x-msvideo"),
        "mov" => Some("video/quicktime"),
        "wmv" => Some("video/x-ms-wmv"),
        "flv" => Some("video/x-flv"),
        "webm" => Some("video/webm"),
        "mkv" => Some("video/x-matroska"),
        _ => None,
    }
}

/// Sanitize filename for safe storage
pub fn sanitize_filename(filename: &str) -> String {
    // Remove path components
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' | '\0' | ' ' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let sanitized = sanitized.trim_matches(|c| c == '.' || c == '_');
    if sanitized.is_empty() {
        return "unnamed_file".to_string();
    }

    // Truncate on a char boundary, keeping the extension
    if sanitized.len() > 200 {
        let (stem, ext) = match sanitized.rfind('.') {
            Some(dot) if sanitized.len() - dot <= 10 => sanitized.split_at(dot),
            _ => (sanitized, ""),
        };
        let mut cut = 200 - ext.len();
        while !stem.is_char_boundary(cut) {
            cut -= 1;
        }
        return format!("{}{}", &stem[..cut], ext);
    }

    sanitized.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID3_HEADER: &[u8] = b"ID3\x03\x00\x00\x00\x00\x00\x00";

    #[test]
    fn test_classify_audio_and_video() {
        assert_eq!(classify_extension("talk.mp3"), Some(FileType::Audio));
        assert_eq!(classify_extension("TALK.WAV"), Some(FileType::Audio));
        assert_eq!(classify_extension("clip.mkv"), Some(FileType::Video));
        assert_eq!(classify_extension("notes.txt"), None);
        assert_eq!(classify_extension("no_extension"), None);
        assert_eq!(classify_extension("trailing."), None);
    }

    #[test]
    fn test_validate_accepts_media() {
        let result = validate_upload("meeting.mp3", ID3_HEADER, 1_000);
        assert_eq!(result.unwrap(), FileType::Audio);
    }

    #[test]
    fn test_validate_rejects_empty() {
        let err = validate_upload("meeting.mp3", b"", 1_000).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        let err = validate_upload("", b"data", 1_000).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_validate_rejects_unsupported_extension() {
        let err = validate_upload("document.pdf", b"%PDF-1.4", 1_000).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
        assert!(err.to_string().contains("mp3"));
    }

    #[test]
    fn test_validate_rejects_oversized() {
        let err = validate_upload("big.wav", &[0u8; 101], 100).unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge(_)));
        assert!(err.to_string().contains("exceeds maximum size"));
    }

    #[test]
    fn test_size_boundary_is_inclusive() {
        assert!(validate_upload("edge.wav", &[0u8; 100], 100).is_ok());
        assert!(validate_upload("edge.wav", &[0u8; 101], 100).is_err());
    }

    #[test]
    fn test_validate_blocks_disguised_executables() {
        let err = validate_upload("song.mp3", b"MZ\x90\x00", 1_000).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
        assert!(err.to_string().contains("Windows PE"));

        let err = validate_upload("clip.mp4", b"\x7FELF\x02\x01", 1_000).unwrap_err();
        assert!(err.to_string().contains("ELF"));
    }

    #[test]
    fn test_detect_by_magic_bytes() {
        assert_eq!(detect_content_type("upload.bin", ID3_HEADER), "audio/mpeg");
    }

    #[test]
    fn test_detect_falls_back_to_extension() {
        assert_eq!(detect_content_type("voice.m4a", b"\x01\x02\x03"), "audio/mp4");
        assert_eq!(detect_content_type("clip.webm", b"\x01\x02\x03"), "video/webm");
    }

    #[test]
    fn test_detect_unknown() {
        assert_eq!(
            detect_content_type("data.xyz", b"\x01\x02\x03"),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_sanitize_removes_path() {
        assert_eq!(sanitize_filename("/etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\talk.mp3"), "talk.mp3");
    }

    #[test]
    fn test_sanitize_replaces_dangerous_chars() {
        assert_eq!(sanitize_filename("my talk?.mp3"), "my_talk_.mp3");
        assert_eq!(sanitize_filename("a<b>c.wav"), "a_b_c.wav");
    }

    #[test]
    fn test_sanitize_handles_empty_and_dots() {
        assert_eq!(sanitize_filename(""), "unnamed_file");
        assert_eq!(sanitize_filename(".."), "unnamed_file");
        assert_eq!(sanitize_filename("../"), "unnamed_file");
    }

    #[test]
    fn test_sanitize_truncates_long_names() {
        let long_name = format!("{}.mp3", "é".repeat(300));
        let sanitized = sanitize_filename(&long_name);
        assert!(sanitized.len() <= 200);
        assert!(sanitized.ends_with(".mp3"));
    }
}
