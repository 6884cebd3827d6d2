//! Payload checks applied to every decoded image before it is persisted.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

/// Smallest payload accepted as a real image.
pub const MIN_IMAGE_BYTES: usize = 100_000;
/// Content type every payload is expected to carry.
pub const EXPECTED_CONTENT_TYPE: &str = "image/png";

/// Reason a payload was rejected. Every variant is retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    /// Every byte is zero: the service's placeholder for a failed render.
    #[error("Generated image was all black, retrying...")]
    Placeholder,

    #[error("Image too small: {len} bytes ({content_type})")]
    Undersized {
        len: usize,
        content_type: &'static str,
    },

    #[error("Error decoding image data: {0}")]
    Decode(String),
}

impl ValidationFailure {
    /// True when the payload was undersized and not a PNG at all.
    pub fn is_format_mismatch(&self) -> bool {
        matches!(self, ValidationFailure::Undersized { content_type, .. } if *content_type != EXPECTED_CONTENT_TYPE)
    }
}

/// Decode one base64 payload from a generation response.
pub fn decode_payload(encoded: &str) -> Result<Vec<u8>, ValidationFailure> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|err| ValidationFailure::Decode(err.to_string()))
}

/// Accept `bytes` unless it is an all-zero placeholder or smaller than
/// [`MIN_IMAGE_BYTES`].
pub fn validate_image(bytes: &[u8]) -> Result<(), ValidationFailure> {
    if bytes.iter().all(|byte| *byte == 0) {
        return Err(ValidationFailure::Placeholder);
    }
    if bytes.len() < MIN_IMAGE_BYTES {
        return Err(ValidationFailure::Undersized {
            len: bytes.len(),
            content_type: sniff_content_type(bytes),
        });
    }
    Ok(())
}

/// Best-effort content type from magic bytes.
pub fn sniff_content_type(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Png) => "image/png",
        Ok(image::ImageFormat::Jpeg) => "image/jpeg",
        Ok(image::ImageFormat::WebP) => "image/webp",
        Ok(image::ImageFormat::Gif) => "image/gif",
        _ if std::str::from_utf8(bytes).is_ok() => "text/plain",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

    fn png_of_len(len: usize) -> Vec<u8> {
        let mut bytes = PNG_MAGIC.to_vec();
        bytes.resize(len, 7);
        bytes
    }

    #[test]
    fn all_zero_buffer_is_placeholder_regardless_of_size() {
        assert_eq!(
            validate_image(&vec![0u8; MIN_IMAGE_BYTES * 2]),
            Err(ValidationFailure::Placeholder)
        );
        assert_eq!(validate_image(&[]), Err(ValidationFailure::Placeholder));
    }

    #[test]
    fn small_png_is_undersized_without_format_mismatch() {
        let err = validate_image(&png_of_len(2_048)).unwrap_err();
        assert_eq!(
            err,
            ValidationFailure::Undersized {
                len: 2_048,
                content_type: "image/png"
            }
        );
        assert!(!err.is_format_mismatch());
    }

    #[test]
    fn small_non_png_flags_format_mismatch() {
        let err = validate_image(b"{\"error\":\"oops\"}").unwrap_err();
        assert!(err.is_format_mismatch());
    }

    #[test]
    fn large_png_is_accepted() {
        assert_eq!(validate_image(&png_of_len(MIN_IMAGE_BYTES)), Ok(()));
    }

    #[test]
    fn decode_rejects_invalid_base64() {
        assert!(matches!(
            decode_payload("not base64!!"),
            Err(ValidationFailure::Decode(_))
        ));
        assert_eq!(decode_payload("aGk=").expect("decode"), b"hi");
    }
}
