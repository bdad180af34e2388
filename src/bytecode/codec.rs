//! Binary framing for class images.
//!
//! Layout: 4-byte magic, 1-byte format version, 1 reserved byte, then
//! the bincode-encoded [`ClassImage`]. The version byte guards the disk
//! cache across engine upgrades: a stale image decodes to
//! [`ImageError::Version`] and the caller falls back to recompiling.

use thiserror::Error;

use super::image::ClassImage;

/// Magic number identifying a class image.
pub const MAGIC: [u8; 4] = *b"KILN";

/// Current image format version.
pub const CURRENT_VERSION: u8 = 2;

const HEADER_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image truncated ({0} bytes, header needs {HEADER_LEN})")]
    Truncated(usize),

    #[error("bad magic number")]
    BadMagic,

    #[error("unsupported image format version {0} (current is {CURRENT_VERSION})")]
    Version(u8),

    #[error("trailing garbage after image body")]
    TrailingBytes,

    #[error("malformed image body: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("image encoding failed: {0}")]
    Encode(#[from] bincode::error::EncodeError),
}

/// Encode an image with its framing header.
pub fn encode_image(image: &ClassImage) -> Result<Vec<u8>, ImageError> {
    let body = bincode::serde::encode_to_vec(image, bincode::config::standard())?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
    bytes.extend_from_slice(&MAGIC);
    bytes.push(CURRENT_VERSION);
    bytes.push(0); // reserved
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

/// Decode an image, validating the framing header.
pub fn decode_image(bytes: &[u8]) -> Result<ClassImage, ImageError> {
    if bytes.len() < HEADER_LEN {
        return Err(ImageError::Truncated(bytes.len()));
    }
    if bytes[..4] != MAGIC {
        return Err(ImageError::BadMagic);
    }
    if bytes[4] != CURRENT_VERSION {
        return Err(ImageError::Version(bytes[4]));
    }
    let body = &bytes[HEADER_LEN..];
    let (image, consumed) =
        bincode::serde::decode_from_slice::<ClassImage, _>(body, bincode::config::standard())?;
    if consumed != body.len() {
        return Err(ImageError::TrailingBytes);
    }
    Ok(image)
}
