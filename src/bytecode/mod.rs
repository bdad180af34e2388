//! Class image model and binary codec.
//!
//! A [`ClassImage`] is the unit of compiled output: one declared class
//! (top-level or nested) with its superclass, fields, methods and
//! enhancement attributes. Images travel through the engine as raw
//! bytes (`Vec<u8>`) framed by a small magic+version header, so the
//! cache and the disk store never care about the structure inside.
//!
//! The [`Shape`] of an image is its live-swap compatibility key:
//! superclass, field signatures and method names. Two images with equal
//! shapes differ only in method bodies and can be redefined in place.

mod codec;
mod image;

pub use codec::{CURRENT_VERSION, ImageError, MAGIC, decode_image, encode_image};
pub use image::{ClassImage, FieldDecl, MethodBody, MethodDecl, Shape};
