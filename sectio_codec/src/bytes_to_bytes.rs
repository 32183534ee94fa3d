//! Bytes to bytes codecs.

pub mod deflate;
pub mod none;
