//! Serial wire protocol spoken by the dispensing controller.
//!
//! The firmware exchanges newline-terminated ASCII lines. This crate turns
//! raw bytes into trimmed text lines ([`LineCodec`]), classifies each line by
//! prefix ([`InboundLine`]) and renders outbound requests ([`OutboundFrame`]).

pub mod codec;
pub mod error;
pub mod line;

pub use codec::LineCodec;
pub use error::{ProtocolError, Result};
pub use line::{InboundLine, OutboundFrame};
