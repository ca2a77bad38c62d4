pub mod channel;
pub mod encoder;

pub use channel::Channel;
pub use encoder::{decode, encode, DecodeError, PulseStream, StreamLayout, MAX_FRAME_WORDS};
