mod encode;
#[cfg(feature = "streaming")]
mod handlers;
#[cfg(feature = "streaming")]
mod server;
mod stats;
mod streamer;

pub use encode::{encode_jpeg, multipart_part, BOUNDARY, MULTIPART_CONTENT_TYPE};
#[cfg(feature = "streaming")]
pub use server::{router, StreamServer, StreamServerBuilder};
pub use stats::{StreamStats, StreamStatsSnapshot};
pub use streamer::{FrameStream, FrameStreamer, StreamTarget, StreamerContext};
