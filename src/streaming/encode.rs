use crate::error::StreamError;
use crate::frame::Frame;
use bytes::{BufMut, Bytes, BytesMut};
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use tracing::trace;

/// Multipart boundary used by every stream response
pub const BOUNDARY: &str = "frame";

/// Content type announced for multiplexed JPEG streams
pub const MULTIPART_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Encode a frame as a baseline JPEG at the given quality (1-100)
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Bytes, StreamError> {
    let (width, height) = frame.dimensions();
    let mut jpeg = Vec::with_capacity((width * height) as usize / 4);

    JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100))
        .encode(frame.image.as_raw(), width, height, ColorType::Rgb8)
        .map_err(|e| StreamError::Encode {
            details: format!("frame {}: {}", frame.id, e),
        })?;

    trace!("Encoded frame {} to {} JPEG bytes", frame.id, jpeg.len());
    Ok(Bytes::from(jpeg))
}

/// Wrap one JPEG in a multipart part:
/// `--frame\r\nContent-Type: image/jpeg\r\n\r\n<jpeg>\r\n`
pub fn multipart_part(jpeg: &[u8]) -> Bytes {
    let header = format!("--{}\r\nContent-Type: image/jpeg\r\n\r\n", BOUNDARY);
    let mut part = BytesMut::with_capacity(header.len() + jpeg.len() + 2);
    part.put_slice(header.as_bytes());
    part.put_slice(jpeg);
    part.put_slice(b"\r\n");
    part.freeze()
}
