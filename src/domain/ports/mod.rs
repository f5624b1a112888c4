mod image_codec_port;
mod image_fetch_port;

pub use image_codec_port::ImageCodecPort;
pub use image_fetch_port::ImageFetchPort;
