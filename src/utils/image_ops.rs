use base64::{engine::general_purpose, Engine};
use image::ImageReader;
use std::io::Cursor;
use std::sync::Arc;

use crate::core::errors::ImageProbeError;

/// Encode raw image bytes as a `data:` URI.
pub fn encode_data_uri(content_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        content_type,
        general_purpose::STANDARD.encode(bytes)
    )
}

/// Best-effort MIME type from the image's magic bytes.
pub fn guess_content_type(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes).ok().map(|format| format.to_mime_type())
}

/// Read native pixel dimensions from the image header without decoding pixels.
pub fn probe_dimensions(bytes: &[u8]) -> Result<(u32, u32), ImageProbeError> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    Ok(reader.into_dimensions()?)
}

/// Asynchronously probe dimensions using spawn_blocking so large headers
/// (progressive JPEG, big WebP) never stall the runtime.
pub async fn probe_dimensions_async(bytes: Arc<Vec<u8>>) -> Result<(u32, u32), ImageProbeError> {
    tokio::task::spawn_blocking(move || probe_dimensions(&bytes))
        .await
        .map_err(|e| ImageProbeError::Join(e.to_string()))?
}
