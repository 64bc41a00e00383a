pub mod geometry;
pub mod image_ops;
pub mod metrics;

// Re-export commonly used items
pub use geometry::{layout_overlay, scale_bbox, DisplayScale, OverlayBox, ScreenRect};
pub use image_ops::{encode_data_uri, guess_content_type, probe_dimensions, probe_dimensions_async};
pub use metrics::Metrics;
