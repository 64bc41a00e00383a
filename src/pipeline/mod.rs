pub mod page_pipeline;

pub use page_pipeline::PagePipeline;
