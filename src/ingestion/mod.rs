//! Turning uploaded PDFs into catalog records.

mod pipeline;
mod preview;
mod upload;

pub use pipeline::{Ingestor, IngestorConfig, DEFAULT_MAX_FILE_SIZE};
pub use preview::{
    image_data_url, CommandPreviewRenderer, NoPreview, PreviewRenderer, DEFAULT_PREVIEW_ARGS,
    DEFAULT_PREVIEW_PROGRAM,
};
pub use upload::{collect_pdf_paths, is_pdf, RawFile};
