//! LLM-based structured data extraction from OCR'd receipt text.
//!
//! The pipeline: acquire text through a [`TextSource`], render the
//! `receipt` prompt, dispatch to a chat- or completion-style model,
//! locate and decode the JSON in the response, and normalize it into a
//! validated [`Receipt`]. [`ReceiptScanner::scan`] is the public entry
//! point; everything else is internal composition behind injectable
//! collaborator traits.

pub mod config;
pub mod error;
pub mod llm;
pub mod normalize;
pub mod parse;
pub mod pdf_text;
pub mod prompt;
pub mod receipt;
pub mod scan;
pub mod text_source;

pub use config::Config;
pub use error::{Result, ScanError};
pub use llm::{CompletionKind, LlmClient, ModelName, OpenAiClient};
pub use pdf_text::PdfText;
pub use prompt::{EmbeddedTemplates, FsTemplateStore, TemplateStore};
pub use receipt::{Currency, LineItem, Merchant, Receipt};
pub use scan::ReceiptScanner;
pub use text_source::{
    DirectOcr, FsObjectStorage, ObjectStorage, OcrService, OcrViaUpload, PlainText, RemoteOcr,
    TextContent, TextSource,
};
