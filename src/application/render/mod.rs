//! Output-format renderers and the capabilities they delegate to.
//!
//! Renderers are pure with respect to the job store: they turn a parsed
//! document into bytes and leave persistence to the caller. Markdown to
//! structured document and HTML to PDF are delegated to external tools behind
//! the [`DocumentEngine`] and [`PdfEngine`] traits; Markdown to HTML runs
//! in-process.

mod docx;
mod front_matter_block;
mod pdf;
mod service;
mod stylesheet;
mod types;

pub use docx::DocxRenderer;
pub use pdf::PdfRenderer;
pub use service::{ComrakHtmlEngine, ExternalTool, PandocEngine, ToolProbe, WeasyPrintEngine};
pub use types::{
    ConversionError, ConversionOptions, DocumentEngine, EngineError, HtmlEngine, PdfEngine,
    RenderState, Renderer,
};
