pub mod convert;
pub mod dataset;
pub mod error;
pub mod forest;
pub mod index;
pub mod ingest;
pub mod model;
pub mod render;
pub mod summarize;
pub mod thread;

pub use convert::{
    ConvertOptions, ConvertStats, Conversion, ExportAnalysis, ExportRow, default_analysis_path,
    default_output_path, load_chatgpt_export, save_analysis_report, save_rows_csv,
};
pub use dataset::{Dataset, NodeDetail};
pub use error::{ChatforestError, Result};
pub use forest::{ForestBuilder, Graph, build_forest};
pub use ingest::{LoadReport, load_rows_csv};
pub use model::{Edge, Node, NodeRole, Role, Row, ThreadMessage};
pub use render::{
    graph_to_raw_json, render_analysis_report, render_convert_markdown, render_forest_markdown,
    render_node_markdown, render_summary_markdown, render_thread_markdown,
};
pub use summarize::{
    GeminiSummarizer, PlaceholderSummarizer, Summarizer, SummarizerConfig, summarizer_from_config,
};
pub use thread::{Thread, ancestor_thread, conversation_thread};
