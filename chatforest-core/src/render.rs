use std::collections::HashMap;
use std::path::Path;

use crate::convert::{Conversion, ExportAnalysis};
use crate::dataset::{Dataset, NodeDetail};
use crate::error::{ChatforestError, Result};
use crate::forest::Graph;
use crate::thread::Thread;

pub fn graph_to_raw_json(graph: &Graph) -> Result<String> {
    serde_json::to_string_pretty(graph)
        .map_err(|err| ChatforestError::Serialization(err.to_string()))
}

pub fn render_forest_markdown(dataset: &Dataset) -> String {
    let graph = dataset.graph();
    let mut rows_per_conversation = HashMap::<&str, usize>::new();
    for row in dataset.rows() {
        *rows_per_conversation
            .entry(row.conversation_id.as_str())
            .or_default() += 1;
    }

    let roots: Vec<_> = graph.conversation_roots().collect();
    let mut output = String::new();
    output.push_str("# Chat Forest\n\n");
    if let Some(source) = dataset.source() {
        output.push_str(&format!("- Source: `{}`\n", source.display()));
    }
    output.push_str(&format!("- Messages: `{}`\n", graph.message_count()));
    output.push_str(&format!("- Conversations: `{}`\n", roots.len()));
    if dataset.dropped_rows() > 0 {
        output.push_str(&format!("- Dropped Rows: `{}`\n", dataset.dropped_rows()));
    }
    output.push('\n');

    if roots.is_empty() {
        output.push_str("_No conversations found._\n");
        return output;
    }

    for (idx, root) in roots.iter().enumerate() {
        let conversation_id = root.conversation_id.as_deref().unwrap_or_default();
        output.push_str(&format!("## {}. `{}`\n\n", idx + 1, root.id));
        output.push_str(&format!("- Conversation: `{conversation_id}`\n"));
        output.push_str(&format!("- Label: {}\n", root.label));
        output.push_str(&format!(
            "- Messages: `{}`\n",
            rows_per_conversation
                .get(conversation_id)
                .copied()
                .unwrap_or_default()
        ));
        output.push_str(&format!(
            "- Top-level Messages: `{}`\n\n",
            graph.child_count(&root.id)
        ));
    }

    output
}

pub fn render_node_markdown(detail: &NodeDetail<'_>) -> String {
    let node = detail.node;
    let mut output = String::new();
    output.push_str("# Node\n\n");
    output.push_str(&format!("- Id: `{}`\n", node.id));
    output.push_str(&format!("- Role: `{}`\n", node.role));
    output.push_str(&format!("- Label: {}\n", node.label));
    if let Some(conversation_id) = &node.conversation_id {
        output.push_str(&format!("- Conversation: `{conversation_id}`\n"));
    }
    output.push_str(&format!(
        "- Parent: `{}`\n",
        detail.parent.map_or("none", |parent| parent.id.as_str())
    ));
    output.push_str(&format!("- Children: `{}`\n\n", detail.child_count));

    output.push_str("## Content\n\n");
    output.push_str(node.content.trim());
    output.push('\n');
    output
}

/// Numbered thread sections under a `# title` header with `- Key: value` lines.
pub fn render_thread_markdown(title: &str, details: &[(&str, &str)], thread: &Thread) -> String {
    let mut output = String::new();
    output.push_str(&format!("# {title}\n\n"));
    for (key, value) in details {
        output.push_str(&format!("- {key}: `{value}`\n"));
    }
    output.push('\n');

    if thread.is_empty() {
        output.push_str("_No user/assistant messages found._\n");
        return output;
    }

    for (idx, message) in thread.messages.iter().enumerate() {
        output.push_str(&format!("## {}. {}\n\n", idx + 1, message.role.title()));
        output.push_str(message.text.trim());
        output.push_str("\n\n");
    }

    output
}

pub fn render_summary_markdown(details: &[(&str, &str)], summary: &str) -> String {
    let mut output = String::new();
    output.push_str("# Summary\n\n");
    for (key, value) in details {
        output.push_str(&format!("- {key}: `{value}`\n"));
    }
    output.push('\n');
    output.push_str(summary.trim());
    output.push('\n');
    output
}

pub fn render_convert_markdown(
    input: &Path,
    output_path: &Path,
    report_path: &Path,
    conversion: &Conversion,
    analysis: &ExportAnalysis,
) -> String {
    let stats = &conversion.stats;
    let rows_written = conversion.rows.len();
    let mut output = String::new();
    output.push_str("# Conversion\n\n");
    output.push_str(&format!("- Input: `{}`\n", input.display()));
    output.push_str(&format!("- Output: `{}`\n", output_path.display()));
    output.push_str(&format!("- Report: `{}`\n", report_path.display()));
    output.push_str(&format!("- Messages Processed: `{}`\n", stats.total_messages));
    output.push_str(&format!("- Rows Written: `{rows_written}`\n"));
    output.push_str(&format!(
        "- Empty Content Removed: `{}`\n",
        stats.empty_content_removed
    ));
    output.push_str(&format!(
        "- Hidden System Messages Removed: `{}`\n",
        stats.system_messages_removed
    ));
    output.push_str(&format!(
        "- Duplicates Removed: `{}`\n",
        stats.duplicates_removed
    ));
    output.push_str(&format!(
        "- Oversized Removed: `{}`\n",
        stats.oversized_removed
    ));
    if stats.total_messages > 0 {
        #[allow(clippy::cast_precision_loss)]
        let retention = rows_written as f64 / stats.total_messages as f64 * 100.0;
        output.push_str(&format!("- Retention: `{retention:.1}%`\n"));
    }

    if analysis.messages == 0 {
        return output;
    }

    output.push_str("\n## Content\n\n");
    output.push_str(&format!(
        "- Average Length: `{:.0}` characters\n",
        analysis.average_content_chars
    ));
    output.push_str(&format!(
        "- Longest Message: `{}` characters\n",
        analysis.longest_content_chars
    ));
    for (role, count) in &analysis.role_counts {
        #[allow(clippy::cast_precision_loss)]
        let share = *count as f64 / analysis.messages as f64 * 100.0;
        output.push_str(&format!("- Role {role}: `{count}` ({share:.1}%)\n"));
    }
    output
}

/// Plain-text report saved beside a converted CSV.
pub fn render_analysis_report(source: &Path, analysis: &ExportAnalysis) -> String {
    let mut output = String::new();
    output.push_str("ChatGPT Conversations Analysis Report\n");
    output.push_str(&"=".repeat(40));
    output.push_str("\n\n");
    output.push_str(&format!("Source file: {}\n", source.display()));
    output.push_str(&format!("Total conversations: {}\n", analysis.conversations));
    output.push_str(&format!("Total messages: {}\n", analysis.messages));
    if let (Some(first), Some(last)) = (analysis.first_timestamp, analysis.last_timestamp) {
        output.push_str(&format!("Date range: {first} to {last} (unix seconds)\n"));
    }

    output.push_str("\nRole Distribution:\n");
    for (role, count) in &analysis.role_counts {
        output.push_str(&format!("  {role}: {count} messages\n"));
    }
    output.push_str(&format!(
        "\nAverage message length: {:.0} characters\n",
        analysis.average_content_chars
    ));
    output.push_str(&format!(
        "Longest message: {} characters\n",
        analysis.longest_content_chars
    ));
    output
}
