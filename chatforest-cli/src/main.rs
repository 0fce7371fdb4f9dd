use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chatforest_core::{
    ConvertOptions, Dataset, ExportAnalysis, Summarizer, SummarizerConfig, Thread,
    default_analysis_path, default_output_path, graph_to_raw_json, load_chatgpt_export,
    render_convert_markdown, render_forest_markdown, render_node_markdown,
    render_summary_markdown, render_thread_markdown, save_analysis_report, save_rows_csv,
    summarizer_from_config,
};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_ENV: &str = "CHATFOREST_LOG";

#[derive(Debug, Parser)]
#[command(
    name = "chatforest",
    version,
    about = "Explore chat exports as a forest of conversation threads"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Overview of the conversation forest built from a CSV export
    Graph {
        csv: PathBuf,

        /// Output the node/edge graph as JSON instead of markdown
        #[arg(long)]
        raw: bool,
    },
    /// Show a single node with its parent and child count
    Node { csv: PathBuf, node_id: String },
    /// Dialogue leading from the conversation root down to a node
    Thread {
        csv: PathBuf,
        node_id: String,

        /// Print the exact text handed to the summarizer
        #[arg(long)]
        plain: bool,

        /// Summarize the thread instead of listing it
        #[arg(long)]
        summarize: bool,
    },
    /// Every user/assistant message of one conversation, in id order
    Conversation {
        csv: PathBuf,
        conversation_id: String,

        /// Print the exact text handed to the summarizer
        #[arg(long)]
        plain: bool,

        /// Summarize the conversation instead of listing it
        #[arg(long)]
        summarize: bool,
    },
    /// Summarize a node: its thread for messages, its conversation for conversation roots
    Summarize { csv: PathBuf, node_id: String },
    /// Convert a ChatGPT conversations.json export into a chat CSV and an analysis report
    Convert {
        input: PathBuf,

        /// Output CSV path (defaults to <input>_cleaned.csv or <input>_raw.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep message text as exported
        #[arg(long)]
        no_clean: bool,

        /// Write only id, conversation_id, parent_id, role and content
        #[arg(long)]
        minimal: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

/// Logs go to stderr so stdout only carries command output.
fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_target(true)
        .with_filter(filter);

    if let Err(err) = tracing_subscriber::registry().with(stderr_layer).try_init() {
        eprintln!("warning: logging disabled: {err}");
    }
}

fn run(cli: Cli) -> chatforest_core::Result<()> {
    match cli.command {
        Command::Graph { csv, raw } => {
            let dataset = Dataset::load_csv(&csv)?;
            if raw {
                let raw_json = graph_to_raw_json(dataset.graph())?;
                print!("{raw_json}");
            } else {
                print!("{}", render_forest_markdown(&dataset));
            }
        }
        Command::Node { csv, node_id } => {
            let dataset = Dataset::load_csv(&csv)?;
            let detail = dataset.node_detail(&node_id)?;
            print!("{}", render_node_markdown(&detail));
        }
        Command::Thread {
            csv,
            node_id,
            plain,
            summarize,
        } => {
            let dataset = Dataset::load_csv(&csv)?;
            let thread = dataset.thread(&node_id)?;
            print_thread("Thread", ("Node", node_id.as_str()), &thread, plain, summarize);
        }
        Command::Conversation {
            csv,
            conversation_id,
            plain,
            summarize,
        } => {
            let dataset = Dataset::load_csv(&csv)?;
            let thread = dataset.conversation(&conversation_id)?;
            print_thread(
                "Conversation",
                ("Conversation", conversation_id.as_str()),
                &thread,
                plain,
                summarize,
            );
        }
        Command::Summarize { csv, node_id } => {
            let dataset = Dataset::load_csv(&csv)?;
            let input = dataset.summary_input(&node_id)?;
            let summary = summarize_text(&input);
            print!(
                "{}",
                render_summary_markdown(&[("Node", node_id.as_str())], &summary)
            );
        }
        Command::Convert {
            input,
            output,
            no_clean,
            minimal,
        } => convert(&input, output, !no_clean, minimal)?,
    }

    Ok(())
}

fn print_thread(
    title: &str,
    detail: (&str, &str),
    thread: &Thread,
    plain: bool,
    summarize: bool,
) {
    if summarize {
        let summary = summarize_text(&thread.render_text());
        if plain {
            println!("{summary}");
        } else {
            print!("{}", render_summary_markdown(&[detail], &summary));
        }
        return;
    }

    if plain {
        println!("{}", thread.render_text());
    } else {
        print!("{}", render_thread_markdown(title, &[detail], thread));
    }
}

fn summarize_text(text: &str) -> String {
    let config = SummarizerConfig::from_env();
    info!(model = %config.model, "requesting summary");
    summarizer_from_config(&config).summarize(text)
}

fn convert(
    input: &Path,
    output: Option<PathBuf>,
    clean: bool,
    minimal: bool,
) -> chatforest_core::Result<()> {
    let conversion = load_chatgpt_export(input, ConvertOptions { clean, minimal })?;
    let output = output.unwrap_or_else(|| default_output_path(input, clean));
    save_rows_csv(&output, &conversion.rows, minimal)?;

    let analysis = ExportAnalysis::from_rows(&conversion.rows);
    let report_dir = output.parent().unwrap_or_else(|| Path::new("."));
    let report = default_analysis_path(input, report_dir);
    save_analysis_report(&report, input, &analysis)?;

    print!(
        "{}",
        render_convert_markdown(input, &output, &report, &conversion, &analysis)
    );
    Ok(())
}
