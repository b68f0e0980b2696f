use std::fmt::Write as FmtWrite;

use console::style;
use serde::Serialize;

use crate::models::{Chunk, IndexDescriptor, OutputFormat, SearchResults};

const PREVIEW_CHARS: usize = 200;

pub trait Formatter {
    fn format_chunks(&self, chunks: &[Chunk]) -> String;
    fn format_search_results(&self, results: &SearchResults) -> String;
    fn format_ingest_stats(&self, stats: &IngestStats) -> String;
    fn format_index_list(&self, indexes: &[IndexInfo]) -> String;
    fn format_index_info(&self, info: &IndexInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestStats {
    pub index: String,
    pub files_scanned: u64,
    pub files_indexed: u64,
    pub files_skipped: u64,
    pub chunks_indexed: u64,
    /// `(record id, error)` for every chunk the index rejected
    pub chunks_failed: Vec<(String, String)>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexInfo {
    #[serde(flatten)]
    pub descriptor: IndexDescriptor,
    pub records: u64,
}

fn preview(text: &str) -> String {
    let head: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        format!("{head}...")
    } else {
        head
    }
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_chunks(&self, chunks: &[Chunk]) -> String {
        if chunks.is_empty() {
            return "No chunks produced.\n".to_string();
        }

        let mut output = String::new();
        for chunk in chunks {
            let _ = writeln!(
                output,
                "{} {}",
                style(format!("[{}]", chunk.index)).bold(),
                style(format!("bytes {}..{}", chunk.start, chunk.end)).dim()
            );
            for line in chunk.text.lines() {
                let _ = writeln!(output, "   {line}");
            }
            let _ = writeln!(output);
        }
        let _ = writeln!(output, "{} chunks", chunks.len());
        output
    }

    fn format_search_results(&self, results: &SearchResults) -> String {
        if results.is_empty() {
            return format!("No results found for: {}\n", results.query);
        }

        let mut output = String::new();
        let _ = writeln!(output, "Search results for: \"{}\"", results.query);
        let _ = writeln!(
            output,
            "Found {} results in {}ms{}\n",
            results.len(),
            results.duration_ms,
            if results.reranked { " (re-ranked)" } else { "" }
        );

        for (i, hit) in results.hits.iter().enumerate() {
            if results.reranked {
                let _ = writeln!(
                    output,
                    "{}. [Score: {:.3}, index: {:.3}] {}",
                    i + 1,
                    hit.score,
                    hit.index_score,
                    style(&hit.id).cyan()
                );
            } else {
                let _ = writeln!(
                    output,
                    "{}. [Score: {:.3}] {}",
                    i + 1,
                    hit.score,
                    style(&hit.id).cyan()
                );
            }
            let _ = writeln!(output, "   ---");
            if let Some(text) = &hit.text {
                for line in preview(text).lines() {
                    let _ = writeln!(output, "   {line}");
                }
            }
            let _ = writeln!(output);
        }

        output
    }

    fn format_ingest_stats(&self, stats: &IngestStats) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "Ingest Complete ({})", stats.index);
        let _ = writeln!(output, "---------------");
        let _ = writeln!(output, "Files scanned:  {}", stats.files_scanned);
        let _ = writeln!(output, "Files indexed:  {}", stats.files_indexed);
        let _ = writeln!(output, "Files skipped:  {}", stats.files_skipped);
        let _ = writeln!(output, "Chunks indexed: {}", stats.chunks_indexed);
        if !stats.chunks_failed.is_empty() {
            let _ = writeln!(
                output,
                "Chunks failed:  {}",
                style(stats.chunks_failed.len()).red()
            );
            for (id, error) in &stats.chunks_failed {
                let _ = writeln!(output, "  {id}: {error}");
            }
        }
        let _ = writeln!(output, "Duration:       {}ms", stats.duration_ms);
        output
    }

    fn format_index_list(&self, indexes: &[IndexInfo]) -> String {
        if indexes.is_empty() {
            return "No indexes found.\n".to_string();
        }

        let mut output = String::new();
        let _ = writeln!(
            output,
            "{:<32} {:>9} {:<10} {:>10}",
            "NAME", "DIMENSION", "METRIC", "RECORDS"
        );
        for info in indexes {
            let d = &info.descriptor;
            let _ = writeln!(
                output,
                "{:<32} {:>9} {:<10} {:>10}",
                d.name,
                d.dimension,
                d.metric.to_string(),
                info.records
            );
        }
        output
    }

    fn format_index_info(&self, info: &IndexInfo) -> String {
        let d = &info.descriptor;
        let mut output = String::new();
        let _ = writeln!(output, "Index:     {}", style(&d.name).bold());
        let _ = writeln!(output, "Dimension: {}", d.dimension);
        let _ = writeln!(output, "Metric:    {}", d.metric);
        let _ = writeln!(output, "Shards:    {}", d.placement.shards);
        let _ = writeln!(output, "Replicas:  {}", d.placement.replicas);
        if let Some(region) = &d.placement.region {
            let _ = writeln!(output, "Region:    {region}");
        }
        let _ = writeln!(output, "Records:   {}", info.records);
        output
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }

    fn format_error(&self, error: &str) -> String {
        format!("{} {}", style("Error:").red().bold(), error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render<T: Serialize + ?Sized>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
    }
}

impl Formatter for JsonFormatter {
    fn format_chunks(&self, chunks: &[Chunk]) -> String {
        self.render(chunks)
    }

    fn format_search_results(&self, results: &SearchResults) -> String {
        self.render(results)
    }

    fn format_ingest_stats(&self, stats: &IngestStats) -> String {
        self.render(stats)
    }

    fn format_index_list(&self, indexes: &[IndexInfo]) -> String {
        self.render(indexes)
    }

    fn format_index_info(&self, info: &IndexInfo) -> String {
        self.render(info)
    }

    fn format_message(&self, message: &str) -> String {
        self.render(&serde_json::json!({ "message": message }))
    }

    fn format_error(&self, error: &str) -> String {
        self.render(&serde_json::json!({ "error": error }))
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
    }
}
