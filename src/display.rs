//! Terminal formatting for rendered blocks.

use colored::*;

use crate::render::{Block, ConfidenceLevel, FeedbackView};
use crate::warehouse::ResultSet;

const MAX_CELL_WIDTH: usize = 40;

pub fn format_block(block: &Block, max_rows: usize) -> String {
    match block {
        Block::Question(text) => format!("{} {}", "You:".bold().cyan(), text),
        Block::Text(text) => text.clone(),
        Block::Table(result) => format_table(result, max_rows),
        Block::Confidence(ConfidenceLevel::High) => {
            "Confidence: High - Verified Query was used for this answer"
                .green()
                .to_string()
        }
        Block::Confidence(ConfidenceLevel::Moderate) => {
            "Confidence: Moderate - Verified Query was not used"
                .dimmed()
                .to_string()
        }
        Block::SqlError(error) => error.red().to_string(),
        Block::Suggestions(suggestions) => {
            let mut out = "Did you mean:".bold().to_string();
            for (i, suggestion) in suggestions.iter().enumerate() {
                out.push_str(&format!("\n  [{}] {}", i + 1, suggestion));
            }
            out.push_str(&"\n  (type /suggest <n> to ask one)".dimmed().to_string());
            out
        }
        Block::Error(text) => text.red().to_string(),
        Block::Feedback(FeedbackView::Prompt { request_id }) => format!(
            "Rate the answer: /feedback great|better|wrong [comment]  {}",
            format!("(request {request_id})").dimmed()
        ),
        Block::Feedback(FeedbackView::Submitted) => "✅ Feedback submitted".green().to_string(),
        Block::Feedback(FeedbackView::Failed(error)) => error.red().to_string(),
        Block::Warnings(warnings) => warnings
            .iter()
            .map(|w| format!("⚠️  {w}").yellow().to_string())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn clip(value: &str) -> String {
    let single_line = value.replace(['\n', '\r'], " ");
    if single_line.chars().count() > MAX_CELL_WIDTH {
        let mut clipped: String = single_line.chars().take(MAX_CELL_WIDTH - 1).collect();
        clipped.push('…');
        clipped
    } else {
        single_line
    }
}

fn pad(value: &str, width: usize) -> String {
    let len = value.chars().count();
    format!("{value}{}", " ".repeat(width.saturating_sub(len)))
}

/// Fixed-width text table with at most `max_rows` rows.
pub fn format_table(result: &ResultSet, max_rows: usize) -> String {
    if result.columns.is_empty() {
        return "(no columns returned)".dimmed().to_string();
    }

    let header: Vec<String> = result.columns.iter().map(|c| clip(c)).collect();
    let rows: Vec<Vec<String>> = result
        .rows
        .iter()
        .take(max_rows)
        .map(|row| {
            (0..header.len())
                .map(|i| match row.get(i) {
                    Some(Some(value)) => clip(value),
                    _ => "NULL".to_string(),
                })
                .collect()
        })
        .collect();

    let widths: Vec<usize> = (0..header.len())
        .map(|i| {
            rows.iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(header[i].chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let render_row = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, w)| pad(cell, *w))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![render_row(&header).bold().to_string()];
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    lines.extend(rows.iter().map(|r| render_row(r)));

    let available = result.total_rows.unwrap_or(result.rows.len() as u64);
    let footer = if (rows.len() as u64) < available {
        format!("(showing {} of {} rows)", rows.len(), available)
    } else if available == 1 {
        "(1 row)".to_string()
    } else {
        format!("({available} rows)")
    };
    lines.push(footer.dimmed().to_string());
    lines.join("\n")
}
