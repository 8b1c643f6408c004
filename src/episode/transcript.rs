use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{AppError, Result};
use crate::models::{count_words, Notes, PlannedItem};

const SEPARATOR: &str = "============================================================";
const WRAP_WIDTH: usize = 88;
const INDENT: &str = "   ";

/// Render planned items as the human-readable `episode_script.txt`.
pub fn render(items: &[PlannedItem], date: &str) -> String {
    let mut out = format!("InboxCast Episode Script - {}\n{}\n\n", date, SEPARATOR);

    for (i, item) in items.iter().enumerate() {
        out.push_str(&format!("{}. Title: {}\n", i + 1, item.title));
        out.push_str(&format!("{}Words: {}\n", INDENT, item.allocated_words));

        let first = format!("{}Script: ", INDENT);
        let rest = format!("{}        ", INDENT);
        let options = textwrap::Options::new(WRAP_WIDTH)
            .initial_indent(&first)
            .subsequent_indent(&rest)
            .break_words(false)
            .word_splitter(textwrap::WordSplitter::NoHyphenation);
        out.push_str(&textwrap::fill(&item.script, options));
        out.push_str("\n\n");
    }

    out
}

pub fn write(path: &Path, items: &[PlannedItem], date: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render(items, date))?;
    tracing::info!("Wrote episode script: {}", path.display());
    Ok(())
}

pub fn read(path: &Path) -> Result<Vec<PlannedItem>> {
    if !path.exists() {
        return Err(AppError::Pipeline(format!(
            "Script file not found: {}",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)?;
    Ok(parse(&content))
}

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)\.\s*Title:\s*(.*)$").expect("valid regex"))
}

fn words_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*Words:\s*(\d+)\s*$").expect("valid regex"))
}

fn script_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*Script:\s*(.*)$").expect("valid regex"))
}

/// Parse a transcript back into planned items. Sources and notes are not
/// stored in the transcript and come back empty.
pub fn parse(content: &str) -> Vec<PlannedItem> {
    struct Pending {
        title: String,
        words: Option<usize>,
        script: Vec<String>,
        in_script: bool,
    }

    fn finish(pending: Pending, items: &mut Vec<PlannedItem>) {
        let script = pending
            .script
            .join(" ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if script.is_empty() {
            return;
        }
        let word_count = pending.words.unwrap_or_else(|| count_words(&script));
        items.push(PlannedItem {
            title: pending.title,
            script,
            sources: Vec::new(),
            notes: Notes::new(),
            word_count,
            allocated_words: word_count,
        });
    }

    let mut items = Vec::new();
    let mut current: Option<Pending> = None;

    for line in content.lines() {
        if let Some(caps) = title_re().captures(line) {
            if let Some(pending) = current.take() {
                finish(pending, &mut items);
            }
            current = Some(Pending {
                title: caps[2].trim().to_string(),
                words: None,
                script: Vec::new(),
                in_script: false,
            });
            continue;
        }

        let Some(pending) = current.as_mut() else {
            continue;
        };

        if pending.in_script {
            if !line.trim().is_empty() {
                pending.script.push(line.trim().to_string());
            }
        } else if let Some(caps) = words_re().captures(line) {
            pending.words = caps[1].parse().ok();
        } else if let Some(caps) = script_re().captures(line) {
            pending.in_script = true;
            pending.script.push(caps[1].trim().to_string());
        }
    }

    if let Some(pending) = current.take() {
        finish(pending, &mut items);
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planned(title: &str, script: &str) -> PlannedItem {
        let n = count_words(script);
        PlannedItem {
            title: title.into(),
            script: script.into(),
            sources: vec!["https://example.com".into()],
            notes: Notes::new(),
            word_count: n + 10,
            allocated_words: n,
        }
    }

    #[test]
    fn rendered_transcript_parses_back() {
        let long_script = "Researchers published a new alignment technique this week. ".repeat(12);
        let items = vec![
            planned("GPT-5 ships", "OpenAI shipped a model. Why this matters is speed."),
            planned("Alignment 2. Title: tricky", long_script.trim()),
        ];

        let text = render(&items, "2025-09-05");
        assert!(text.starts_with("InboxCast Episode Script - 2025-09-05\n"));

        let parsed = parse(&text);
        assert_eq!(parsed.len(), 2);
        for (orig, back) in items.iter().zip(&parsed) {
            assert_eq!(orig.title, back.title);
            assert_eq!(orig.script, back.script);
            assert_eq!(orig.allocated_words, back.word_count);
            assert_eq!(back.allocated_words, back.word_count);
        }
    }

    #[test]
    fn hand_written_transcript_is_accepted() {
        let text = "Header\n=====\n\n1. Title: First\n   Words: 3\n   Script: one two three\n\n2. Title: Second\n   Script: four\n   five\n";
        let parsed = parse(text);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].word_count, 3);
        assert_eq!(parsed[1].script, "four five");
        assert_eq!(parsed[1].word_count, 2);
    }

    #[test]
    fn items_without_script_are_dropped() {
        let parsed = parse("1. Title: Empty\n   Words: 0\n   Script:\n");
        assert!(parsed.is_empty());
    }

    #[test]
    fn missing_file_is_a_pipeline_error() {
        let err = read(Path::new("/nonexistent/episode_script.txt")).unwrap_err();
        assert!(matches!(err, AppError::Pipeline(_)));
    }
}
