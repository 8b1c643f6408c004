use std::sync::Arc;

use serde::Deserialize;

use crate::ai::LanguageModel;
use crate::error::{AppError, Result};
use crate::models::{leading_words, EpisodeScript, EpisodeSegment, PlannedItem};

const FALLBACK_THEME: &str = "Today's Updates";
const PREVIEW_CHARS: usize = 100;
const GROUPING_TEMPERATURE: f32 = 0.3;

#[derive(Debug, Deserialize)]
struct Grouping {
    segments: Vec<GroupedSegment>,
}

#[derive(Debug, Deserialize)]
struct GroupedSegment {
    theme: String,
    item_ids: Vec<usize>,
}

/// Wraps planned items in an introduction, themed segments with transitions,
/// and a conclusion. Every LLM step has a template fallback, and without a
/// model the templates are used throughout.
pub struct EpisodeScriptEngine {
    llm: Option<Arc<dyn LanguageModel>>,
    temperature: f32,
    max_intro_words: usize,
    max_transition_words: usize,
    max_outro_words: usize,
}

impl EpisodeScriptEngine {
    pub fn new(llm: Option<Arc<dyn LanguageModel>>) -> Self {
        Self {
            llm,
            temperature: 0.7,
            max_intro_words: 100,
            max_transition_words: 30,
            max_outro_words: 80,
        }
    }

    pub async fn synthesize(
        &self,
        items: &[PlannedItem],
        target_minutes: u32,
        date: &str,
    ) -> Result<EpisodeScript> {
        if items.is_empty() {
            return Err(AppError::Pipeline(
                "Cannot create episode from empty items list".to_string(),
            ));
        }

        let mut segments: Vec<EpisodeSegment> = self
            .group_by_theme(items)
            .await
            .into_iter()
            .map(|(theme, items)| EpisodeSegment {
                word_count: items.iter().map(|i| i.allocated_words).sum(),
                theme_title: theme,
                transition: String::new(),
                items,
            })
            .collect();

        let introduction = self.introduction(&segments, target_minutes, date).await;

        for i in 0..segments.len() {
            let transition = if i == 0 {
                self.opening_transition(&segments[0]).await
            } else {
                self.bridge_transition(&segments[i - 1], &segments[i]).await
            };
            segments[i].transition = transition;
        }

        let conclusion = self.conclusion(&segments).await;

        let script = EpisodeScript::new(introduction, segments, conclusion);
        tracing::info!(
            "Episode script: {} segments, {} words (~{:.1} min)",
            script.segments.len(),
            script.total_word_count,
            script.estimated_duration_minutes
        );
        Ok(script)
    }

    async fn ask(&self, system: &str, user: &str, max_tokens: u32, temperature: f32) -> Option<serde_json::Value> {
        let llm = self.llm.as_ref()?;
        match llm
            .complete_json_with_temperature(system, user, max_tokens, temperature)
            .await
        {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Episode script generation failed: {}", e);
                None
            }
        }
    }

    /// Ask for a single string field and cap it at `max_words`.
    async fn ask_text(&self, field: &str, system: &str, user: &str, max_tokens: u32, max_words: usize) -> Option<String> {
        let value = self.ask(system, user, max_tokens, self.temperature).await?;
        let text = value.get(field)?.as_str()?.trim();
        if text.is_empty() {
            return None;
        }
        Some(leading_words(text, max_words))
    }

    async fn group_by_theme(&self, items: &[PlannedItem]) -> Vec<(String, Vec<PlannedItem>)> {
        let fallback = || vec![(FALLBACK_THEME.to_string(), items.to_vec())];

        let listing = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let preview: String = if item.script.chars().count() > PREVIEW_CHARS {
                    let head: String = item.script.chars().take(PREVIEW_CHARS).collect();
                    format!("{}...", head)
                } else {
                    item.script.clone()
                };
                format!("{}. {}\n   Preview: {}", i, item.title, preview)
            })
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            r#"Analyze these newsletter items and group them into 2-4 thematic segments for a podcast episode:

Items:
{}

Create thematic segments that:
- Group related topics together
- Create natural narrative flow
- Have descriptive theme names (e.g. "New Model Releases", "Industry News")
- Include every item

Respond with JSON: {{"segments": [{{"theme": "...", "item_ids": [0, 1]}}]}}"#,
            listing
        );

        let Some(value) = self
            .ask(
                "You are an expert podcast producer who groups newsletter content into thematic segments.",
                &prompt,
                300,
                GROUPING_TEMPERATURE,
            )
            .await
        else {
            return fallback();
        };

        let grouping: Grouping = match serde_json::from_value(value) {
            Ok(g) => g,
            Err(e) => {
                tracing::warn!("Theme grouping reply malformed, using single segment: {}", e);
                return fallback();
            }
        };

        let groups: Vec<_> = grouping
            .segments
            .into_iter()
            .filter_map(|segment| {
                let members: Vec<PlannedItem> = segment
                    .item_ids
                    .iter()
                    .filter_map(|&id| items.get(id).cloned())
                    .collect();
                (!members.is_empty()).then_some((segment.theme, members))
            })
            .collect();

        if groups.is_empty() {
            fallback()
        } else {
            groups
        }
    }

    async fn introduction(&self, segments: &[EpisodeSegment], target_minutes: u32, date: &str) -> String {
        let topics: Vec<&str> = segments.iter().map(|s| s.theme_title.as_str()).collect();
        let prompt = format!(
            r#"Create an engaging podcast introduction for {} for a newsletter summary episode.

Episode details:
- Target duration: {} minutes
- Topics covered: {}
- Number of segments: {}

The introduction should be conversational, set expectations, sound natural when spoken,
be {} words or fewer, and welcome listeners to "InboxCast".

Respond with JSON: {{"introduction": "..."}}"#,
            date,
            target_minutes,
            topics.join(", "),
            segments.len(),
            self.max_intro_words
        );
        let system = format!(
            "Generate a {}-word engaging podcast introduction that sounds natural and conversational.",
            self.max_intro_words
        );

        match self
            .ask_text("introduction", &system, &prompt, 150, self.max_intro_words)
            .await
        {
            Some(text) => text,
            None => {
                let lower: Vec<String> = topics.iter().map(|t| t.to_lowercase()).collect();
                format!(
                    "Welcome to InboxCast. Today we're covering {} key topics including {}. Let's dive in.",
                    segments.len(),
                    lower.join(", ")
                )
            }
        }
    }

    async fn opening_transition(&self, first: &EpisodeSegment) -> String {
        let preview = first.items.first().map(|i| i.title.as_str()).unwrap_or("today's updates");
        let prompt = format!(
            "Create a natural transition from the episode introduction to the first segment about \"{}\".\n\nFirst item: {}\n\nKeep it under {} words. Respond with JSON: {{\"transition\": \"...\"}}",
            first.theme_title, preview, self.max_transition_words
        );
        let system = format!(
            "Generate a brief {}-word transition that sounds natural in podcast flow.",
            self.max_transition_words
        );

        self.ask_text("transition", &system, &prompt, 50, self.max_transition_words)
            .await
            .unwrap_or_else(|| format!("Let's start with {}.", first.theme_title.to_lowercase()))
    }

    async fn bridge_transition(&self, previous: &EpisodeSegment, current: &EpisodeSegment) -> String {
        let last = previous.items.last().map(|i| i.title.as_str()).unwrap_or_default();
        let next = current.items.first().map(|i| i.title.as_str()).unwrap_or_default();
        let prompt = format!(
            "Create a natural podcast transition from one topic to another.\n\nPrevious segment: \"{}\"\nLast item: {}\n\nCurrent segment: \"{}\"\nFirst item: {}\n\nKeep it under {} words. Respond with JSON: {{\"transition\": \"...\"}}",
            previous.theme_title, last, current.theme_title, next, self.max_transition_words
        );
        let system = format!(
            "Generate a natural {}-word transition between podcast segments.",
            self.max_transition_words
        );

        self.ask_text("transition", &system, &prompt, 50, self.max_transition_words)
            .await
            .unwrap_or_else(|| format!("Moving on to {}.", current.theme_title.to_lowercase()))
    }

    async fn conclusion(&self, segments: &[EpisodeSegment]) -> String {
        let topics: Vec<&str> = segments.iter().map(|s| s.theme_title.as_str()).collect();
        let prompt = format!(
            "Create a podcast conclusion for a newsletter summary episode.\n\nTopics we covered:\n{}\n\nBriefly recap the themes, thank listeners, and keep it under {} words. End on a note that encourages return listening to \"InboxCast\".\n\nRespond with JSON: {{\"conclusion\": \"...\"}}",
            topics.join(", "),
            self.max_outro_words
        );
        let system = format!(
            "Generate a {}-word podcast conclusion that wraps up the episode with key takeaways.",
            self.max_outro_words
        );

        self.ask_text("conclusion", &system, &prompt, 120, self.max_outro_words)
            .await
            .unwrap_or_else(|| {
                "That wraps up today's InboxCast episode. Stay curious, and we'll see you next time."
                    .to_string()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    use crate::models::{count_words, Notes};

    /// Replays queued replies in order, then errors.
    struct ScriptedModel(Mutex<Vec<serde_json::Value>>);

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete_json(&self, _system: &str, _user: &str, _max_tokens: u32) -> Result<serde_json::Value> {
            let mut queue = self.0.lock().unwrap();
            if queue.is_empty() {
                return Err(AppError::Llm("no more replies".into()));
            }
            Ok(queue.remove(0))
        }
    }

    fn planned(title: &str, words: usize) -> PlannedItem {
        PlannedItem {
            title: title.into(),
            script: vec!["word"; words].join(" "),
            sources: vec![],
            notes: Notes::new(),
            word_count: words,
            allocated_words: words,
        }
    }

    #[tokio::test]
    async fn empty_items_are_an_error() {
        let engine = EpisodeScriptEngine::new(None);
        assert!(engine.synthesize(&[], 5, "2025-01-01").await.is_err());
    }

    #[tokio::test]
    async fn without_a_model_templates_are_used() {
        let engine = EpisodeScriptEngine::new(None);
        let script = engine
            .synthesize(&[planned("A", 10), planned("B", 5)], 5, "2025-01-01")
            .await
            .unwrap();

        assert_eq!(script.segments.len(), 1);
        assert_eq!(script.segments[0].theme_title, "Today's Updates");
        assert_eq!(script.segments[0].word_count, 15);
        assert_eq!(script.segments[0].transition, "Let's start with today's updates.");
        assert_eq!(
            script.introduction,
            "Welcome to InboxCast. Today we're covering 1 key topics including today's updates. Let's dive in."
        );
        assert!(script.conclusion.starts_with("That wraps up"));
        assert_eq!(
            script.total_word_count,
            count_words(&script.introduction) + 5 + 15 + count_words(&script.conclusion)
        );
    }

    #[tokio::test]
    async fn model_grouping_and_text_are_used_and_capped() {
        let long_intro = vec!["hello"; 150].join(" ");
        let model = ScriptedModel(Mutex::new(vec![
            json!({"segments": [
                {"theme": "Models", "item_ids": [1]},
                {"theme": "Empty", "item_ids": [9]},
                {"theme": "Tools", "item_ids": [0, 2]}
            ]}),
            json!({"introduction": long_intro}),
            json!({"transition": "First up, models."}),
            // Second transition fails and falls back.
        ]));
        let engine = EpisodeScriptEngine::new(Some(Arc::new(model)));
        let items = [planned("A", 3), planned("B", 4), planned("C", 5)];
        let script = engine.synthesize(&items, 5, "2025-01-01").await.unwrap();

        let themes: Vec<_> = script.segments.iter().map(|s| s.theme_title.as_str()).collect();
        assert_eq!(themes, ["Models", "Tools"]);
        assert_eq!(script.segments[1].items.len(), 2);
        assert_eq!(count_words(&script.introduction), 100);
        assert_eq!(script.segments[0].transition, "First up, models.");
        assert_eq!(script.segments[1].transition, "Moving on to tools.");
        assert!(script.conclusion.starts_with("That wraps up"));
    }
}
