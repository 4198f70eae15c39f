//! Prompt construction and response parsing for the LLM stages.
//!
//! Each stage gets a prompt builder and, where the model output is
//! structured, a parser that tolerates the ways models actually deviate
//! from the requested format.

use crate::domain::{Stage, StageArtifact};

/// Number of chapter titles requested per episode
pub const CHAPTER_COUNT: usize = 6;

/// Decide whether translation is needed for a transcript.
///
/// English transcripts pass through unchanged, and so do transcripts where
/// detection failed, since translating text of unknown language risks
/// mangling English content.
pub fn needs_translation(language: Option<&str>) -> bool {
    match language {
        Some(lang) => {
            let lang = lang.to_ascii_lowercase();
            lang != "en" && lang != "unknown"
        }
        None => false,
    }
}

/// Decide whether an episode is long enough for chapter extraction.
///
/// Short episodes produce degenerate chapter lists, and unknown durations
/// cannot be judged, so both skip the stage.
pub fn needs_chapters(duration_minutes: Option<f64>, min_minutes: f64) -> bool {
    match duration_minutes {
        Some(minutes) => minutes >= min_minutes,
        None => false,
    }
}

/// Pass-through artifact for a skipped translation stage
pub fn translation_passthrough(transcript_text: &str) -> StageArtifact {
    StageArtifact::Translation {
        text: transcript_text.to_string(),
    }
}

/// Pass-through artifact for a skipped chapter stage
pub fn chapters_passthrough() -> StageArtifact {
    StageArtifact::Chapters { titles: Vec::new() }
}

pub fn translation_prompt(text: &str, language: &str) -> String {
    format!(
        "Translate the following transcript from {} into English. \
         Preserve the speaker's meaning and tone. \
         Output only the translated text with no preamble.\n\n{}",
        language, text
    )
}

pub fn summary_prompt(text: &str) -> String {
    format!(
        "Summarize this podcast transcript in 3-5 paragraphs. \
         Cover the main topics discussed, key arguments made, and any \
         notable conclusions. Write for someone deciding whether to \
         listen to the full episode.\n\n{}",
        text
    )
}

pub fn chapter_prompt(text: &str) -> String {
    format!(
        "Divide this podcast transcript into exactly {} chapters. \
         For each chapter output one line in the format:\n\
         CHAPTER: <short descriptive title>\n\
         Output only the {} CHAPTER lines, nothing else.\n\n{}",
        CHAPTER_COUNT, CHAPTER_COUNT, text
    )
}

pub fn tag_prompt(summary: &str, max_tags: usize, max_chars: usize) -> String {
    let truncated = truncate_chars(summary, max_chars);
    format!(
        "Suggest up to {} topical tags for a podcast episode with the \
         following summary. Tags should be short (1-3 words) and specific. \
         Respond with a JSON array of strings and nothing else.\n\n{}",
        max_tags, truncated
    )
}

/// Parse chapter titles from `CHAPTER: ` lines in a model response.
///
/// Lines that do not match the requested format are ignored rather than
/// failing the stage.
pub fn parse_chapters(response: &str) -> Vec<String> {
    response
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            line.strip_prefix("CHAPTER:").map(|title| title.trim().to_string())
        })
        .filter(|title| !title.is_empty())
        .take(CHAPTER_COUNT)
        .collect()
}

/// Parse tags from a model response.
///
/// Accepts a JSON array of strings, optionally wrapped in markdown fences
/// or prose; falls back to comma-splitting when no array parses.
pub fn parse_tags(response: &str, max_tags: usize) -> Vec<String> {
    let tags = extract_json_array(response)
        .unwrap_or_else(|| response.split(',').map(|s| s.to_string()).collect());

    tags.into_iter()
        .map(|tag| tag.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        .filter(|tag| !tag.is_empty())
        .take(max_tags)
        .collect()
}

/// Pull the first JSON string array out of a response, if one parses
fn extract_json_array(response: &str) -> Option<Vec<String>> {
    let start = response.find('[')?;
    let end = response[start..].find(']')? + start;
    serde_json::from_str::<Vec<String>>(&response[start..=end]).ok()
}

/// Truncate to a character count without splitting a UTF-8 character
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Stages that may be skipped with a pass-through artifact
pub fn stage_is_conditional(stage: Stage) -> bool {
    matches!(stage, Stage::Translate | Stage::ExtractChapters)
}
