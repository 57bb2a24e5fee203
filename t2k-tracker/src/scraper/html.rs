//! Tier 3: heuristic scrape of a third-party playlist page
//!
//! Looks for the first `track_history_item` / `track-title` block. Inside it,
//! separate artist and title elements are preferred; otherwise the block text
//! is split as `"Artist - Title"`.

use super::http::{clean_field, get_text, split_artist_title};
use super::{AiringSource, TierOutcome};
use crate::error::{TrackerError, TrackerResult};
use crate::models::{RawAiring, SourceTier};
use async_trait::async_trait;
use regex::Regex;

const BLOCK_PATTERN: &str =
    r#"class=["'][^"']*\b(?:track_history_item|track-title)\b[^"']*["'][^>]*>"#;
const ARTIST_PATTERN: &str =
    r#"class=["'][^"']*\b(?:track-artist|artist)\b[^"']*["'][^>]*>([^<]*)<"#;
const TITLE_PATTERN: &str =
    r#"class=["'][^"']*\b(?:track-name|title)\b[^"']*["'][^>]*>([^<]*)<"#;
const BLOCK_END_PATTERN: &str = r"</(?:td|li|tr|div)>";
const TAG_PATTERN: &str = r"<[^>]+>";

pub struct PlaylistPageSource {
    client: reqwest::Client,
    url: String,
    patterns: Patterns,
}

struct Patterns {
    block: Regex,
    artist: Regex,
    title: Regex,
    block_end: Regex,
    tag: Regex,
}

fn compile(pattern: &str) -> TrackerResult<Regex> {
    Regex::new(pattern)
        .map_err(|e| TrackerError::ConfigurationInvalid(format!("playlist pattern: {}", e)))
}

impl PlaylistPageSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> TrackerResult<Self> {
        Ok(Self {
            client,
            url: url.into(),
            patterns: Patterns {
                block: compile(BLOCK_PATTERN)?,
                artist: compile(ARTIST_PATTERN)?,
                title: compile(TITLE_PATTERN)?,
                block_end: compile(BLOCK_END_PATTERN)?,
                tag: compile(TAG_PATTERN)?,
            },
        })
    }

    /// Artist and title of the newest playlist row, if the page has one
    ///
    /// Only the matched block is inspected; elements after it belong to
    /// other parts of the page.
    pub fn parse_page(&self, html: &str) -> Option<(String, String)> {
        let start = self.patterns.block.find(html)?.end();
        let rest = &html[start..];
        let end = self
            .patterns
            .block_end
            .find(rest)
            .map(|m| m.start())
            .unwrap_or(rest.len());
        let block = &rest[..end];

        let capture = |pattern: &Regex| {
            pattern
                .captures(block)
                .and_then(|caps| clean_field(caps.get(1).map(|m| decode_entities(m.as_str())).as_deref()))
        };
        if let (Some(artist), Some(title)) = (capture(&self.patterns.artist), capture(&self.patterns.title)) {
            return Some((artist, title));
        }

        let text = self.patterns.tag.replace_all(block, " ");
        let text = decode_entities(&text.split_whitespace().collect::<Vec<_>>().join(" "));
        split_artist_title(&text)
    }
}

/// Decode the handful of entities playlist pages actually use
fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&apos;", "'")
        .replace("&quot;", "\"")
        .replace("&nbsp;", " ")
}

#[async_trait]
impl AiringSource for PlaylistPageSource {
    fn tier(&self) -> SourceTier {
        SourceTier::Html
    }

    fn signature(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> TierOutcome {
        let html = match get_text(&self.client, &self.url).await {
            Ok(html) => html,
            Err(e) => return TierOutcome::Error(e),
        };

        match self.parse_page(&html) {
            Some((artist, title)) => TierOutcome::Success(RawAiring::new(artist, title, SourceTier::Html)),
            None => TierOutcome::Empty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> PlaylistPageSource {
        PlaylistPageSource::new(reqwest::Client::new(), "http://localhost/").unwrap()
    }

    #[test]
    fn test_separate_artist_and_title_elements() {
        let html = r#"<table><tr class="active">
            <td class="tablelist-schedule__time">21:04</td>
            <td class="track_history_item">
              <span class="track-artist">Simon &amp; Garfunkel</span>
              <span class="track-name">The Boxer</span>
            </td></tr></table>"#;

        assert_eq!(
            source().parse_page(html),
            Some(("Simon & Garfunkel".to_string(), "The Boxer".to_string()))
        );
    }

    #[test]
    fn test_combined_text_row() {
        let html = r#"<tr><td class="track_history_item"><a href="/track/1">Guns N&#39; Roses - November Rain</a></td>
            <td class="track_history_item"><a>Older - Row</a></td></tr>"#;

        assert_eq!(
            source().parse_page(html),
            Some(("Guns N' Roses".to_string(), "November Rain".to_string()))
        );
    }

    #[test]
    fn test_markup_after_block_is_ignored() {
        let html = r#"<table><tr><td class="track_history_item">Queen - Bohemian Rhapsody</td></tr></table>
            <aside><h3 class="title">Meer stations</h3><span class="artist">Radio 538</span></aside>"#;

        assert_eq!(
            source().parse_page(html),
            Some(("Queen".to_string(), "Bohemian Rhapsody".to_string()))
        );
    }

    #[test]
    fn test_page_without_playlist() {
        assert_eq!(source().parse_page("<html><p>Off air</p></html>"), None);
    }
}
