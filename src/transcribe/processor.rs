use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use super::Snippet;
use crate::utils::decode_html_entities;

static TEXT_ELEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<text\b([^>]*?)>(.*?)</text>").unwrap());
static START_ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\bstart="([0-9.]+)""#).unwrap());
static DUR_ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\bdur="([0-9.]+)""#).unwrap());
static INNER_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Caption track advertised by a watch page
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    pub base_url: String,

    pub language_code: String,

    #[serde(default)]
    pub name: Option<TrackName>,

    /// "asr" for auto-generated tracks
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackName {
    #[serde(default)]
    pub simple_text: Option<String>,

    #[serde(default)]
    pub runs: Vec<TextRun>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextRun {
    pub text: String,
}

impl CaptionTrack {
    pub fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }

    /// Display name of the track language, the code when the page omits it
    pub fn language_name(&self) -> String {
        self.name
            .as_ref()
            .and_then(|name| {
                name.simple_text
                    .clone()
                    .or_else(|| name.runs.first().map(|run| run.text.clone()))
            })
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.language_code.clone())
    }
}

/// True when YouTube answered with its "unusual traffic" challenge
pub fn is_captcha_page(html: &str) -> bool {
    html.contains("class=\"g-recaptcha\"") || html.contains("www.google.com/recaptcha")
}

/// Pull the `captionTracks` array out of a watch page.
///
/// The error is a human readable reason the video has no transcript.
pub fn extract_caption_tracks(html: &str) -> std::result::Result<Vec<CaptionTrack>, String> {
    let Some(json) = json_array_after(html, "\"captionTracks\":") else {
        return Err(unavailable_reason(html).to_string());
    };

    let tracks: Vec<CaptionTrack> =
        serde_json::from_str(json).map_err(|e| format!("malformed caption track list: {}", e))?;

    if tracks.is_empty() {
        return Err("no caption tracks".to_string());
    }

    Ok(tracks)
}

fn unavailable_reason(html: &str) -> &'static str {
    if html.contains("\"playabilityStatus\":{\"status\":\"LOGIN_REQUIRED\"") {
        "video is private or requires sign-in"
    } else if html.contains("\"playabilityStatus\":{\"status\":\"ERROR\"")
        || html.contains("\"playabilityStatus\":{\"status\":\"UNPLAYABLE\"")
    {
        "video unavailable"
    } else {
        "transcripts are disabled for this video"
    }
}

/// The JSON array that starts right after `key`, matched by bracket depth
fn json_array_after<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    let start = text.find(key)? + key.len();
    let rest = text[start..].trim_start();
    if !rest.starts_with('[') {
        return None;
    }
    let offset = text.len() - rest.len();

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in rest.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[offset..offset + i + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Pick a track: preferred languages in order, manual before generated,
/// otherwise the first track the page lists.
pub fn select_track<'a>(tracks: &'a [CaptionTrack], languages: &[String]) -> Option<&'a CaptionTrack> {
    for language in languages {
        let matching = |generated: bool| {
            tracks
                .iter()
                .find(|t| t.language_code.eq_ignore_ascii_case(language) && t.is_generated() == generated)
        };

        if let Some(track) = matching(false).or_else(|| matching(true)) {
            return Some(track);
        }
    }

    tracks.first()
}

/// Parse timed-text XML into snippets, keeping document order
pub fn parse_timed_text(xml: &str) -> Vec<Snippet> {
    TEXT_ELEMENT
        .captures_iter(xml)
        .filter_map(|caps| {
            let attrs = &caps[1];
            let start = START_ATTR
                .captures(attrs)
                .and_then(|c| c[1].parse::<f64>().ok())?;
            let duration = DUR_ATTR
                .captures(attrs)
                .and_then(|c| c[1].parse::<f64>().ok())
                .unwrap_or(0.0);

            // XML escaping wraps HTML escaping, so entities are decoded twice
            let text = decode_html_entities(&decode_html_entities(&caps[2]));
            let text = INNER_TAG.replace_all(&text, "").trim().to_string();

            Some(Snippet { text, start, duration })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const WATCH_PAGE: &str = r#"<script>var ytInitialPlayerResponse = {"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[{"baseUrl":"https://www.youtube.com/api/timedtext?v=abc&lang=de","name":{"simpleText":"German"},"vssId":".de","languageCode":"de"},{"baseUrl":"https://www.youtube.com/api/timedtext?v=abc&lang=en&kind=asr","name":{"runs":[{"text":"English (auto-generated)"}]},"vssId":"a.en","languageCode":"en","kind":"asr"},{"baseUrl":"https://www.youtube.com/api/timedtext?v=abc&lang=en","name":{"simpleText":"English [CC]"},"vssId":".en","languageCode":"en"}],"audioTracks":[]}}};</script>"#;

    #[test]
    fn test_extract_caption_tracks() {
        let tracks = extract_caption_tracks(WATCH_PAGE).unwrap();
        assert_eq!(tracks.len(), 3);
        assert_eq!(tracks[0].language_code, "de");
        assert_eq!(tracks[0].base_url, "https://www.youtube.com/api/timedtext?v=abc&lang=de");
        assert_eq!(tracks[1].language_name(), "English (auto-generated)");
        assert!(tracks[1].is_generated());
        assert!(!tracks[2].is_generated());
    }

    #[test]
    fn test_extract_caption_tracks_missing() {
        let err = extract_caption_tracks("<html>no captions here</html>").unwrap_err();
        assert_eq!(err, "transcripts are disabled for this video");

        let err = extract_caption_tracks(r#"{"playabilityStatus":{"status":"LOGIN_REQUIRED"}}"#).unwrap_err();
        assert_eq!(err, "video is private or requires sign-in");

        assert!(extract_caption_tracks(r#""captionTracks":[]"#).is_err());
    }

    #[test]
    fn test_select_track_prefers_manual_in_preferred_language() {
        let tracks = extract_caption_tracks(WATCH_PAGE).unwrap();

        let track = select_track(&tracks, &["en".to_string()]).unwrap();
        assert_eq!(track.language_name(), "English [CC]");

        let track = select_track(&tracks, &["fr".to_string(), "de".to_string()]).unwrap();
        assert_eq!(track.language_code, "de");
    }

    #[test]
    fn test_select_track_falls_back_to_first() {
        let tracks = extract_caption_tracks(WATCH_PAGE).unwrap();
        let track = select_track(&tracks, &["ja".to_string()]).unwrap();
        assert_eq!(track.language_code, "de");
        assert!(select_track(&[], &["en".to_string()]).is_none());
    }

    #[test]
    fn test_parse_timed_text() {
        let xml = r##"<?xml version="1.0" encoding="utf-8" ?><transcript>
<text start="0.5" dur="1.2">Hello &amp;amp; welcome</text>
<text start="1.7" dur="2">it&amp;#39;s <font color="#E5E5E5">great</font></text>
<text start="4.0">no duration</text>
<text dur="1">no start</text>
</transcript>"##;

        let snippets = parse_timed_text(xml);
        assert_eq!(
            snippets,
            vec![
                Snippet { text: "Hello & welcome".to_string(), start: 0.5, duration: 1.2 },
                Snippet { text: "it's great".to_string(), start: 1.7, duration: 2.0 },
                Snippet { text: "no duration".to_string(), start: 4.0, duration: 0.0 },
            ]
        );
    }

    #[test]
    fn test_json_array_after_handles_nested_brackets_in_strings() {
        let text = r#"x "k":[{"a":"]}"},{"b":[1,2]}] tail"#;
        assert_eq!(json_array_after(text, "\"k\":"), Some(r#"[{"a":"]}"},{"b":[1,2]}]"#));
        assert_eq!(json_array_after(r#""k":{"a":1}"#, "\"k\":"), None);
    }

    #[test]
    fn test_captcha_detection() {
        assert!(is_captcha_page(r#"<div class="g-recaptcha" data-sitekey="x"></div>"#));
        assert!(!is_captcha_page("<html>normal page</html>"));
    }
}
