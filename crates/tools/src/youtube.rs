//! YouTube transcripts through the transcript service.

use agentwire_core::context::RequestContext;
use agentwire_core::error::ToolError;
use agentwire_core::tool::Tool;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::http::HttpContext;

const DEFAULT_LANG: &str = "en";

pub struct YoutubeTranscriptTool {
    http: HttpContext,
}

impl YoutubeTranscriptTool {
    pub fn new(http: HttpContext) -> Self {
        Self { http }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptRequest<'a> {
    video_url: &'a str,
    lang_code: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    captions: Vec<Caption>,
}

#[derive(Debug, Deserialize)]
struct Caption {
    #[serde(default)]
    start: f64,
    #[serde(default)]
    text: String,
}

#[async_trait]
impl Tool for YoutubeTranscriptTool {
    fn name(&self) -> &str {
        "youtube_transcript"
    }

    fn description(&self) -> &str {
        "Fetch a YouTube video's transcript with timestamps. Input is the full video \
         URL, optionally followed by '|' and a language code \
         (e.g. 'https://youtube.com/watch?v=abc|es'). Defaults to English."
    }

    async fn run(&self, input: &str, _ctx: &RequestContext) -> Result<String, ToolError> {
        let (video_url, lang_code) = match input.split_once('|') {
            Some((url, lang)) if !lang.trim().is_empty() => (url.trim(), lang.trim()),
            Some((url, _)) => (url.trim(), DEFAULT_LANG),
            None => (input.trim(), DEFAULT_LANG),
        };
        if video_url.is_empty() {
            return Err(ToolError::InvalidInput {
                tool_name: self.name().into(),
                reason: "expected a YouTube video URL".into(),
            });
        }

        let fail = |e: String| ToolError::failed(format!("Error fetching transcript: {e}"));
        let url = HttpContext::url(&self.http.endpoints.transcripts, &["transcript"]).map_err(fail)?;
        let response = self
            .http
            .client
            .post(url)
            .json(&TranscriptRequest {
                video_url,
                lang_code,
            })
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| fail(e.to_string()))?;
        let transcript: TranscriptResponse =
            response.json().await.map_err(|e| fail(e.to_string()))?;

        Ok(format_transcript(transcript))
    }
}

fn format_transcript(transcript: TranscriptResponse) -> String {
    if transcript.captions.is_empty() {
        return "No transcript available for this video.".into();
    }

    let lines: Vec<String> = transcript
        .captions
        .iter()
        .map(|c| format!("[{}] {}", timestamp(c.start), c.text))
        .collect();
    format!(
        "Video: {}\n\nTranscript:\n{}",
        transcript.title.as_deref().unwrap_or("Unknown"),
        lines.join("\n")
    )
}

/// Seconds as `hh:mm:ss`.
fn timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}
