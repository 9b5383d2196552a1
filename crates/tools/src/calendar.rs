//! Google Calendar meeting scheduling on behalf of the caller.
//!
//! The caller's identity and OAuth access token come from the
//! [`RequestContext`] of the turn, never from the model's input. Missing
//! credentials are not errors: the tool answers with instructions the model
//! can relay to the user.

use agentwire_core::context::RequestContext;
use agentwire_core::error::ToolError;
use agentwire_core::tool::Tool;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::http::HttpContext;

pub const UNKNOWN_USER: &str = "Unable to identify user. Please try again.";

pub const NOT_CONNECTED: &str = "I need access to your Google Calendar to schedule meetings. Please:

1. Go to Settings
2. Click \"Connect\" on the Google Calendar card
3. Authorize access to your calendar

Once connected, I'll be able to schedule this meeting for you!";

pub const CONNECTION_EXPIRED: &str = "Your Google Calendar connection has expired. Please:

1. Go to Settings
2. Disconnect Google Calendar
3. Connect it again

Then I'll be able to schedule meetings for you!";

pub struct ScheduleMeetingTool {
    http: HttpContext,
}

impl ScheduleMeetingTool {
    pub fn new(http: HttpContext) -> Self {
        Self { http }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MeetingRequest {
    title: String,
    start_time: String,
    end_time: String,
    #[serde(default)]
    attendees: Vec<String>,
    #[serde(default)]
    description: Option<String>,
}

impl MeetingRequest {
    fn to_event(&self) -> Value {
        json!({
            "summary": self.title,
            "description": self.description.as_deref().unwrap_or_default(),
            "start": { "dateTime": self.start_time, "timeZone": "UTC" },
            "end": { "dateTime": self.end_time, "timeZone": "UTC" },
            "attendees": self.attendees.iter().map(|email| json!({ "email": email })).collect::<Vec<_>>(),
        })
    }
}

#[async_trait]
impl Tool for ScheduleMeetingTool {
    fn name(&self) -> &str {
        "schedule_meeting"
    }

    fn description(&self) -> &str {
        "Schedule a meeting on the user's Google Calendar. Input is a JSON string with \
         title, startTime and endTime (ISO 8601, use the current year from the system \
         message), plus optional attendees (array of emails) and description. Example: \
         {\"title\":\"Team Sync\",\"startTime\":\"2025-11-14T14:00:00\",\
         \"endTime\":\"2025-11-14T15:00:00\",\"attendees\":[\"person@example.com\"]}. \
         The user must have connected Google Calendar in Settings."
    }

    async fn run(&self, input: &str, ctx: &RequestContext) -> Result<String, ToolError> {
        if ctx.user_id.is_none() {
            return Ok(UNKNOWN_USER.into());
        }
        let Some(token) = ctx.oauth_token.as_deref() else {
            return Ok(NOT_CONNECTED.into());
        };

        let request: MeetingRequest =
            serde_json::from_str(input.trim()).map_err(|e| ToolError::InvalidInput {
                tool_name: self.name().into(),
                reason: format!("expected JSON with title, startTime and endTime: {e}"),
            })?;

        let fail = |e: String| {
            ToolError::failed(format!(
                "Error scheduling meeting: {e}. Please try again or check your calendar connection in Settings."
            ))
        };
        let url = HttpContext::url(
            &self.http.endpoints.google_calendar,
            &["calendar", "v3", "calendars", "primary", "events"],
        )
        .map_err(fail)?;

        debug!(title = %request.title, attendees = request.attendees.len(), "Creating calendar event");
        let response = self
            .http
            .client
            .post(url)
            .bearer_auth(token)
            .json(&request.to_event())
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!("Calendar token rejected");
            return Ok(CONNECTION_EXPIRED.into());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if body.contains("invalid_grant") {
                return Ok(CONNECTION_EXPIRED.into());
            }
            return Err(fail(format!("calendar API returned {status}")));
        }

        let event: Value = response.json().await.map_err(|e| fail(e.to_string()))?;
        Ok(confirmation(&request, &event))
    }
}

fn confirmation(request: &MeetingRequest, event: &Value) -> String {
    let summary = event["summary"].as_str().unwrap_or(&request.title);
    let mut text = format!(
        "Meeting scheduled successfully!\n\n**{summary}**\n{} - {}\n",
        request.start_time, request.end_time
    );
    if !request.attendees.is_empty() {
        text.push_str(&format!("Attendees: {}\n", request.attendees.join(", ")));
    }
    if let Some(link) = event["htmlLink"].as_str() {
        text.push_str(&format!("[View in Google Calendar]({link})"));
    }
    text
}
