//! Current weather from wttr.in.

use agentwire_core::context::RequestContext;
use agentwire_core::error::ToolError;
use agentwire_core::tool::Tool;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::http::HttpContext;

pub struct WeatherTool {
    http: HttpContext,
}

impl WeatherTool {
    pub fn new(http: HttpContext) -> Self {
        Self { http }
    }
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    location: String,
    temperature: String,
    condition: String,
    humidity: String,
    wind_speed: String,
    feels_like: String,
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "weather"
    }

    fn description(&self) -> &str {
        "Get the current weather for a location. Input is a city or place name \
         (e.g. 'London', 'San Francisco'). Returns temperature, condition, humidity, \
         wind speed and feels-like temperature."
    }

    async fn run(&self, input: &str, _ctx: &RequestContext) -> Result<String, ToolError> {
        let location = input.trim();
        if location.is_empty() {
            return Err(ToolError::InvalidInput {
                tool_name: self.name().into(),
                reason: "expected a location".into(),
            });
        }

        let fail = |e: String| ToolError::failed(format!("Error fetching weather: {e}"));
        let url = HttpContext::url(&self.http.endpoints.wttr, &[location]).map_err(fail)?;
        let body = self
            .http
            .get_json(url, &[("format", "j1")])
            .await
            .map_err(|e| fail(e.to_string()))?;

        let report = parse_report(&body).ok_or_else(|| fail("unexpected response shape".into()))?;
        serde_json::to_string(&report).map_err(|e| fail(e.to_string()))
    }
}

fn parse_report(body: &Value) -> Option<Report> {
    let current = body["current_condition"].get(0)?;
    let area = body["nearest_area"].get(0);
    let first_value = |v: &Value| v.get(0)?["value"].as_str().map(str::to_string);

    let location = match area {
        Some(area) => format!(
            "{}, {}",
            first_value(&area["areaName"]).unwrap_or_default(),
            first_value(&area["country"]).unwrap_or_default()
        ),
        None => "Unknown".to_string(),
    };
    let field = |key: &str| current[key].as_str().unwrap_or("?").to_string();

    Some(Report {
        location,
        temperature: format!("{}°C ({}°F)", field("temp_C"), field("temp_F")),
        condition: first_value(&current["weatherDesc"]).unwrap_or_else(|| "Unknown".into()),
        humidity: format!("{}%", field("humidity")),
        wind_speed: format!("{} km/h", field("windspeedKmph")),
        feels_like: format!("{}°C", field("FeelsLikeC")),
    })
}
