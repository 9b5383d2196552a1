//! Current date/time tool.

use agentwire_core::context::RequestContext;
use agentwire_core::error::ToolError;
use agentwire_core::tool::Tool;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;

pub struct DateTimeTool;

#[async_trait]
impl Tool for DateTimeTool {
    fn name(&self) -> &str {
        "current_datetime"
    }

    fn description(&self) -> &str {
        "Get the current date and time. Input can be empty (UTC), an IANA time zone \
         such as 'America/New_York' or 'Europe/London', or a fixed UTC offset such as \
         '+05:30' or 'UTC-8'. Unknown zones fall back to UTC."
    }

    async fn run(&self, input: &str, _ctx: &RequestContext) -> Result<String, ToolError> {
        Ok(render(Utc::now(), input))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Zone {
    Named(Tz),
    Fixed(FixedOffset),
}

fn render(now: DateTime<Utc>, zone: &str) -> String {
    let zone = zone.trim();
    match parse_zone(zone) {
        Some(Zone::Named(tz)) => describe(now.with_timezone(&tz), tz.name()),
        Some(Zone::Fixed(offset)) => {
            let label = if offset.local_minus_utc() == 0 {
                "UTC".to_string()
            } else {
                format!("UTC{offset}")
            };
            describe(now.with_timezone(&offset), &label)
        }
        None => format!(
            "Unknown time zone '{zone}'. {}",
            describe(now, "UTC")
        ),
    }
}

fn describe<Z: TimeZone>(local: DateTime<Z>, label: &str) -> String
where
    Z::Offset: std::fmt::Display,
{
    format!(
        "Current date/time in {label}: {} ({})",
        local.to_rfc3339_opts(SecondsFormat::Secs, true),
        local.format("%A, %B %-d, %Y %H:%M")
    )
}

/// Fixed offsets first so `UTC`, `GMT` and `Z` keep their short labels,
/// then the IANA database.
fn parse_zone(zone: &str) -> Option<Zone> {
    parse_offset(zone)
        .map(Zone::Fixed)
        .or_else(|| zone.parse::<Tz>().ok().map(Zone::Named))
}

/// `""`, `UTC`, `GMT`, `Z`, `+05:30`, `-0800`, `UTC+2`, `GMT-03:00`.
fn parse_offset(zone: &str) -> Option<FixedOffset> {
    let upper = zone.to_ascii_uppercase();
    let rest = upper
        .strip_prefix("UTC")
        .or_else(|| upper.strip_prefix("GMT"))
        .unwrap_or(&upper);

    if rest.is_empty() || rest == "Z" {
        return FixedOffset::east_opt(0);
    }

    let (sign, digits) = if let Some(d) = rest.strip_prefix('+') {
        (1, d)
    } else if let Some(d) = rest.strip_prefix('-') {
        (-1, d)
    } else {
        return None;
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit() || b == b':') {
        return None;
    }

    // All ASCII from here, so byte offsets are char boundaries.
    let (hours, minutes) = match digits.split_once(':') {
        Some((h, m)) => (h, m),
        None if digits.len() == 4 => digits.split_at(2),
        None => (digits, "0"),
    };
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
