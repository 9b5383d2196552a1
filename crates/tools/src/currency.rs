//! Currency conversion using live exchange rates.

use agentwire_core::context::RequestContext;
use agentwire_core::error::ToolError;
use agentwire_core::tool::Tool;
use async_trait::async_trait;

use crate::http::HttpContext;

const USAGE: &str = "Invalid format. Use: 'amount FROM TO' (e.g., '100 USD EUR')";

pub struct CurrencyConverterTool {
    http: HttpContext,
}

impl CurrencyConverterTool {
    pub fn new(http: HttpContext) -> Self {
        Self { http }
    }
}

#[derive(Debug, PartialEq)]
struct Conversion {
    amount: f64,
    from: String,
    to: String,
}

fn parse_request(input: &str) -> Option<Conversion> {
    let mut parts = input.split_whitespace();
    let amount = parts.next()?.replace(',', "").parse::<f64>().ok()?;
    let from = parts.next()?;
    let to = parts.next()?;
    if parts.next().is_some() || !amount.is_finite() {
        return None;
    }
    let is_code = |code: &str| code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic());
    if !is_code(from) || !is_code(to) {
        return None;
    }
    Some(Conversion {
        amount,
        from: from.to_ascii_uppercase(),
        to: to.to_ascii_uppercase(),
    })
}

#[async_trait]
impl Tool for CurrencyConverterTool {
    fn name(&self) -> &str {
        "currency_converter"
    }

    fn description(&self) -> &str {
        "Convert an amount between currencies at the current exchange rate. Input \
         format: 'amount FROM TO' with ISO currency codes (e.g. '100 USD EUR')."
    }

    async fn run(&self, input: &str, _ctx: &RequestContext) -> Result<String, ToolError> {
        let Some(request) = parse_request(input) else {
            return Ok(USAGE.to_string());
        };

        let fail = |e: String| ToolError::failed(format!("Error converting currency: {e}"));
        let url = HttpContext::url(
            &self.http.endpoints.exchange_rates,
            &["v4", "latest", &request.from],
        )
        .map_err(fail)?;
        let body = self
            .http
            .get_json(url, &[])
            .await
            .map_err(|e| fail(e.to_string()))?;

        let Some(rate) = body["rates"][request.to.as_str()].as_f64() else {
            return Ok(format!("Currency {} not found", request.to));
        };

        Ok(format!(
            "{} {} = {:.2} {}",
            crate::calculator::format_number(request.amount),
            request.from,
            request.amount * rate,
            request.to
        ))
    }
}
