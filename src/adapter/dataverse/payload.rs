//! Dataverse `$batch` Payload
//!
//! multipart/mixed のリクエスト生成とレスポンス解析

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::domain::entities::upsert_batch::UpsertBatch;
use crate::domain::repositories::sink_repository::OperationOutcome;

const CRLF: &str = "\r\n";

/// Encoded `$batch` request body
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub boundary: String,
    pub body: String,
}

impl BatchRequest {
    pub fn content_type(&self) -> String {
        format!("multipart/mixed; boundary={}", self.boundary)
    }
}

#[derive(Debug, Deserialize)]
struct ODataErrorEnvelope {
    error: ODataError,
}

#[derive(Debug, Deserialize)]
struct ODataError {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

/// Encode one `PATCH` per operation, each as an independent part (no change set)
/// so one rejected upsert does not roll back the others.
pub fn encode_batch(batch: &UpsertBatch, api_base_url: &str) -> Result<BatchRequest> {
    encode_batch_with_boundary(batch, api_base_url, &format!("batch_{}", uuid::Uuid::new_v4()))
}

pub fn encode_batch_with_boundary(
    batch: &UpsertBatch,
    api_base_url: &str,
    boundary: &str,
) -> Result<BatchRequest> {
    let api_base_url = api_base_url.trim_end_matches('/');
    let mut body = String::new();

    for op in batch.operations() {
        let json = serde_json::to_string(&op.body)
            .with_context(|| format!("Failed to serialize body for {}", op.relative_url()))?;

        body.push_str(&format!("--{}{}", boundary, CRLF));
        body.push_str(&format!("Content-Type: application/http{}", CRLF));
        body.push_str(&format!("Content-Transfer-Encoding: binary{}{}", CRLF, CRLF));
        body.push_str(&format!(
            "PATCH {}/{} HTTP/1.1{}",
            api_base_url,
            op.relative_url(),
            CRLF
        ));
        body.push_str(&format!(
            "Content-Type: application/json; charset=utf-8{}{}",
            CRLF, CRLF
        ));
        body.push_str(&json);
        body.push_str(CRLF);
    }
    body.push_str(&format!("--{}--{}", boundary, CRLF));

    Ok(BatchRequest {
        boundary: boundary.to_string(),
        body,
    })
}

/// Extract the `boundary` parameter of a multipart Content-Type header
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("boundary") {
            Some(value.trim().trim_matches('"').to_string())
        } else {
            None
        }
    })
}

/// Parse a `$batch` response into per-operation outcomes, in response order.
///
/// Change set parts (nested multipart) are flattened.
pub fn parse_batch_response(content_type: &str, body: &str) -> Result<Vec<OperationOutcome>> {
    let boundary = boundary_from_content_type(content_type)
        .ok_or_else(|| anyhow!("Batch response has no multipart boundary: '{}'", content_type))?;

    let mut outcomes = Vec::new();
    parse_multipart(&boundary, body, &mut outcomes)?;
    Ok(outcomes)
}

fn parse_multipart(boundary: &str, body: &str, outcomes: &mut Vec<OperationOutcome>) -> Result<()> {
    let delimiter = format!("--{}", boundary);
    let mut parts = body.split(delimiter.as_str());

    // preamble
    parts.next();

    for part in parts {
        if part.starts_with("--") {
            return Ok(());
        }

        let part = part.trim_start_matches(['\r', '\n']);
        let (headers, content) = split_head(part);

        match header_value(headers, "content-type") {
            Some(ct) if ct.to_ascii_lowercase().starts_with("multipart/mixed") => {
                let nested = boundary_from_content_type(ct)
                    .ok_or_else(|| anyhow!("Change set part has no boundary"))?;
                parse_multipart(&nested, content, outcomes)?;
            }
            _ => outcomes.push(parse_http_response(content)?),
        }
    }

    bail!("Batch response is missing its closing boundary")
}

fn parse_http_response(message: &str) -> Result<OperationOutcome> {
    let message = message.trim_start_matches(['\r', '\n']);
    let (head, body) = split_head(message);
    let status_line = head.lines().next().unwrap_or_default();

    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| anyhow!("Malformed status line in batch response: '{}'", status_line))?;

    if (200..300).contains(&status) {
        return Ok(OperationOutcome::ok(status));
    }

    let body = body.trim();
    let message = match serde_json::from_str::<ODataErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.code {
            Some(code) if !code.is_empty() => format!("{} ({})", envelope.error.message, code),
            _ => envelope.error.message,
        },
        Err(_) if body.is_empty() => status_line.trim().to_string(),
        Err(_) => body.chars().take(500).collect(),
    };

    Ok(OperationOutcome::failed(status, message))
}

/// Split at the first blank line; accepts CRLF or bare LF
fn split_head(text: &str) -> (&str, &str) {
    if let Some(pos) = text.find("\r\n\r\n") {
        (&text[..pos], &text[pos + 4..])
    } else if let Some(pos) = text.find("\n\n") {
        (&text[..pos], &text[pos + 2..])
    } else {
        (text, "")
    }
}

fn header_value<'a>(headers: &'a str, name: &str) -> Option<&'a str> {
    headers.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim().eq_ignore_ascii_case(name) {
            Some(value.trim())
        } else {
            None
        }
    })
}
