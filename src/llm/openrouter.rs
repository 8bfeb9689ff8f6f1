//! OpenRouter correlation oracle.
//!
//! Routes correlation questions through OpenRouter's OpenAI-compatible
//! chat completions API. The oracle is optional; callers wrap `assess`
//! in a timeout and keep the heuristic result on any failure.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use super::{CorrelationOracle, OracleAssessment};
use crate::types::PropAnalysis;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4";

const DEFAULT_MAX_TOKENS: u32 = 512;

/// Maximum retries on rate limit / server errors.
const MAX_RETRIES: u32 = 2;

/// Base delay for exponential backoff (ms).
const BASE_BACKOFF_MS: u64 = 500;

/// Oracle adjustments outside this band are clamped.
const MAX_ORACLE_ADJUSTMENT: f64 = 10.0;

// ---------------------------------------------------------------------------
// API types (OpenAI-compatible)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChatMessage>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct OpenRouterOracle {
    http: Client,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
    total_calls: AtomicU64,
}

impl OpenRouterOracle {
    pub fn new(
        api_key: SecretString,
        model: Option<String>,
        max_tokens: Option<u32>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build OpenRouter HTTP client")?;

        Ok(Self {
            http,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            total_calls: AtomicU64::new(0),
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Total number of successful API calls made.
    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }

    /// Send one chat completion request with retry + exponential backoff.
    async fn call_api(&self, system: &str, user_message: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_message.to_string(),
                },
            ],
        };

        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = BASE_BACKOFF_MS * 2u64.pow(attempt - 1);
                debug!(
                    attempt,
                    delay_ms = delay,
                    model = %self.model,
                    "Retrying OpenRouter API call"
                );
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            }

            let resp = self
                .http
                .post(OPENROUTER_API_URL)
                .header("Authorization", format!("Bearer {}", self.api_key.expose_secret()))
                .header("Content-Type", "application/json")
                .header("X-Title", "PROPSTACK correlation oracle")
                .json(&request)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let body: ChatResponse = response
                            .json()
                            .await
                            .context("Failed to parse OpenRouter response")?;
                        self.total_calls.fetch_add(1, Ordering::Relaxed);
                        return Ok(body
                            .choices
                            .first()
                            .and_then(|c| c.message.as_ref())
                            .map(|m| m.content.clone())
                            .unwrap_or_default());
                    }

                    if status.as_u16() == 429 || status.as_u16() >= 500 {
                        let error_text = response.text().await.unwrap_or_default();
                        warn!(
                            status = %status,
                            attempt,
                            error = %error_text,
                            "Retryable OpenRouter error"
                        );
                        last_error = Some(format!("HTTP {status}: {error_text}"));
                        continue;
                    }

                    let error_text = response.text().await.unwrap_or_default();
                    anyhow::bail!(
                        "OpenRouter API error {status} (model={}): {error_text}",
                        self.model
                    );
                }
                Err(e) => {
                    warn!(attempt, error = %e, "OpenRouter request failed");
                    last_error = Some(format!("Request error: {e}"));
                }
            }
        }

        anyhow::bail!(
            "OpenRouter API failed after {} retries (model={}): {}",
            MAX_RETRIES,
            self.model,
            last_error.unwrap_or_default()
        )
    }

    pub fn system_prompt() -> &'static str {
        "You assess statistical dependence between NFL player prop legs in a parlay.\n\n\
         RULES:\n\
         1. Consider game script, target competition, and shared volume.\n\
         2. Positive dependence raises the joint hit rate; negative lowers it.\n\
         3. Give at most three short NOTE lines.\n\
         4. Your final line MUST be exactly:\n\
            ADJUSTMENT: <signed number of confidence points between -10 and 10>"
    }

    pub fn build_prompt(legs: &[PropAnalysis]) -> String {
        let mut prompt = String::with_capacity(256 + legs.len() * 96);
        prompt.push_str(&format!("PARLAY ({} legs):\n", legs.len()));
        for (i, leg) in legs.iter().enumerate() {
            let c = &leg.candidate;
            prompt.push_str(&format!(
                "{}. {} ({} vs {}) {} {} {} | confidence {:.1}\n",
                i + 1,
                c.player,
                c.team,
                c.opponent,
                c.stat,
                c.direction,
                c.line,
                leg.confidence
            ));
        }
        prompt.push_str(
            "\nExplain the key dependencies as NOTE lines, then output the adjustment.\n",
        );
        prompt
    }

    /// Parse `NOTE:` lines and the final `ADJUSTMENT:` value.
    pub fn parse_assessment(text: &str) -> Result<OracleAssessment> {
        let mut adjustment = None;
        let mut rationale = Vec::new();

        for line in text.lines() {
            let trimmed = line.trim();
            let is_note = trimmed
                .get(..5)
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case("NOTE:"));
            let upper = trimmed.to_uppercase();
            if is_note {
                let note = trimmed[5..].trim();
                if !note.is_empty() {
                    rationale.push(note.to_string());
                }
            } else if let Some(pos) = upper.find("ADJUSTMENT:") {
                if let Some(v) = Self::extract_signed_float(&upper[pos + "ADJUSTMENT:".len()..]) {
                    adjustment = Some(v.clamp(-MAX_ORACLE_ADJUSTMENT, MAX_ORACLE_ADJUSTMENT));
                }
            }
        }

        if adjustment.is_none() && rationale.is_empty() {
            anyhow::bail!("Could not parse correlation assessment from oracle response");
        }
        Ok(OracleAssessment { adjustment, rationale })
    }

    /// First signed decimal number in `text`.
    fn extract_signed_float(text: &str) -> Option<f64> {
        let start = text.find(|c: char| c.is_ascii_digit() || c == '-' || c == '+' || c == '.')?;
        let num: String = text[start..]
            .chars()
            .enumerate()
            .take_while(|(i, c)| {
                c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+'))
            })
            .map(|(_, c)| c)
            .collect();
        num.parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

// ---------------------------------------------------------------------------
// CorrelationOracle implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl CorrelationOracle for OpenRouterOracle {
    async fn assess(&self, legs: &[PropAnalysis]) -> Result<OracleAssessment> {
        let user_msg = Self::build_prompt(legs);
        debug!(legs = legs.len(), model = %self.model, "Requesting correlation assessment");

        let text = self
            .call_api(Self::system_prompt(), &user_msg)
            .await
            .context("OpenRouter correlation call failed")?;
        let assessment = Self::parse_assessment(&text)?;

        info!(
            legs = legs.len(),
            adjustment = ?assessment.adjustment,
            notes = assessment.rationale.len(),
            "Correlation assessment complete (OpenRouter)"
        );
        Ok(assessment)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, PropCandidate, StatCategory};
    use rust_decimal_macros::dec;

    fn make_leg(player: &str, stat: StatCategory) -> PropAnalysis {
        PropAnalysis {
            candidate: PropCandidate {
                player: player.into(),
                team: "CIN".into(),
                opponent: "BAL".into(),
                week: "W3".into(),
                stat,
                line: dec!(274.5),
                direction: Direction::Over,
            },
            scores: Vec::new(),
            confidence: 68.3,
            low_signal: false,
            projection: None,
            cushion: None,
            original_line: None,
            adjusted_line: None,
        }
    }

    #[test]
    fn test_client_construction_defaults() {
        let oracle =
            OpenRouterOracle::new(SecretString::new("test-key".into()), None, None).unwrap();
        assert_eq!(oracle.model_name(), DEFAULT_MODEL);
        assert_eq!(oracle.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(oracle.total_calls(), 0);
    }

    #[test]
    fn test_prompt_lists_every_leg() {
        let prompt = OpenRouterOracle::build_prompt(&[
            make_leg("Joe Burrow", StatCategory::PassingYards),
            make_leg("Ja'Marr Chase", StatCategory::ReceivingYards),
        ]);
        assert!(prompt.contains("PARLAY (2 legs)"));
        assert!(prompt.contains("1. Joe Burrow (CIN vs BAL) passing_yards OVER 274.5"));
        assert!(prompt.contains("2. Ja'Marr Chase"));
        assert!(prompt.contains("confidence 68.3"));
    }

    #[test]
    fn test_parse_assessment_notes_and_adjustment() {
        let text = "Thinking...\n\
            NOTE: Chase draws most of Burrow's air yards\n\
            note: dome game\n\
            ADJUSTMENT: +2.5";
        let a = OpenRouterOracle::parse_assessment(text).unwrap();
        assert_eq!(a.adjustment, Some(2.5));
        assert_eq!(a.rationale, vec!["Chase draws most of Burrow's air yards", "dome game"]);
    }

    #[test]
    fn test_parse_assessment_negative_and_clamped() {
        assert_eq!(
            OpenRouterOracle::parse_assessment("ADJUSTMENT: -1.25").unwrap().adjustment,
            Some(-1.25)
        );
        assert_eq!(
            OpenRouterOracle::parse_assessment("Adjustment: 40").unwrap().adjustment,
            Some(10.0)
        );
    }

    #[test]
    fn test_parse_assessment_rejects_noise() {
        assert!(OpenRouterOracle::parse_assessment("I cannot help with that.").is_err());
    }
}
