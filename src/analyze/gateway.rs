//! Analysis gateway: the call out to the external reasoning service.
//!
//! The pipeline treats the service as an opaque collaborator: one article
//! in, one raw judgment (or an error) out. No retries — a failed call skips
//! the article and the next scheduler tick is the retry mechanism.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::analyze::judgment::RawJudgment;
use crate::ingest::types::Article;

/// Body text is truncated before prompting; anything past this adds cost
/// without adding signal.
const BODY_PROMPT_CHARS: usize = 2500;

const GROQ_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const GROQ_MODEL: &str = "llama-3.3-70b-versatile";

const SYSTEM_PROMPT: &str = "\
You are FinSight's AI financial signal engine. You give everyday retail investors honest, \
plain-English trading signals based on financial news. You cover ASX, US equities, crypto, \
and commodities. You MUST respond ONLY with valid JSON, no text outside the JSON.

Before giving any signal, check for pump-and-dump red flags: anonymous sources promoting \
obscure stocks, phrases like 'guaranteed' or '100x', news only on tiny blogs or paid press \
releases, vague hype with no financials, manufactured urgency. Any red flag present: set \
pump_dump_risk to HIGH and the signal MUST be AVOID. One or two minor flags: MEDIUM, and \
lower confidence by 40%. Credible source with real facts: LOW.

Signals: BUY needs a real, verifiable positive catalyst with actual numbers. SELL must say \
whether it is 'cut losses, more downside coming' or 'take profits, peak is in'. AVOID means \
too risky or too suspicious right now. WATCH means real news that is not actionable yet; \
state the exact trigger that would change it.

Write all text fields in plain English a first-time investor understands. summary: one \
sentence stating the actual fact and what it means for the price. reasoning: 4-5 short \
plain sentences. signal_logic: one line, max 12 words. Impact scale: -1.0 (catastrophic) \
to +1.0 (transformative positive). Confidence: 0.0 to 1.0, your raw score times source \
credibility, adjusted for red flags.";

#[async_trait]
pub trait AnalysisGateway: Send + Sync {
    /// Request one judgment for one article. Errors mean "skip this article".
    async fn analyze(&self, article: &Article) -> Result<RawJudgment>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

pub type DynGateway = Arc<dyn AnalysisGateway>;

// ------------------------------------------------------------
// Groq (OpenAI-compatible chat completions)
// ------------------------------------------------------------

pub struct GroqGateway {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GroqGateway {
    pub fn new(api_key: impl Into<String>, model_override: Option<&str>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("finsight-signals/0.1")
            .connect_timeout(Duration::from_secs(5))
            // A stuck call must bound itself; the run skips the article after this.
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key: api_key.into(),
            model: model_override.unwrap_or(GROQ_MODEL).to_string(),
        }
    }

    fn user_prompt(article: &Article) -> String {
        let body: String = article.body.chars().take(BODY_PROMPT_CHARS).collect();
        format!(
            "Analyze this financial news article.\n\n\
             ARTICLE:\n\
             Title:       {title}\n\
             Source:      {source}  (credibility: {cred:.0}%)\n\
             Published:   {published}\n\
             Content:     {body}\n\n\
             Current time (UTC): {now}\n\n\
             Return EXACTLY this JSON, no other text:\n\
             {{\n\
               \"tickers\": [],\n\
               \"market\": \"US\",\n\
               \"signal\": \"BUY\",\n\
               \"confidence\": 0.00,\n\
               \"impact\": 0.00,\n\
               \"pump_dump_risk\": \"LOW\",\n\
               \"summary\": \"\",\n\
               \"reasoning\": \"\",\n\
               \"signal_logic\": \"\",\n\
               \"relevant\": true,\n\
               \"skip_reason\": \"\"\n\
             }}\n\n\
             Hard rules:\n\
             1. market must be exactly: ASX | US | CRYPTO | COMMODITY\n\
             2. No market-moving content -> relevant=false\n\
             3. ASX tickers need .AX suffix (BHP.AX, CBA.AX)\n\
             4. Crypto: symbol only (BTC, ETH, SOL)\n\
             5. Commodity: GOLD, SILVER, OIL\n\
             6. confidence = your raw score x {cred_frac:.2}, adjusted for red flags\n\
             7. Max 4 tickers\n\
             8. pump_dump_risk must be: LOW | MEDIUM | HIGH; if HIGH, signal MUST be AVOID",
            title = article.title,
            source = article.source,
            cred = article.credibility * 100.0,
            cred_frac = article.credibility,
            published = article.published_at.format("%Y-%m-%d %H:%M UTC"),
            body = body,
            now = chrono::Utc::now().format("%Y-%m-%d %H:%M UTC"),
        )
    }
}

#[async_trait]
impl AnalysisGateway for GroqGateway {
    async fn analyze(&self, article: &Article) -> Result<RawJudgment> {
        if self.api_key.is_empty() {
            return Err(anyhow!("GROQ_API_KEY not configured"));
        }

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let user = Self::user_prompt(article);
        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Msg {
                    role: "user",
                    content: &user,
                },
            ],
            temperature: 0.05,
            max_tokens: 1400,
        };

        let resp = self
            .http
            .post(GROQ_URL)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("gateway transport")?;

        if !resp.status().is_success() {
            return Err(anyhow!("gateway returned status {}", resp.status()));
        }

        let body: Resp = resp.json().await.context("gateway response body")?;
        let content = body
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or_default();

        let json = strip_markdown_fences(content);
        serde_json::from_str(json.trim()).context("gateway returned malformed judgment json")
    }

    fn name(&self) -> &'static str {
        "groq"
    }
}

/// Models sometimes wrap their JSON in ``` fences despite instructions.
fn strip_markdown_fences(text: &str) -> &str {
    let t = text.trim();
    if !t.starts_with("```") {
        return t;
    }
    let inner = t.trim_start_matches("```");
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    match inner.find("```") {
        Some(end) => &inner[..end],
        None => inner,
    }
}

// ------------------------------------------------------------
// Mock gateway for tests
// ------------------------------------------------------------

/// Returns scripted judgments keyed by article title; unknown titles get an
/// error (i.e. a gateway failure). Records how many calls it served.
#[derive(Default)]
pub struct MockGateway {
    scripted: HashMap<String, RawJudgment>,
    calls: std::sync::atomic::AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, title: impl Into<String>, judgment: RawJudgment) -> Self {
        self.scripted.insert(title.into(), judgment);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisGateway for MockGateway {
    async fn analyze(&self, article: &Article) -> Result<RawJudgment> {
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.scripted
            .get(&article.title)
            .cloned()
            .ok_or_else(|| anyhow!("no scripted judgment for '{}'", article.title))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
