// src/signals/user_agent.rs
// Declared-agent analysis: automation keywords, headless markers and implausibly
// simple agent strings. Known-good crawlers short-circuit to a human-level score so
// indexing keeps working.

use async_trait::async_trait;

use super::{clamp_unit, Collector, PartialVerdict};
use crate::environment::HostEnvironment;

/// Search engines and link-preview fetchers that are let through untouched.
pub const KNOWN_GOOD_CRAWLERS: &[&str] = &[
    "googlebot",
    "bingbot",
    "slurp", // Yahoo
    "duckduckbot",
    "baiduspider",
    "yandexbot",
    "facebookexternalhit",
    "twitterbot",
    "linkedinbot",
    "whatsapp",
    "telegrambot",
];

pub const BOT_KEYWORDS: &[&str] = &[
    "bot",
    "crawler",
    "spider",
    "scraper",
    "parser",
    "fetcher",
    "monitor",
    "checker",
    "validator",
    "tester",
    "scanner",
];

const HEADLESS_MARKERS: &[&str] = &["headless", "phantom"];

const KEYWORD_WEIGHT: f64 = 0.8;
const HEADLESS_WEIGHT: f64 = 0.9;
const SIMPLE_AGENT_WEIGHT: f64 = 0.3;
const MIN_AGENT_LEN: usize = 50;
const MIN_AGENT_TOKENS: usize = 5;

const CONFIDENCE: f64 = 0.7;
const WHITELIST_CONFIDENCE: f64 = 0.9;

/// Returns the matched crawler token if the agent belongs to a known-good crawler.
pub fn known_good_crawler(user_agent: &str) -> Option<&'static str> {
    let lowered = user_agent.to_ascii_lowercase();
    KNOWN_GOOD_CRAWLERS
        .iter()
        .copied()
        .find(|crawler| lowered.contains(crawler))
}

/// Scores a declared agent string. Pure so it can be reused outside the collector.
pub fn score_user_agent(user_agent: &str) -> PartialVerdict {
    if let Some(crawler) = known_good_crawler(user_agent) {
        return PartialVerdict::scored(0.0, WHITELIST_CONFIDENCE, "user-agent-whitelist")
            .with_reason(format!("Whitelisted search engine bot ({crawler})"));
    }

    let lowered = user_agent.to_ascii_lowercase();
    let mut score = 0.0;
    let mut reasons = Vec::new();

    for keyword in BOT_KEYWORDS {
        if lowered.contains(keyword) {
            score += KEYWORD_WEIGHT;
            reasons.push(format!("User agent contains bot indicator: {keyword}"));
        }
    }

    if HEADLESS_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        score += HEADLESS_WEIGHT;
        reasons.push("Headless browser detected".to_string());
    }

    if lowered.len() < MIN_AGENT_LEN || lowered.split(' ').count() < MIN_AGENT_TOKENS {
        score += SIMPLE_AGENT_WEIGHT;
        reasons.push("Suspicious user agent pattern".to_string());
    }

    PartialVerdict::scored(clamp_unit(score), CONFIDENCE, "user-agent").with_reasons(reasons)
}

pub struct UserAgentCollector;

#[async_trait]
impl Collector for UserAgentCollector {
    fn id(&self) -> &'static str {
        "user-agent"
    }

    async fn collect(&self, env: &dyn HostEnvironment) -> PartialVerdict {
        match env.user_agent() {
            Ok(user_agent) => score_user_agent(&user_agent),
            Err(err) => {
                tracing::debug!(error = %err, "user agent probe failed");
                PartialVerdict::scored(0.3, 0.3, "user-agent-error")
                    .with_reason("User agent unavailable")
            }
        }
    }
}
