// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Glucose-aware chat assistant.
//!
//! Questions that mention glucose or health topics get a summary of the
//! user's recent readings injected into the system prompt. Every model reply
//! is stripped of markdown and checked by a safety filter; a reply that looks
//! like dosing or prescribing advice is replaced outright.

use crate::error::AppError;
use crate::models::{GlucoseWindow, ResolvedReadings};
use crate::services::language_model::{LanguageModelClient, Usage};
use crate::services::resolver::GlucoseResolver;
use regex::Regex;
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const SYSTEM_PROMPT: &str = "\
You are an assistant that helps people understand their continuous glucose monitor data.

Safety rules you must always follow:
- Never suggest insulin doses or any medication amount.
- Never tell the user to start, stop, or change a medication.
- Never diagnose, prescribe, or give a treatment plan.
- For emergencies, tell the user to call emergency services or their doctor.

You may:
- Describe patterns, trends, and ranges in the glucose data provided.
- Offer general diabetes education and lifestyle considerations (food, activity, sleep, stress).
- Point out patterns worth raising with a healthcare provider.

Formatting: plain text only, no markdown headers or bold. Use short paragraphs and simple dash lists.";

const SAFE_REPLACEMENT: &str = "\
I can't give advice about medication or insulin dosing.

I can help you understand patterns in your glucose data and share general information about diabetes management. Please take any question about medication, dosing, or treatment to your healthcare provider.

Which part of your glucose data would you like to look at?";

const FAILURE_REPLY: &str =
    "Sorry, I couldn't process your request right now. Please try again later.";

/// Words that make a message worth answering with the user's data.
const HEALTH_KEYWORDS: &[&str] = &[
    "glucose",
    "blood sugar",
    "diabetes",
    "health",
    "trend",
    "pattern",
    "high",
    "low",
    "average",
    "reading",
    "level",
    "mg/dl",
    "how am i",
    "how is my",
    "what is my",
    "analyze",
    "insight",
    "recommendation",
    "advice",
    "help",
    "problem",
    "issue",
];

const DANGEROUS_PATTERNS: &[&str] = &[
    r"\b(?:take|give|inject|administer|use)\s+\d+\s*(?:units?|iu|iu's)\s+(?:of\s+)?insulin\b",
    r"\b(?:increase|decrease|adjust|change|modify)\s+(?:your\s+)?insulin\s+(?:dose|dosage|amount)\b",
    r"\b(?:stop|start|discontinue|begin)\s+(?:taking|using)\s+(?:insulin|medication|medicine)\b",
    r"\b(?:you\s+should|you\s+must|you\s+need\s+to)\s+(?:take|give|inject)\s+insulin\b",
    r"\b(?:prescribe|prescription)\s+(?:of\s+)?(?:insulin|medication)\b",
    r"\b(?:emergency|urgent|immediate|right\s+now)\s+(?:insulin|medication|treatment)\b",
];

const DANGEROUS_PHRASES: &[&str] = &[
    "take insulin",
    "give insulin",
    "inject insulin",
    "insulin dose",
    "prescription",
];

/// Markdown-to-plain-text rewrites, applied in order.
const MARKDOWN_REWRITES: &[(&str, &str)] = &[
    (r"\*\*(.*?)\*\*", "${1}"),
    (r"\*(.*?)\*", "${1}"),
    (r"(?m)^#{1,6}\s+", ""),
    (r"\n\s*#{1,6}\s+", "\n"),
    (r"`(.*?)`", "${1}"),
    (r"\[([^\]]+)\]\([^)]+\)", "${1}"),
    (r"\n\s*\n\s*\n", "\n\n"),
    (r"\n[ \t]*-[ \t]*", "\n- "),
    (r"\n[ \t]*\n", "\n\n"),
    (r"(?m)^[ \t]*#{1,6}[ \t]*$", ""),
];

/// Canned prompts for the insights endpoint.
pub fn insight_prompt(analysis_type: &str) -> &'static str {
    match analysis_type {
        "trends" => "How has my glucose trended over this period? Describe the overall direction.",
        "patterns" => {
            "What patterns do you see in my glucose readings? Are there recurring highs or lows at certain times?"
        }
        "recommendations" => {
            "Based on my glucose data, what lifestyle or monitoring suggestions would you make?"
        }
        _ => "Give me an overall analysis of my glucose data: trends, patterns, and general insights.",
    }
}

/// Compiled reply filters.
pub struct ReplyFilter {
    dangerous: Vec<Regex>,
    markdown: Vec<(Regex, &'static str)>,
}

impl ReplyFilter {
    pub fn new() -> Result<Self, regex::Error> {
        let dangerous = DANGEROUS_PATTERNS
            .iter()
            .map(|p| Regex::new(&format!("(?i){}", p)))
            .collect::<Result<_, _>>()?;
        let markdown = MARKDOWN_REWRITES
            .iter()
            .map(|(p, r)| Regex::new(p).map(|re| (re, *r)))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            dangerous,
            markdown,
        })
    }

    /// Whether `text` reads like dosing or prescribing advice.
    pub fn is_dangerous(&self, text: &str) -> bool {
        if self.dangerous.iter().any(|re| re.is_match(text)) {
            return true;
        }
        let lower = text.to_lowercase();
        DANGEROUS_PHRASES.iter().any(|p| lower.contains(p))
    }

    /// Strip markdown formatting for plain-text display.
    pub fn clean_markdown(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (re, replacement) in &self.markdown {
            out = re.replace_all(&out, *replacement).into_owned();
        }
        out.trim().to_string()
    }
}

/// Whether a message should be answered with the user's glucose data.
pub fn wants_glucose_context(message: &str) -> bool {
    let lower = message.to_lowercase();
    HEALTH_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Plain-text summary of resolved readings for the model.
pub fn glucose_context(data: &ResolvedReadings) -> String {
    let readings = &data.readings;
    let (Some(first), Some(last)) = (readings.first(), readings.last()) else {
        return "No recent glucose data available.".to_string();
    };

    let values: Vec<f64> = readings.iter().map(|r| r.value_mgdl).collect();
    let avg = values.iter().sum::<f64>() / values.len() as f64;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let low = values.iter().filter(|v| **v < 70.0).count();
    let high = values.iter().filter(|v| **v > 180.0).count();
    let normal = values.len() - low - high;

    let mut context = format!(
        "Recent glucose data (last {window}):\n\
         - Data source: {source}\n\
         - Time range: {start} to {end}\n\
         - Total readings: {count}\n\
         - Average: {avg:.1} mg/dL\n\
         - Range: {min} - {max} mg/dL\n\
         - Low readings (<70 mg/dL): {low}\n\
         - Normal readings (70-180 mg/dL): {normal}\n\
         - High readings (>180 mg/dL): {high}\n\
         \n\
         Latest readings:\n",
        window = data.window,
        source = data.source.as_str(),
        start = first.timestamp.format("%m/%d %H:%M"),
        end = last.timestamp.format("%m/%d %H:%M"),
        count = readings.len(),
    );

    for reading in readings.iter().rev().take(5).rev() {
        context.push_str(&format!(
            "- {}: {} mg/dL\n",
            reading.timestamp.format("%H:%M"),
            reading.value_mgdl
        ));
    }

    context
}

/// Chat reply returned to the client.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ChatReply {
    pub success: bool,
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub glucose_context_included: bool,
    pub safety_checked: bool,
}

impl ChatReply {
    fn failed(error: &AppError) -> Self {
        Self {
            success: false,
            response: FAILURE_REPLY.to_string(),
            model: None,
            usage: None,
            error: Some(error.to_string()),
            glucose_context_included: false,
            safety_checked: false,
        }
    }
}

/// Forwards questions to the language model with glucose context.
#[derive(Clone)]
pub struct ChatService {
    llm: Option<LanguageModelClient>,
    resolver: GlucoseResolver,
    filter: std::sync::Arc<ReplyFilter>,
}

impl ChatService {
    pub fn new(
        llm: Option<LanguageModelClient>,
        resolver: GlucoseResolver,
    ) -> Result<Self, AppError> {
        let filter = ReplyFilter::new()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid reply filter: {}", e)))?;
        Ok(Self {
            llm,
            resolver,
            filter: std::sync::Arc::new(filter),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.llm.is_some()
    }

    /// Answer `message` for `user_id`. Never fails; errors become a failed reply.
    pub async fn respond(
        &self,
        user_id: &str,
        message: &str,
        extra_context: &str,
        window: GlucoseWindow,
    ) -> ChatReply {
        match self.try_respond(user_id, message, extra_context, window).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(user_id, error = %e, "Chat request failed");
                ChatReply::failed(&e)
            }
        }
    }

    async fn try_respond(
        &self,
        user_id: &str,
        message: &str,
        extra_context: &str,
        window: GlucoseWindow,
    ) -> Result<ChatReply, AppError> {
        let llm = self.llm.as_ref().ok_or_else(|| {
            AppError::LanguageModel("Chat is disabled: OPENAI_API_KEY is not set".to_string())
        })?;

        let include_glucose = wants_glucose_context(message);
        let mut system_prompt = SYSTEM_PROMPT.to_string();
        if include_glucose {
            let data = self.resolver.resolve(user_id, window).await;
            system_prompt.push_str("\n\nUSER'S GLUCOSE DATA:\n");
            system_prompt.push_str(&glucose_context(&data));
        }
        if !extra_context.trim().is_empty() {
            system_prompt.push_str("\n\nADDITIONAL CONTEXT:\n");
            system_prompt.push_str(extra_context);
        }

        let completion = llm.generate(&system_prompt, message).await?;

        let mut response = self.filter.clean_markdown(&completion.text);
        if self.filter.is_dangerous(&response) {
            tracing::warn!(user_id, "Model reply flagged by safety filter, replaced");
            response = SAFE_REPLACEMENT.to_string();
        }

        Ok(ChatReply {
            success: true,
            response,
            model: Some(completion.model),
            usage: completion.usage,
            error: None,
            glucose_context_included: include_glucose,
            safety_checked: true,
        })
    }
}
