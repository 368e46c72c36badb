//! Rule-based completions: routes a free-text query to one of the registered tools
//!
//! The intent detection is pattern matching only; anything that is neither an
//! authorization-rate question nor arithmetic gets a help text.

use std::{fmt::Write as _, sync::Arc, sync::LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{
    authorization::{AuthorizationReport, DEFAULT_TIMEFRAME, DEFAULT_TRANSACTION_TYPE},
    calculator::Operation,
    executor::ToolExecutor,
    tools::ToolKind,
};
use crate::errors::AppError;

static AUTH_RATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(improv(e|ing)|increas(e|ing)|boost(ing)?|enhanc(e|ing))\s+.{0,20}\b(auth(orization)?|approval)\s+.{0,10}\b(rate|percentage|ratio)\b",
    )
    .expect("authorization rate pattern is valid")
});

static MATH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(calculat(e|or)|math|add|subtract|multiply|divide)\b|\b(\d+)\s*([+\-*/×÷])\s*(\d+)\b",
    )
    .expect("math pattern is valid")
});

static EXPRESSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*([+\-*/×÷])\s*(\d+(?:\.\d+)?)")
        .expect("expression pattern is valid")
});

static NUMBER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("number pattern is valid"));

static MERCHANT_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:merchant|merch)\s*(?:id)?\s*(?:is|:)?\s*([A-Z0-9]{5,})")
        .expect("merchant id pattern is valid")
});

const NO_QUERY: &str = "No query provided";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResponse {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON text of the arguments the tool was invoked with.
    pub arguments: String,
}

impl CompletionResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}

impl CompletionRequest {
    /// The explicit query, or else the first user message with content.
    pub fn effective_query(&self) -> &str {
        if let Some(query) = self.query.as_deref().filter(|query| !query.is_empty()) {
            return query;
        }

        self.user_messages().next().unwrap_or(NO_QUERY)
    }

    fn user_messages(&self) -> impl Iterator<Item = &str> {
        self.messages
            .iter()
            .flatten()
            .filter(|message| message.role == "user")
            .filter_map(|message| message.content.as_deref())
    }

    fn matches(&self, pattern: &Regex) -> bool {
        self.query
            .as_deref()
            .is_some_and(|query| pattern.is_match(query))
            || self.user_messages().any(|content| pattern.is_match(content))
    }

    fn merchant_id(&self) -> Option<String> {
        let from_text = |text: &str| {
            MERCHANT_ID_PATTERN
                .captures(text)
                .and_then(|captures| captures.get(1))
                .map(|id| id.as_str().to_string())
        };

        if let Some(id) = self.query.as_deref().and_then(from_text) {
            return Some(id);
        }

        let from_messages = self
            .messages
            .iter()
            .flatten()
            .filter_map(|message| message.content.as_deref())
            .find_map(from_text);
        if from_messages.is_some() {
            return from_messages;
        }

        self.context
            .as_ref()
            .and_then(|context| context.get("merchantId"))
            .filter(|value| !value.is_null())
            .map(|value| match value {
                Value::String(id) => id.clone(),
                other => other.to_string(),
            })
    }
}

/// Produces an answer for a completion request.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, AppError>;
}

pub struct RuleBasedCompletions {
    executor: Arc<ToolExecutor>,
}

impl RuleBasedCompletions {
    pub fn new(executor: Arc<ToolExecutor>) -> Self {
        Self { executor }
    }

    fn authorization_rate(&self, request: &CompletionRequest) -> CompletionResponse {
        info!("handling authorization rate query");

        let Some(merchant_id) = request.merchant_id() else {
            return CompletionResponse::text(
                "To provide recommendations for improving your authorization rate, I need your merchant ID. Could you please provide it?",
            );
        };

        let arguments = json!({
            "merchantId": merchant_id,
            "timeframe": DEFAULT_TIMEFRAME,
            "transactionType": DEFAULT_TRANSACTION_TYPE,
        });

        let outcome = self
            .invoke(ToolKind::ImproveAuthorizationRate, &arguments)
            .and_then(|(result, call)| {
                serde_json::from_value::<AuthorizationReport>(result)
                    .map(|report| (report, call))
                    .map_err(|err| err.to_string())
            });

        match outcome {
            Ok((report, call)) => CompletionResponse {
                content: render_authorization_report(&report),
                tool_calls: Some(vec![call]),
                metadata: Some(Map::from_iter([
                    ("merchantId".to_string(), json!(merchant_id)),
                    ("timeframe".to_string(), json!(DEFAULT_TIMEFRAME)),
                ])),
            },
            Err(message) => {
                CompletionResponse::text(format!("Error analyzing authorization rates: {message}"))
            }
        }
    }

    fn math(&self, request: &CompletionRequest) -> CompletionResponse {
        info!("handling math query");

        let query = request.effective_query();
        let lowered = query.to_lowercase();

        let mut operation = Operation::NAMES
            .iter()
            .find(|name| lowered.contains(*name))
            .and_then(|name| name.parse::<Operation>().ok());
        let mut operands = None;

        if let Some(captures) = EXPRESSION_PATTERN.captures(query) {
            let a = captures[1].parse::<f64>().ok();
            let b = captures[3].parse::<f64>().ok();
            operands = a.zip(b);
            if let Some(symbol_operation) = Operation::from_symbol(&captures[2]) {
                operation = Some(symbol_operation);
            }
        }

        let Some(operation) = operation else {
            return CompletionResponse::text(
                "I can perform basic math operations (add, subtract, multiply, divide). \
                 Please specify the operation and the numbers you want to calculate. \
                 For example: 'add 5 and 3' or '5 + 3'.",
            );
        };

        let operands = operands.or_else(|| {
            let numbers = extract_numbers(query);
            match numbers.as_slice() {
                [a, b, ..] => Some((*a, *b)),
                _ => None,
            }
        });

        let Some((a, b)) = operands else {
            let name = operation.as_str();
            return CompletionResponse::text(format!(
                "I need two numbers to perform a {name} operation. \
                 Please provide both numbers. For example: '{name} 5 and 3'."
            ));
        };

        let arguments = json!({"operation": operation.as_str(), "a": a, "b": b});

        match self.invoke(ToolKind::Calculate, &arguments) {
            Ok((result, call)) => {
                let expression = result
                    .get("expression")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                CompletionResponse {
                    content: format!("The result of {expression}"),
                    tool_calls: Some(vec![call]),
                    metadata: Some(Map::from_iter([
                        ("operation".to_string(), json!(operation.as_str())),
                        ("a".to_string(), json!(a)),
                        ("b".to_string(), json!(b)),
                        (
                            "result".to_string(),
                            result.get("result").cloned().unwrap_or(Value::Null),
                        ),
                    ])),
                }
            }
            Err(message) => {
                CompletionResponse::text(format!("Error performing calculation: {message}"))
            }
        }
    }

    /// Runs `kind` through the executor and describes the call for the response.
    fn invoke(&self, kind: ToolKind, arguments: &Value) -> Result<(Value, ToolCall), String> {
        let name = kind.function_name();
        let arguments = arguments.to_string();

        let result = self.executor.execute(name, &arguments).map_err(|err| {
            warn!(function = %name, error = %err, "tool call from completion failed");
            err.to_string()
        })?;

        let call = ToolCall {
            id: Uuid::new_v4().to_string(),
            kind: "function".to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments,
            },
        };
        Ok((result, call))
    }
}

#[async_trait]
impl CompletionService for RuleBasedCompletions {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, AppError> {
        debug!(query = %request.effective_query(), "processing completion request");

        if request.matches(&AUTH_RATE_PATTERN) {
            return Ok(self.authorization_rate(&request));
        }

        if request.matches(&MATH_PATTERN) {
            return Ok(self.math(&request));
        }

        Ok(default_response(request.effective_query()))
    }
}

fn extract_numbers(text: &str) -> Vec<f64> {
    NUMBER_PATTERN
        .find_iter(text)
        .filter_map(|number| number.as_str().parse::<f64>().ok())
        .collect()
}

fn render_authorization_report(report: &AuthorizationReport) -> String {
    let metrics = &report.current_metrics;

    let mut content =
        String::from("Based on the analysis of your authorization rates, here are the recommendations:\n\n");
    let _ = writeln!(content, "Current Authorization Rate: {:.1}%", metrics.authorization_rate);
    let _ = writeln!(content, "Current Decline Rate: {:.1}%", metrics.decline_rate);
    let _ = writeln!(content, "Total Transactions: {}\n", metrics.total_transactions);

    content.push_str("Top Decline Reasons:\n");
    for (reason, share) in report.decline_reasons.entries() {
        let _ = writeln!(content, "- {}: {:.1}%", reason.replace('_', " "), share);
    }
    content.push('\n');

    content.push_str("Recommendations to Improve Authorization Rate:\n");
    for (position, recommendation) in report.recommendations.iter().enumerate() {
        let _ = writeln!(
            content,
            "{}. {} (Priority: {}, Est. Impact: +{:.1}%)",
            position + 1,
            recommendation.title,
            recommendation.priority,
            recommendation.estimated_impact_percentage
        );
        let _ = writeln!(content, "   {}\n", recommendation.description);
    }

    content
}

fn default_response(query: &str) -> CompletionResponse {
    const INTRO: &str = "I'm a PayPal MCP server that can help with authorization rates and perform basic math calculations. \
        You can ask me to improve your authorization rate (provide your merchant ID) or \
        perform calculations like 'add 5 and 3' or '5 + 3'.";

    let lowered = query.to_lowercase();
    let has_word = |word: &str| {
        lowered
            .split(|c: char| !c.is_alphanumeric())
            .any(|token| token == word)
    };

    let content = if has_word("hello") || has_word("hi") {
        format!("Hello! {INTRO}")
    } else if has_word("help") {
        "I can help you with the following:\n\n\
         1. Improve your PayPal authorization rates - Just ask about improving your authorization rate and provide your merchant ID.\n\
         2. Perform basic math calculations - You can ask me to add, subtract, multiply, or divide numbers."
            .to_string()
    } else {
        INTRO.to_string()
    };

    CompletionResponse::text(content)
}
