//! Tools exposed through `executeFunction` and the HTTP tool endpoints
//!
//! The set is closed: a tool needs both a `ToolKind` variant (definition plus
//! invocation branch) and a registry entry before it can be executed.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::{
    authorization::{
        self, DEFAULT_TIMEFRAME, DEFAULT_TRANSACTION_TYPE, TIMEFRAMES, TRANSACTION_TYPES,
    },
    calculator::{self, Operation},
    registry::{ParameterDefinition, Tool},
};
use crate::errors::ToolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    ImproveAuthorizationRate,
    Calculate,
}

impl ToolKind {
    pub const ALL: [ToolKind; 2] = [ToolKind::ImproveAuthorizationRate, ToolKind::Calculate];

    pub fn function_name(self) -> &'static str {
        match self {
            Self::ImproveAuthorizationRate => "improveAuthorizationRate",
            Self::Calculate => "calculate",
        }
    }

    pub fn from_function_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.function_name() == name)
    }

    pub fn definition(self) -> Tool {
        match self {
            Self::ImproveAuthorizationRate => Tool::function(
                self.function_name(),
                "Analyzes transaction data and provides recommendations to improve authorization rates",
                [
                    (
                        "merchantId",
                        ParameterDefinition::new("string", "The merchant ID to analyze", true),
                    ),
                    (
                        "timeframe",
                        ParameterDefinition::new("string", "The timeframe for analysis", true)
                            .with_default(DEFAULT_TIMEFRAME)
                            .with_allowed_values(&TIMEFRAMES),
                    ),
                    (
                        "transactionType",
                        ParameterDefinition::new(
                            "string",
                            "Optional transaction type filter",
                            false,
                        )
                        .with_default(DEFAULT_TRANSACTION_TYPE)
                        .with_allowed_values(&TRANSACTION_TYPES),
                    ),
                ],
            ),
            Self::Calculate => Tool::function(
                self.function_name(),
                "Performs basic math operations (add, subtract, multiply, divide)",
                [
                    (
                        "operation",
                        ParameterDefinition::new(
                            "string",
                            "The operation to perform (add, subtract, multiply, divide)",
                            true,
                        )
                        .with_allowed_values(&Operation::NAMES),
                    ),
                    ("a", ParameterDefinition::new("number", "First operand", true)),
                    ("b", ParameterDefinition::new("number", "Second operand", true)),
                ],
            ),
        }
    }

    /// Validates `arguments` against this tool's contract and runs it.
    pub fn invoke(self, arguments: &Value) -> Result<Value, ToolError> {
        let args = ToolArguments::new(self, arguments)?;

        match self {
            Self::ImproveAuthorizationRate => {
                let merchant_id = args.required_str("merchantId")?;
                let timeframe = args.optional_choice("timeframe", &TIMEFRAMES, DEFAULT_TIMEFRAME)?;
                let transaction_type = args.optional_choice(
                    "transactionType",
                    &TRANSACTION_TYPES,
                    DEFAULT_TRANSACTION_TYPE,
                )?;

                to_result(&authorization::improve_authorization_rate(
                    merchant_id,
                    timeframe,
                    transaction_type,
                ))
            }
            Self::Calculate => {
                let operation = args.required_str("operation")?;
                let a = args.required_number("a")?;
                let b = args.required_number("b")?;

                let calculation = calculator::calculate(operation, a, b)
                    .map_err(|err| ToolError::ExecutionFailed(err.to_string()))?;
                to_result(&calculation)
            }
        }
    }
}

fn to_result<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|err| ToolError::ExecutionFailed(err.to_string()))
}

struct ToolArguments<'a> {
    function: &'static str,
    fields: &'a Map<String, Value>,
}

impl<'a> ToolArguments<'a> {
    fn new(kind: ToolKind, arguments: &'a Value) -> Result<Self, ToolError> {
        let function = kind.function_name();
        let fields = arguments.as_object().ok_or_else(|| {
            ToolError::InvalidArguments(format!(
                "arguments for {function} tool must be a JSON object"
            ))
        })?;
        Ok(Self { function, fields })
    }

    fn present(&self, name: &str) -> Option<&'a Value> {
        self.fields.get(name).filter(|value| !value.is_null())
    }

    fn required_str(&self, name: &str) -> Result<&'a str, ToolError> {
        match self.present(name) {
            None => Err(self.missing(name)),
            Some(Value::String(value)) if !value.trim().is_empty() => Ok(value.as_str()),
            Some(Value::String(_)) => Err(self.missing(name)),
            Some(_) => Err(self.invalid(name, "a string")),
        }
    }

    fn required_number(&self, name: &str) -> Result<f64, ToolError> {
        match self.present(name) {
            None => Err(self.missing(name)),
            Some(value) => value.as_f64().ok_or_else(|| self.invalid(name, "a number")),
        }
    }

    fn optional_choice(
        &self,
        name: &str,
        allowed: &[&'static str],
        default: &'static str,
    ) -> Result<&'a str, ToolError> {
        let value = match self.present(name) {
            None => return Ok(default),
            Some(Value::String(value)) => value.as_str(),
            Some(_) => return Err(self.invalid(name, "a string")),
        };

        if allowed.iter().any(|candidate| *candidate == value) {
            Ok(value)
        } else {
            Err(ToolError::InvalidArguments(format!(
                "{name} must be one of: {} for {} tool",
                allowed.join(", "),
                self.function
            )))
        }
    }

    fn missing(&self, name: &str) -> ToolError {
        ToolError::InvalidArguments(format!("{name} is required for {} tool", self.function))
    }

    fn invalid(&self, name: &str, expected: &str) -> ToolError {
        ToolError::InvalidArguments(format!(
            "{name} must be {expected} for {} tool",
            self.function
        ))
    }
}

pub fn build_tools_list() -> Vec<Tool> {
    ToolKind::ALL.into_iter().map(ToolKind::definition).collect()
}
