//! Four-function calculator backing the `calculate` tool

use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalculationError {
    #[error("Division by zero is not allowed")]
    DivisionByZero,
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    pub const NAMES: [&'static str; 4] = ["add", "subtract", "multiply", "divide"];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "×",
            Self::Divide => "÷",
        }
    }

    /// Maps an infix symbol as typed by a user onto an operation.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "+" => Some(Self::Add),
            "-" => Some(Self::Subtract),
            "*" | "×" => Some(Self::Multiply),
            "/" | "÷" => Some(Self::Divide),
            _ => None,
        }
    }

    pub fn apply(self, a: f64, b: f64) -> Result<f64, CalculationError> {
        match self {
            Self::Add => Ok(a + b),
            Self::Subtract => Ok(a - b),
            Self::Multiply => Ok(a * b),
            Self::Divide if b == 0.0 => Err(CalculationError::DivisionByZero),
            Self::Divide => Ok(a / b),
        }
    }
}

impl FromStr for Operation {
    type Err = CalculationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "add" => Ok(Self::Add),
            "subtract" => Ok(Self::Subtract),
            "multiply" => Ok(Self::Multiply),
            "divide" => Ok(Self::Divide),
            _ => Err(CalculationError::UnsupportedOperation(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Calculation {
    pub operation: String,
    pub operand1: f64,
    pub operand2: f64,
    pub result: f64,
    pub expression: String,
}

pub fn calculate(operation: &str, a: f64, b: f64) -> Result<Calculation, CalculationError> {
    info!(a, operation = %operation, b, "performing calculation");

    let parsed = operation.parse::<Operation>()?;
    let result = parsed.apply(a, b)?;

    Ok(Calculation {
        operation: operation.to_string(),
        operand1: a,
        operand2: b,
        result,
        expression: format!(
            "{} {} {} = {}",
            format_number(a),
            parsed.symbol(),
            format_number(b),
            format_number(result)
        ),
    })
}

/// Renders a number with at least one fractional digit (`5` becomes `5.0`).
pub fn format_number(value: f64) -> String {
    format!("{value:?}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_two_numbers() {
        let calculation = calculate("add", 2.0, 3.0).expect("add succeeds");
        assert_eq!(calculation.result, 5.0);
        assert_eq!(calculation.expression, "2.0 + 3.0 = 5.0");
    }

    #[test]
    fn operation_names_are_case_insensitive() {
        let calculation = calculate("MULTIPLY", 4.0, 2.5).expect("multiply succeeds");
        assert_eq!(calculation.result, 10.0);
        assert_eq!(calculation.operation, "MULTIPLY");
        assert_eq!(calculation.expression, "4.0 × 2.5 = 10.0");
    }

    #[test]
    fn divide_by_zero_is_rejected() {
        let error = calculate("divide", 1.0, 0.0).expect_err("division by zero");
        assert_eq!(error, CalculationError::DivisionByZero);
        assert_eq!(error.to_string(), "Division by zero is not allowed");
    }

    #[test]
    fn unknown_operation_is_rejected() {
        let error = calculate("modulo", 1.0, 2.0).expect_err("unsupported");
        assert_eq!(
            error,
            CalculationError::UnsupportedOperation("modulo".to_string())
        );
    }

    #[test]
    fn symbols_map_to_operations() {
        assert_eq!(Operation::from_symbol("÷"), Some(Operation::Divide));
        assert_eq!(Operation::from_symbol("*"), Some(Operation::Multiply));
        assert_eq!(Operation::from_symbol("%"), None);
    }
}
