//! Calculator tool: evaluates arithmetic formulas.
//!
//! Grammar:
//!
//! ```text
//! formula = term (('+' | '-') term)*
//! term    = factor (('*' | '/') factor)*
//! factor  = ('+' | '-')* (NUMBER | '(' formula ')')
//! ```

use async_trait::async_trait;
use fnagent_core::error::ToolError;
use fnagent_core::message::{AiMessage, FunctionCall, Message};
use fnagent_core::tool::{Tool, ToolArgs};
use tracing::debug;

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic formula. Supports +, -, *, /, parentheses, and decimal numbers."
    }

    fn parameters_schema(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "type": "object",
            "properties": {
                "math_formula": {
                    "type": "string",
                    "description": "A standard arithmetic formula, e.g. \"2+3\", \"3 - 4 * 6\" or \"(3 + 4) * (6 + 4)\""
                }
            },
            "required": ["math_formula"]
        }))
    }

    fn responses_schema(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "type": "object",
            "properties": {
                "formula_result": {
                    "type": "number",
                    "description": "The value of the formula"
                }
            }
        }))
    }

    fn examples(&self) -> Vec<Message> {
        let mut examples = Vec::new();
        for (question, formula) in [
            ("What is three plus six?", "3+6"),
            ("What is one plus eight, times five?", "(1+8)*5"),
            ("What is twelve divided by four, plus five?", "12/4+5"),
        ] {
            examples.push(Message::human(question));
            examples.push(
                AiMessage::new("")
                    .with_function_call(FunctionCall::new(
                        self.name(),
                        serde_json::json!({ "math_formula": formula }).to_string(),
                    ))
                    .into(),
            );
        }
        examples
    }

    async fn call(&self, arguments: ToolArgs) -> Result<serde_json::Value, ToolError> {
        let formula = arguments
            .get("math_formula")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'math_formula' argument".into()))?;

        let value = evaluate(formula).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().to_string(),
            reason: e.to_string(),
        })?;
        debug!(formula, value, "Evaluated formula");

        // Integral results are reported as JSON integers.
        let result = if value.fract() == 0.0 && value.abs() < 1e15 {
            serde_json::json!(value as i64)
        } else {
            serde_json::json!(value)
        };
        Ok(serde_json::json!({ "formula_result": result }))
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormulaError {
    #[error("unexpected character '{found}' at offset {offset}")]
    UnexpectedChar { found: char, offset: usize },

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("unexpected end of formula")]
    UnexpectedEnd,

    #[error("missing closing parenthesis")]
    UnclosedParen,

    #[error("division by zero")]
    DivisionByZero,

    #[error("parentheses nested deeper than {0} levels")]
    TooDeep(usize),
}

/// Maximum parenthesis nesting accepted by [`evaluate`].
pub const MAX_NESTING: usize = 256;

/// Evaluate an arithmetic formula.
pub fn evaluate(formula: &str) -> Result<f64, FormulaError> {
    let mut parser = FormulaParser { src: formula, offset: 0, depth: 0 };
    let value = parser.formula()?;
    parser.skip_whitespace();
    match parser.peek() {
        None => Ok(value),
        Some(found) => Err(FormulaError::UnexpectedChar { found, offset: parser.offset }),
    }
}

/// Recursive-descent evaluator reading directly from the source text.
struct FormulaParser<'a> {
    src: &'a str,
    offset: usize,
    depth: usize,
}

impl FormulaParser<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.offset..].chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.offset += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    /// Consume `op` if it is the next non-blank character.
    fn eat(&mut self, op: char) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(op) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn formula(&mut self) -> Result<f64, FormulaError> {
        let mut acc = self.term()?;
        loop {
            if self.eat('+') {
                acc += self.term()?;
            } else if self.eat('-') {
                acc -= self.term()?;
            } else {
                return Ok(acc);
            }
        }
    }

    fn term(&mut self) -> Result<f64, FormulaError> {
        let mut acc = self.factor()?;
        loop {
            if self.eat('*') {
                acc *= self.factor()?;
            } else if self.eat('/') {
                let divisor = self.factor()?;
                if divisor == 0.0 {
                    return Err(FormulaError::DivisionByZero);
                }
                acc /= divisor;
            } else {
                return Ok(acc);
            }
        }
    }

    fn factor(&mut self) -> Result<f64, FormulaError> {
        // Sign runs fold in place so their length never grows the stack.
        let mut negate = false;
        loop {
            if self.eat('-') {
                negate = !negate;
            } else if !self.eat('+') {
                break;
            }
        }
        let value = if self.eat('(') {
            if self.depth == MAX_NESTING {
                return Err(FormulaError::TooDeep(MAX_NESTING));
            }
            self.depth += 1;
            let inner = self.formula()?;
            self.depth -= 1;
            if !self.eat(')') {
                return Err(FormulaError::UnclosedParen);
            }
            inner
        } else {
            self.number()?
        };
        Ok(if negate { -value } else { value })
    }

    fn number(&mut self) -> Result<f64, FormulaError> {
        self.skip_whitespace();
        let start = self.offset;
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
            self.bump();
        }
        let literal = &self.src[start..self.offset];
        if literal.is_empty() {
            return match self.peek() {
                Some(found) => Err(FormulaError::UnexpectedChar { found, offset: self.offset }),
                None => Err(FormulaError::UnexpectedEnd),
            };
        }
        literal
            .parse()
            .map_err(|_| FormulaError::InvalidNumber(literal.to_string()))
    }
}
