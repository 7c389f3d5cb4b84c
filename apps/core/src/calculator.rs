use crate::clipboard_backend::SharedClipboard;
use crate::model::{ResultItem, TAG_CALCULATOR};
use crate::provider::{Provider, ProviderError};

const SIGNIFICANT_DIGITS: i32 = 10;

/// The only characters an expression may contain.
pub fn is_candidate_expression(query: &str) -> bool {
    if query.trim().is_empty() {
        return false;
    }
    let allowed = query
        .chars()
        .all(|c| c.is_ascii_digit() || c.is_whitespace() || "+-*/().".contains(c));
    let has_digit = query.chars().any(|c| c.is_ascii_digit());
    let has_operator = query.chars().any(|c| "+-*/".contains(c));
    allowed && has_digit && has_operator
}

pub trait ExpressionEvaluator: Send {
    /// A finite value, or `None` for anything that does not evaluate.
    fn evaluate(&self, expression: &str) -> Option<f64>;
}

/// Recursive descent over `+ - * /`, parentheses, and unary signs.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArithmeticEvaluator;

impl ExpressionEvaluator for ArithmeticEvaluator {
    fn evaluate(&self, expression: &str) -> Option<f64> {
        let tokens = tokenize(expression)?;
        let mut parser = Parser { tokens, pos: 0 };
        let value = parser.expression()?;
        if parser.pos != parser.tokens.len() || !value.is_finite() {
            return None;
        }
        Some(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Op(char),
    Open,
    Close,
}

fn tokenize(input: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '(' => tokens.push(Token::Open),
            ')' => tokens.push(Token::Close),
            '+' | '-' | '*' | '/' => tokens.push(Token::Op(c)),
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = start + c.len_utf8();
                while let Some(&(i, next)) = chars.peek() {
                    if !(next.is_ascii_digit() || next == '.') {
                        break;
                    }
                    end = i + next.len_utf8();
                    chars.next();
                }
                tokens.push(Token::Number(input[start..end].parse().ok()?));
            }
            _ => return None,
        }
    }
    Some(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn expression(&mut self) -> Option<f64> {
        let mut value = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Some(value)
    }

    fn term(&mut self) -> Option<f64> {
        let mut value = self.factor()?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek() {
            self.pos += 1;
            let rhs = self.factor()?;
            if op == '*' {
                value *= rhs;
            } else {
                if rhs == 0.0 {
                    return None;
                }
                value /= rhs;
            }
        }
        Some(value)
    }

    fn factor(&mut self) -> Option<f64> {
        match self.peek()? {
            Token::Op('-') => {
                self.pos += 1;
                Some(-self.factor()?)
            }
            Token::Op('+') => {
                self.pos += 1;
                self.factor()
            }
            Token::Number(value) => {
                self.pos += 1;
                Some(value)
            }
            Token::Open => {
                self.pos += 1;
                let value = self.expression()?;
                if self.peek()? != Token::Close {
                    return None;
                }
                self.pos += 1;
                Some(value)
            }
            _ => None,
        }
    }
}

/// Shortest form with at most ten significant digits, switching to an
/// exponent for very large or very small magnitudes.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    // The exponent is taken after rounding, so 9999999999.9 counts as 1e+10.
    let scientific = format!("{:.*e}", (SIGNIFICANT_DIGITS - 1) as usize, value);
    let Some((mantissa, exp)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exp.parse().unwrap_or(0);
    if exponent < -5 || exponent >= SIGNIFICANT_DIGITS {
        let mantissa = strip_fraction_zeros(mantissa);
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{:02}", exponent.abs());
    }

    let decimals = (SIGNIFICANT_DIGITS - 1 - exponent).max(0) as usize;
    strip_fraction_zeros(&format!("{value:.decimals$}"))
}

fn strip_fraction_zeros(number: &str) -> String {
    if !number.contains('.') {
        return number.to_string();
    }
    number
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

pub struct CalculatorProvider {
    evaluator: Box<dyn ExpressionEvaluator>,
    clipboard: SharedClipboard,
}

impl CalculatorProvider {
    pub fn new(clipboard: SharedClipboard) -> Self {
        Self::with_evaluator(Box::new(ArithmeticEvaluator), clipboard)
    }

    pub fn with_evaluator(
        evaluator: Box<dyn ExpressionEvaluator>,
        clipboard: SharedClipboard,
    ) -> Self {
        Self {
            evaluator,
            clipboard,
        }
    }
}

impl Provider for CalculatorProvider {
    fn name(&self) -> &str {
        "Calculator"
    }

    fn icon(&self) -> &str {
        "accessories-calculator"
    }

    fn search(&mut self, query: &str) -> Result<Vec<ResultItem>, ProviderError> {
        if !is_candidate_expression(query) {
            return Ok(Vec::new());
        }
        let Some(value) = self.evaluator.evaluate(query) else {
            return Ok(Vec::new());
        };
        let result = format_number(value);
        Ok(vec![ResultItem::new(
            &result,
            "Press Enter to copy to clipboard",
            "accessories-calculator",
            &result,
            TAG_CALCULATOR,
        )])
    }

    fn execute(&mut self, item: &ResultItem) -> Result<(), ProviderError> {
        self.clipboard
            .write_text(&item.payload)
            .map_err(|error| ProviderError::Clipboard(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{format_number, is_candidate_expression, ArithmeticEvaluator, ExpressionEvaluator};

    fn eval(expr: &str) -> Option<f64> {
        ArithmeticEvaluator.evaluate(expr)
    }

    #[test]
    fn gate_needs_digit_and_operator() {
        assert!(is_candidate_expression("2 + 2"));
        assert!(is_candidate_expression("(1.5*4)"));
        assert!(!is_candidate_expression("42"));
        assert!(!is_candidate_expression("firefox"));
        assert!(!is_candidate_expression("2 ^ 3"));
        assert!(!is_candidate_expression("   "));
    }

    #[test]
    fn precedence_and_grouping() {
        assert_eq!(eval("2 + 3 * 4"), Some(14.0));
        assert_eq!(eval("(2 + 3) * 4"), Some(20.0));
        assert_eq!(eval("10 - 4 - 3"), Some(3.0));
        assert_eq!(eval("-3 * -2"), Some(6.0));
        assert_eq!(eval("8 / 2 / 2"), Some(2.0));
    }

    #[test]
    fn malformed_or_undefined_expressions_have_no_result() {
        assert_eq!(eval("1 / 0"), None);
        assert_eq!(eval("(1 + 2"), None);
        assert_eq!(eval("1 +"), None);
        assert_eq!(eval("1..2 + 1"), None);
        assert_eq!(eval("2 3"), None);
    }

    #[test]
    fn numbers_format_with_ten_significant_digits() {
        assert_eq!(format_number(4.0), "4");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(1.0 / 3.0), "0.3333333333");
        assert_eq!(format_number(-2.25), "-2.25");
        assert_eq!(format_number(1e12), "1e+12");
        assert_eq!(format_number(123456789.0), "123456789");
    }

    #[test]
    fn rounding_into_an_extra_digit_switches_to_exponent_form() {
        assert_eq!(format_number(9999999999.9), "1e+10");
        assert_eq!(format_number(9999999999.0), "9999999999");
        assert_eq!(format_number(0.000099999999999), "0.0001");
        assert_eq!(format_number(-9999999999.96), "-1e+10");
    }
}
