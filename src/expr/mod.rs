//! Formula evaluation for parameter scalars and implicit shapes.
//!
//! Formulas are parsed once against an ordered list of variable names and then
//! evaluated repeatedly with positional values. Parsing is handled by `meval`;
//! comparison and logical operators are lowered to function calls first because
//! `meval` has no boolean operators of its own. Division and remainder are routed
//! through checked functions so a zero divisor is reported instead of inferred.
//!
//! Domain errors (square root of a negative number, logarithm of a non-positive
//! number, ...) never abort an evaluation. They are reported next to the value in
//! [`Evaluation`] with the numbered codes used by the persisted documents.

mod bessel;

use std::cell::Cell;
use std::collections::HashMap;

use meval::shunting_yard::to_rpn;
use meval::tokenizer::{Operation, Token, tokenize};
use meval::{Context, ContextProvider, Expr};

/// Failure while parsing a formula. Each variant maps to a fixed numeric code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyntaxError {
    #[error("syntax error")]
    Syntax,
    #[error("mismatched parenthesis")]
    MismatchedParenthesis,
    #[error("missing ')'")]
    MissingParenthesis,
    #[error("operator expected")]
    OperatorExpected,
    #[error("syntax error in parameters")]
    ParameterSyntax,
    #[error("illegal number of parameters to function `{0}`")]
    ArgumentCount(String),
    #[error("premature end of string")]
    PrematureEnd,
    #[error("unknown variable `{0}`")]
    UnknownVariable(String),
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
}

impl SyntaxError {
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::Syntax => 100,
            Self::MismatchedParenthesis => 101,
            Self::MissingParenthesis => 102,
            Self::OperatorExpected => 104,
            Self::ParameterSyntax => 107,
            Self::ArgumentCount(_) => 108,
            Self::PrematureEnd => 109,
            Self::UnknownVariable(_) => 111,
            Self::UnknownFunction(_) => 112,
        }
    }
}

/// Runtime failure reported alongside an evaluated value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("sqrt error (sqrt of a negative value)")]
    Sqrt,
    #[error("log error (logarithm of a non-positive value)")]
    Log,
    #[error("trigonometric error (asin or acos of an illegal value)")]
    Trigonometric,
    #[error("bessel function domain error")]
    Bessel,
}

impl EvalError {
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::DivisionByZero => 1,
            Self::Sqrt => 2,
            Self::Log => 3,
            Self::Trigonometric => 4,
            Self::Bessel => 6,
        }
    }
}

/// Either failure of the evaluator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExprError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl ExprError {
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::Syntax(error) => error.code(),
            Self::Eval(error) => error.code(),
        }
    }
}

/// Result of one evaluation: the value is always produced, the error is optional.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub value: f64,
    pub error: Option<EvalError>,
}

impl Evaluation {
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Converts into a `Result`, dropping the value on error.
    pub fn into_result(self) -> Result<f64, EvalError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.value),
        }
    }
}

/// A parsed formula bound to an ordered variable list.
#[derive(Debug, Clone)]
pub struct FunctionParser {
    source: String,
    variables: Vec<String>,
    lookup: HashMap<String, usize>,
    expr: Expr,
}

impl FunctionParser {
    /// Parses `formula` with `variables` as the positional variable names.
    ///
    /// Unknown identifiers and wrong argument counts are rejected here, so a
    /// successfully parsed formula can only fail at runtime with an [`EvalError`].
    pub fn parse<S: AsRef<str>>(formula: &str, variables: &[S]) -> Result<Self, SyntaxError> {
        let lowered = guard_division(&lower_operators(formula)?)?;
        let expr: Expr = lowered.parse().map_err(syntax_from_meval)?;

        let variables: Vec<String> = variables.iter().map(|name| name.as_ref().to_owned()).collect();
        let mut lookup = HashMap::with_capacity(variables.len());
        for (index, name) in variables.iter().enumerate() {
            lookup.entry(name.clone()).or_insert(index);
        }

        let parser = Self {
            source: formula.to_owned(),
            variables,
            lookup,
            expr,
        };

        // bind every identifier once; numeric faults are irrelevant here
        let zeros = vec![0.0; parser.variables.len()];
        let bound = parser.run(&zeros);
        DOMAIN_FAULT.with(|fault| fault.set(None));
        bound.map_err(syntax_from_meval)?;

        Ok(parser)
    }

    /// Evaluates with `values` bound positionally to the variable list.
    #[must_use]
    pub fn eval(&self, values: &[f64]) -> Evaluation {
        DOMAIN_FAULT.with(|fault| fault.set(None));
        let value = self.run(values).unwrap_or(f64::NAN);
        let error = DOMAIN_FAULT.with(Cell::take);
        Evaluation { value, error }
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    fn run(&self, values: &[f64]) -> Result<f64, meval::Error> {
        let bindings = Bindings {
            lookup: &self.lookup,
            values,
        };
        CONTEXT.with(|context| self.expr.eval_with_context((&bindings, context)))
    }
}

impl PartialEq for FunctionParser {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.variables == other.variables
    }
}

/// Parses and evaluates a formula in one step.
pub fn evaluate<S: AsRef<str>>(
    formula: &str,
    variables: &[S],
    values: &[f64],
) -> Result<f64, ExprError> {
    let parser = FunctionParser::parse(formula, variables)?;
    Ok(parser.eval(values).into_result()?)
}

struct Bindings<'a> {
    lookup: &'a HashMap<String, usize>,
    values: &'a [f64],
}

impl ContextProvider for Bindings<'_> {
    fn get_var(&self, name: &str) -> Option<f64> {
        self.lookup
            .get(name)
            .and_then(|&index| self.values.get(index))
            .copied()
    }
}

fn syntax_from_meval(error: meval::Error) -> SyntaxError {
    use meval::{Error, FuncEvalError, ParseError, RPNError};

    match error {
        Error::ParseError(ParseError::MissingRParen { .. }) => SyntaxError::MissingParenthesis,
        Error::ParseError(ParseError::MissingArgument { .. }) => SyntaxError::PrematureEnd,
        Error::RPNError(RPNError::MismatchedLParen { .. } | RPNError::MismatchedRParen { .. }) => {
            SyntaxError::MismatchedParenthesis
        }
        Error::RPNError(RPNError::UnexpectedComma { .. }) => SyntaxError::ParameterSyntax,
        Error::RPNError(_) => SyntaxError::OperatorExpected,
        Error::UnknownVariable(name) => SyntaxError::UnknownVariable(name),
        Error::Function(name, FuncEvalError::UnknownFunction { .. }) => {
            SyntaxError::UnknownFunction(name)
        }
        Error::Function(name, _) => SyntaxError::ArgumentCount(name),
        _ => SyntaxError::Syntax,
    }
}

// --- Evaluation context --------------------------------------------------------

thread_local! {
    static DOMAIN_FAULT: Cell<Option<EvalError>> = const { Cell::new(None) };
    static CONTEXT: Context<'static> = build_context();
}

fn raise(error: EvalError) -> f64 {
    DOMAIN_FAULT.with(|fault| {
        if fault.get().is_none() {
            fault.set(Some(error));
        }
    });
    f64::NAN
}

fn build_context() -> Context<'static> {
    let mut context = Context::new();

    context.func("sqrt", |x| if x < 0.0 { raise(EvalError::Sqrt) } else { x.sqrt() });
    context.func("ln", checked_ln);
    context.func("log", checked_ln);
    context.func("log10", |x| checked_ln(x) / std::f64::consts::LN_10);
    context.func("log2", |x| checked_ln(x) / std::f64::consts::LN_2);
    context.func("asin", |x| {
        if (-1.0..=1.0).contains(&x) { x.asin() } else { raise(EvalError::Trigonometric) }
    });
    context.func("acos", |x| {
        if (-1.0..=1.0).contains(&x) { x.acos() } else { raise(EvalError::Trigonometric) }
    });
    context.func2("pow", f64::powf);
    context.func2("hypot", f64::hypot);
    context.func("int", f64::round);
    context.func("deg", f64::to_degrees);
    context.func("rad", f64::to_radians);
    context.func("sign", f64::signum);
    context.func("sec", |x| 1.0 / x.cos());
    context.func("csc", |x| 1.0 / x.sin());
    context.func("cot", |x| 1.0 / x.tan());
    context.func3("clamp", clamp);
    context.func2("mod", modulo);
    context.func2("div", |a, b| if b == 0.0 { raise(EvalError::DivisionByZero) } else { a / b });
    context.func2("rem", |a, b| if b == 0.0 { raise(EvalError::DivisionByZero) } else { a % b });

    context.func2("and", |a, b| truth(is_true(a) && is_true(b)));
    context.func2("or", |a, b| truth(is_true(a) || is_true(b)));
    context.func2("xor", |a, b| truth(is_true(a) ^ is_true(b)));
    context.func("not", |x| truth(!is_true(x)));
    context.funcn("if", conditional, 2..4);
    context.func2("lt", |a, b| truth(a < b));
    context.func2("le", |a, b| truth(a <= b));
    context.func2("gt", |a, b| truth(a > b));
    context.func2("ge", |a, b| truth(a >= b));
    context.func2("eq", |a, b| truth(equal(a, b)));
    context.func2("ne", |a, b| truth(!equal(a, b)));

    context.func("j0", bessel::j0);
    context.func("j1", bessel::j1);
    context.func2("jn", |n, x| bessel::jn(order(n), x).unwrap_or_else(|| raise(EvalError::Bessel)));
    context.func("y0", |x| bessel::y0(x).unwrap_or_else(|| raise(EvalError::Bessel)));
    context.func("y1", |x| bessel::y1(x).unwrap_or_else(|| raise(EvalError::Bessel)));
    context.func2("yn", |n, x| bessel::yn(order(n), x).unwrap_or_else(|| raise(EvalError::Bessel)));

    context
}

fn checked_ln(x: f64) -> f64 {
    if x <= 0.0 { raise(EvalError::Log) } else { x.ln() }
}

#[allow(clippy::cast_possible_truncation)]
fn order(n: f64) -> i64 {
    n.round() as i64
}

#[allow(clippy::float_cmp)]
fn equal(a: f64, b: f64) -> bool {
    a == b
}

fn is_true(value: f64) -> bool {
    value != 0.0
}

fn truth(state: bool) -> f64 {
    if state { 1.0 } else { 0.0 }
}

fn clamp(value: f64, min: f64, max: f64) -> f64 {
    let lower = min.min(max);
    let upper = min.max(max);
    if value <= lower {
        lower
    } else if value >= upper {
        upper
    } else {
        value
    }
}

fn modulo(dividend: f64, divisor: f64) -> f64 {
    if divisor == 0.0 {
        return raise(EvalError::DivisionByZero);
    }
    let remainder = dividend % divisor;
    if remainder != 0.0 && (remainder < 0.0) != (divisor < 0.0) {
        remainder + divisor
    } else {
        remainder
    }
}

fn conditional(args: &[f64]) -> f64 {
    let truthy = args[1];
    let falsy = args.get(2).copied().unwrap_or(truthy);
    if is_true(args[0]) { truthy } else { falsy }
}

// --- Operator lowering ---------------------------------------------------------

const LOGICAL_CHARS: [char; 6] = ['<', '>', '=', '!', '&', '|'];

/// Binary operator levels, loosest binding first.
const LEVELS: [&[(&str, &str)]; 3] = [
    &[("||", "or"), ("|", "or")],
    &[("&&", "and"), ("&", "and")],
    &[
        ("<=", "le"),
        (">=", "ge"),
        ("!=", "ne"),
        ("<>", "ne"),
        ("==", "eq"),
        ("=", "eq"),
        ("<", "lt"),
        (">", "gt"),
    ],
];

/// Rewrites comparison and logical operators into calls of the context functions.
fn lower_operators(formula: &str) -> Result<String, SyntaxError> {
    let trimmed = formula.trim();
    if trimmed.is_empty() {
        return Err(SyntaxError::PrematureEnd);
    }

    let mut depth = 0_i32;
    for ch in trimmed.chars() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(SyntaxError::MismatchedParenthesis);
                }
            }
            _ => {}
        }
    }
    if depth > 0 {
        return Err(SyntaxError::MissingParenthesis);
    }

    if !trimmed.contains(LOGICAL_CHARS) {
        return Ok(trimmed.to_owned());
    }
    lower_expr(trimmed)
}

fn lower_expr(source: &str) -> Result<String, SyntaxError> {
    let source = source.trim();
    if source.is_empty() {
        return Err(SyntaxError::PrematureEnd);
    }

    for level in LEVELS {
        if let Some((start, len, func)) = last_operator(source, level) {
            let left = &source[..start];
            let right = &source[start + len..];
            if left.trim().is_empty() {
                return Err(SyntaxError::Syntax);
            }
            return Ok(format!("{func}({},{})", lower_expr(left)?, lower_expr(right)?));
        }
    }

    if let Some(rest) = source.strip_prefix('!') {
        return Ok(format!("not({})", lower_expr(rest)?));
    }

    lower_groups(source)
}

/// Finds the right-most operator of `level` outside parentheses.
fn last_operator(
    source: &str,
    level: &[(&str, &'static str)],
) -> Option<(usize, usize, &'static str)> {
    let mut depth = 0_i32;
    let mut found = None;
    let mut index = 0;
    while index < source.len() {
        let rest = &source[index..];
        let step = rest.chars().next().map_or(1, char::len_utf8);
        match rest.as_bytes()[0] {
            b'(' => depth += 1,
            b')' => depth -= 1,
            _ if depth == 0 => {
                if let Some((op, func)) = level.iter().find(|(op, _)| rest.starts_with(op)) {
                    found = Some((index, op.len(), *func));
                    index += op.len();
                    continue;
                }
                // keep two-character operators of other levels in one piece
                if let Some(op) = ["<=", ">=", "!=", "<>", "==", "||", "&&"]
                    .iter()
                    .find(|op| rest.starts_with(**op))
                {
                    index += op.len();
                    continue;
                }
            }
            _ => {}
        }
        index += step;
    }
    found
}

/// Lowers the contents of every parenthesized group, argument by argument.
fn lower_groups(source: &str) -> Result<String, SyntaxError> {
    let mut out = String::with_capacity(source.len() + 8);
    let mut chars = source.char_indices();
    while let Some((start, ch)) = chars.next() {
        if ch != '(' {
            out.push(ch);
            continue;
        }
        let mut depth = 1;
        let mut end = start;
        for (index, inner) in chars.by_ref() {
            match inner {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        end = index;
                        break;
                    }
                }
                _ => {}
            }
        }
        if depth != 0 {
            return Err(SyntaxError::MissingParenthesis);
        }

        let inner = &source[start + 1..end];
        out.push('(');
        if !inner.trim().is_empty() {
            let args = split_arguments(inner)
                .into_iter()
                .map(lower_expr)
                .collect::<Result<Vec<_>, _>>()?;
            out.push_str(&args.join(","));
        }
        out.push(')');
    }
    Ok(out)
}

/// Rebuilds `source` from its RPN form with `/` and `%` replaced by `div` and `rem`.
fn guard_division(source: &str) -> Result<String, SyntaxError> {
    if !source.contains(['/', '%']) {
        return Ok(source.to_owned());
    }
    let tokens = tokenize(source).map_err(|error| syntax_from_meval(error.into()))?;
    let rpn = to_rpn(&tokens).map_err(|error| syntax_from_meval(error.into()))?;

    let mut stack: Vec<String> = Vec::with_capacity(rpn.len());
    for token in rpn {
        let text = match token {
            Token::Number(value) => format!("{value}"),
            Token::Var(name) => name,
            Token::Unary(op) => {
                let operand = stack.pop().ok_or(SyntaxError::OperatorExpected)?;
                match op {
                    Operation::Minus => format!("(-{operand})"),
                    _ => operand,
                }
            }
            Token::Binary(op) => {
                let right = stack.pop().ok_or(SyntaxError::OperatorExpected)?;
                let left = stack.pop().ok_or(SyntaxError::OperatorExpected)?;
                match op {
                    Operation::Plus => format!("({left}+{right})"),
                    Operation::Minus => format!("({left}-{right})"),
                    Operation::Times => format!("({left}*{right})"),
                    Operation::Pow => format!("({left}^{right})"),
                    Operation::Div => format!("div({left},{right})"),
                    Operation::Rem => format!("rem({left},{right})"),
                }
            }
            Token::Func(name, arity) => {
                let count = arity.unwrap_or(0);
                if stack.len() < count {
                    return Err(SyntaxError::ArgumentCount(name));
                }
                let args = stack.split_off(stack.len() - count);
                format!("{name}({})", args.join(","))
            }
            Token::LParen | Token::RParen | Token::Comma => return Err(SyntaxError::Syntax),
        };
        stack.push(text);
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(text), true) => Ok(text),
        _ => Err(SyntaxError::OperatorExpected),
    }
}

fn split_arguments(source: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0_i32;
    let mut begin = 0;
    for (index, ch) in source.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&source[begin..index]);
                begin = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&source[begin..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: [&str; 0] = [];

    #[test]
    fn evaluates_arithmetic_with_variables() {
        let parser = FunctionParser::parse("a*2 + b^2", &["a", "b"]).expect("parse");
        let eval = parser.eval(&[3.0, 4.0]);
        assert!(eval.is_ok());
        assert!((eval.value - 22.0).abs() < 1e-9);
        assert_eq!(parser.variables(), ["a".to_owned(), "b".to_owned()]);
        assert_eq!(parser.source(), "a*2 + b^2");
    }

    #[test]
    fn constants_and_functions() {
        let value = evaluate("cos(pi) + ln(e) + pow(2,3) + log10(100)", &NONE, &[])
            .expect("evaluate");
        assert!((value - 10.0).abs() < 1e-9);
    }

    #[test]
    fn comparisons_and_logic_yield_zero_or_one() {
        let vars = ["x", "y"];
        let inside = FunctionParser::parse("(x*x + y*y < 4) & !(x > 1.5)", &vars).expect("parse");
        assert!((inside.eval(&[1.0, 1.0]).value - 1.0).abs() < 1e-12);
        assert!(inside.eval(&[1.8, 0.0]).value.abs() < 1e-12);
        assert!(inside.eval(&[3.0, 0.0]).value.abs() < 1e-12);

        let either = FunctionParser::parse("x<=0 | y>=2", &vars).expect("parse");
        assert!((either.eval(&[0.0, 0.0]).value - 1.0).abs() < 1e-12);
        assert!((either.eval(&[1.0, 2.0]).value - 1.0).abs() < 1e-12);
        assert!(either.eval(&[1.0, 1.0]).value.abs() < 1e-12);

        let equal = FunctionParser::parse("if(x = y, 7, x != y)", &vars).expect("parse");
        assert!((equal.eval(&[2.0, 2.0]).value - 7.0).abs() < 1e-12);
        assert!((equal.eval(&[2.0, 3.0]).value - 1.0).abs() < 1e-12);
    }

    #[test]
    fn runtime_errors_carry_codes() {
        let sqrt = evaluate("sqrt(-1)", &NONE, &[]).unwrap_err();
        assert_eq!(sqrt.code(), 2);
        assert_eq!(evaluate("ln(0)", &NONE, &[]).unwrap_err().code(), 3);
        assert_eq!(evaluate("asin(2)", &NONE, &[]).unwrap_err().code(), 4);
        assert_eq!(evaluate("y0(-1)", &NONE, &[]).unwrap_err().code(), 6);
        assert_eq!(evaluate("jn(-2, 1)", &NONE, &[]).unwrap_err().code(), 6);
        assert_eq!(evaluate("1/0", &NONE, &[]).unwrap_err().code(), 1);
        assert_eq!(evaluate("5 % (2-2)", &NONE, &[]).unwrap_err().code(), 1);
    }

    #[test]
    fn overflow_is_not_a_division_error() {
        let huge = FunctionParser::parse("exp(x)", &["x"]).expect("parse").eval(&[1000.0]);
        assert_eq!(huge.error, None);
        assert!(huge.value.is_infinite());

        let tiny = FunctionParser::parse("1/x", &["x"]).expect("parse");
        assert_eq!(tiny.eval(&[1e-320]).error, None);
        assert_eq!(tiny.eval(&[0.0]).error, Some(EvalError::DivisionByZero));
    }

    #[test]
    fn division_keeps_operator_precedence() {
        let vars = ["a", "b", "c"];
        let value = |formula: &str| {
            FunctionParser::parse(formula, &vars)
                .expect("parse")
                .eval(&[6.0, 3.0, 2.0])
                .into_result()
                .expect("eval")
        };
        assert!((value("a/b*c") - 4.0).abs() < 1e-12);
        assert!((value("a/(b*c)") - 1.0).abs() < 1e-12);
        assert!((value("-a/2 + 1") + 2.0).abs() < 1e-12);
        assert!((value("c^3/4") - 2.0).abs() < 1e-12);
        assert!((value("-c^2/a") + 4.0 / 6.0).abs() < 1e-12);
        assert!((value("7 % b + 0.25/c") - 1.125).abs() < 1e-12);
        assert!((value("if(a > b, a/b, 0)") - 2.0).abs() < 1e-12);
        assert!((value("hypot(a, b*c/1.5)/10") - (36.0_f64 + 16.0).sqrt() / 10.0).abs() < 1e-12);
    }

    #[test]
    fn runtime_error_keeps_the_value() {
        let parser = FunctionParser::parse("sqrt(x)", &["x"]).expect("parse");
        let bad = parser.eval(&[-4.0]);
        assert_eq!(bad.error, Some(EvalError::Sqrt));
        let good = parser.eval(&[4.0]);
        assert_eq!(good.error, None);
        assert!((good.value - 2.0).abs() < 1e-12);
    }

    #[test]
    fn syntax_errors_carry_codes() {
        let code = |formula: &str| {
            FunctionParser::parse(formula, &["a"])
                .map(|_| 0)
                .unwrap_or_else(|error| error.code())
        };
        assert_eq!(code("(a+1"), 102);
        assert_eq!(code("a+1)"), 101);
        assert_eq!(code("b+1"), 111);
        assert_eq!(code("foo(a)"), 112);
        assert_eq!(code("pow(a)"), 108);
        assert_eq!(code(""), 109);
        assert_eq!(code("a+1"), 0);
    }

    #[test]
    fn bessel_functions_are_available() {
        let value = evaluate("j0(0) + jn(2, 0)", &NONE, &[]).expect("evaluate");
        assert!((value - 1.0).abs() < 1e-9);
    }
}
