//! Parser for numflow source and pattern text
//!
//! Operator chains are kept flat: precedence is resolved later by the
//! matcher, so `a + b * c` parses to one `Expression` with two operations.
//! Patterns use the same grammar; `_x`, `__xs` and `_x...` are ordinary
//! identifiers here and only become placeholders when matched.

use thiserror::Error;
use winnow::ascii::{digit1, multispace1, till_line_ending};
use winnow::combinator::{alt, delimited, not, opt, preceded, repeat, separated, terminated};
use winnow::prelude::*;
use winnow::token::{one_of, take_while};

use crate::ast::{
    Expression, FunctionCall, Identifier, Literal, Operand, Operation, Operator, PrimaryExpr,
    UnaryExpr,
};

type PResult<T> = winnow::ModalResult<T>;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} (line {line}, column {column}, offset {offset})")]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

/// Parse a single expression
pub fn parse(input: &str) -> Result<Expression, ParseError> {
    run_parser(input, |stream| delimited(ws, expression, ws).parse_next(stream))
}

/// Parse a sequence of statements, optionally separated by `;`
pub fn parse_program(input: &str) -> Result<Vec<Expression>, ParseError> {
    run_parser(input, program)
}

fn run_parser<T>(
    input: &str,
    mut parser: impl FnMut(&mut &str) -> PResult<T>,
) -> Result<T, ParseError> {
    let mut stream = input;
    match parser(&mut stream) {
        Ok(parsed) => {
            if stream.is_empty() {
                Ok(parsed)
            } else {
                let offset = trailing_input_offset(input, stream);
                Err(build_parse_error(
                    "unexpected trailing input".to_string(),
                    input,
                    offset,
                ))
            }
        }
        Err(e) => {
            let offset = input.len().saturating_sub(stream.len());
            Err(build_parse_error(format!("{e:?}"), input, offset))
        }
    }
}

fn build_parse_error(message: String, input: &str, offset: usize) -> ParseError {
    let (line, column) = offset_to_line_column(input, offset);
    ParseError {
        message,
        offset,
        line,
        column,
    }
}

fn offset_to_line_column(input: &str, offset: usize) -> (usize, usize) {
    let bounded = offset.min(input.len());
    let mut line = 1usize;
    let mut column = 1usize;

    for ch in input[..bounded].chars() {
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }

    (line, column)
}

fn trailing_input_offset(input: &str, trailing: &str) -> usize {
    let base = input.len().saturating_sub(trailing.len());
    let non_ws = trailing
        .char_indices()
        .find(|(_, ch)| !ch.is_whitespace())
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    base + non_ws
}

// ============ Statements ============

fn program(input: &mut &str) -> PResult<Vec<Expression>> {
    let statements = repeat(0.., delimited(ws, expression, (ws, opt(';')))).parse_next(input)?;
    ws.parse_next(input)?;
    Ok(statements)
}

// ============ Flat operator chains ============

fn expression(input: &mut &str) -> PResult<Expression> {
    let first = operand.parse_next(input)?;
    let rest: Vec<Operation> = repeat(
        0..,
        (ws, binary_op, ws, operand).map(|(_, op, _, operand)| Operation { op, operand }),
    )
    .parse_next(input)?;
    Ok(Expression { first, rest })
}

fn binary_op(input: &mut &str) -> PResult<Operator> {
    alt((
        "||".value(Operator::Or),
        "&&".value(Operator::And),
        "==".value(Operator::Eq),
        "!=".value(Operator::Ne),
        "<=".value(Operator::Le),
        ">=".value(Operator::Ge),
        "<".value(Operator::Lt),
        ">".value(Operator::Gt),
        "+".value(Operator::Add),
        "-".value(Operator::Sub),
        "*".value(Operator::Mul),
        "/".value(Operator::Div),
        "%".value(Operator::Mod),
        "^".value(Operator::Pow),
    ))
    .parse_next(input)
}

fn operand(input: &mut &str) -> PResult<Operand> {
    preceded(
        ws,
        alt((
            (unary_op, ws, operand).map(|(op, _, inner)| {
                Operand::Unary(UnaryExpr {
                    op,
                    operand: Box::new(inner),
                })
            }),
            primary.map(Operand::Primary),
        )),
    )
    .parse_next(input)
}

fn unary_op(input: &mut &str) -> PResult<Operator> {
    alt((
        '-'.value(Operator::Sub),
        terminated('!', not('=')).value(Operator::Not),
    ))
    .parse_next(input)
}

// ============ Primary expressions ============

fn primary(input: &mut &str) -> PResult<PrimaryExpr> {
    alt((
        paren_expr,
        literal.map(PrimaryExpr::Literal),
        call.map(PrimaryExpr::Call),
        identifier.map(PrimaryExpr::Identifier),
    ))
    .parse_next(input)
}

fn paren_expr(input: &mut &str) -> PResult<PrimaryExpr> {
    delimited(('(', ws), expression, (ws, ')'))
        .map(|e| PrimaryExpr::Paren(Box::new(e)))
        .parse_next(input)
}

fn call(input: &mut &str) -> PResult<FunctionCall> {
    (
        identifier,
        delimited(
            ('(', ws),
            opt(terminated(
                separated(1.., expression, (ws, ',', ws)),
                opt((ws, ',')), // trailing comma
            )),
            (ws, ')'),
        ),
    )
        .map(|(name, args): (Identifier, Option<Vec<Expression>>)| FunctionCall {
            name,
            args: args.unwrap_or_default(),
        })
        .parse_next(input)
}

// ============ Identifiers ============

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn identifier(input: &mut &str) -> PResult<Identifier> {
    let name = (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., is_ident_char),
    )
        .take()
        .parse_next(input)?;

    let mut result = name.to_string();
    // `_rest...` is the trailing-dots spelling of an ellipsis placeholder
    if name.starts_with('_') && opt("...").parse_next(input)?.is_some() {
        result.push_str("...");
    }
    Ok(Identifier::new(result))
}

// ============ Literals ============

fn literal(input: &mut &str) -> PResult<Literal> {
    alt((
        keyword("true").value(Literal::Bool(true)),
        keyword("false").value(Literal::Bool(false)),
        float_lit,
        int_lit,
        string_lit,
    ))
    .parse_next(input)
}

fn keyword<'a>(word: &'static str) -> impl Parser<&'a str, &'a str, winnow::error::ErrMode<winnow::error::ContextError>> {
    terminated(word, not(one_of(is_ident_char)))
}

fn int_lit(input: &mut &str) -> PResult<Literal> {
    digit1
        .try_map(|s: &str| s.parse::<i64>())
        .map(Literal::Int)
        .parse_next(input)
}

fn float_lit(input: &mut &str) -> PResult<Literal> {
    (
        digit1,
        alt((('.', digit1, opt(exponent)).void(), exponent.void())),
    )
        .take()
        .try_map(|s: &str| s.parse::<f64>())
        .map(Literal::Float)
        .parse_next(input)
}

fn exponent(input: &mut &str) -> PResult<()> {
    (one_of(['e', 'E']), opt(one_of(['+', '-'])), digit1)
        .void()
        .parse_next(input)
}

fn string_lit(input: &mut &str) -> PResult<Literal> {
    alt((
        delimited('"', string_contents('"'), '"'),
        delimited('\'', string_contents('\''), '\''),
    ))
    .map(Literal::String)
    .parse_next(input)
}

fn backtrack<T>() -> PResult<T> {
    Err(winnow::error::ErrMode::Backtrack(
        winnow::error::ContextError::new(),
    ))
}

fn string_contents<'a>(quote: char) -> impl FnMut(&mut &'a str) -> PResult<String> {
    move |input: &mut &'a str| {
        let mut result = String::new();
        loop {
            let Some(c) = input.chars().next() else {
                return backtrack();
            };
            if c == quote {
                break;
            }
            *input = &input[c.len_utf8()..];
            if c != '\\' {
                result.push(c);
                continue;
            }
            let Some(escaped) = input.chars().next() else {
                return backtrack();
            };
            result.push(match escaped {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                '0' => '\0',
                _ => escaped, // `\\`, quotes, and unknown escapes pass through
            });
            *input = &input[escaped.len_utf8()..];
        }
        Ok(result)
    }
}

// ============ Whitespace and comments ============

fn ws(input: &mut &str) -> PResult<()> {
    repeat(
        0..,
        alt((multispace1.void(), ('#', till_line_ending).void())),
    )
    .parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ops(expr: &Expression) -> Vec<Operator> {
        expr.rest.iter().map(|o| o.op).collect()
    }

    #[test]
    fn parse_literals() {
        assert_eq!(parse("123").unwrap(), Expression::literal(Literal::Int(123)));
        assert_eq!(parse("2.5").unwrap(), Expression::literal(Literal::Float(2.5)));
        assert_eq!(parse("1e3").unwrap(), Expression::literal(Literal::Float(1000.0)));
        assert_eq!(parse("true").unwrap(), Expression::literal(Literal::Bool(true)));
        assert_eq!(
            parse(r#""a\nb""#).unwrap(),
            Expression::literal(Literal::String("a\nb".into()))
        );
    }

    #[test]
    fn keywords_need_a_word_boundary() {
        assert_eq!(parse("trueish").unwrap(), Expression::identifier("trueish"));
    }

    #[test]
    fn chains_stay_flat() {
        // a * b + c is one chain, not a tree
        let expr = parse("a * b + c").unwrap();
        assert_eq!(ops(&expr), vec![Operator::Mul, Operator::Add]);
        assert_eq!(expr.len(), 3);

        let expr = parse("x <= 1 || y != 2").unwrap();
        assert_eq!(ops(&expr), vec![Operator::Le, Operator::Or, Operator::Ne]);
    }

    #[test]
    fn parens_nest_a_chain() {
        let expr = parse("(a + b) * c").unwrap();
        assert_eq!(ops(&expr), vec![Operator::Mul]);
        assert!(matches!(expr.first, Operand::Primary(PrimaryExpr::Paren(_))));
    }

    #[test]
    fn unary_binds_to_next_operand() {
        let expr = parse("-a * b").unwrap();
        assert!(matches!(expr.first, Operand::Unary(UnaryExpr { op: Operator::Sub, .. })));
        assert_eq!(ops(&expr), vec![Operator::Mul]);

        let expr = parse("!done").unwrap();
        assert!(matches!(expr.first, Operand::Unary(UnaryExpr { op: Operator::Not, .. })));
    }

    #[test]
    fn calls_and_trailing_commas() {
        let expr = parse("f(a, b + 1,)").unwrap();
        let call = expr.as_call().unwrap();
        assert_eq!(call.name.name, "f");
        assert_eq!(call.args.len(), 2);
        assert!(parse("g()").unwrap().as_call().unwrap().args.is_empty());
    }

    #[test]
    fn placeholder_spellings() {
        let expr = parse("f(_1, __rest)").unwrap();
        let call = expr.as_call().unwrap();
        assert_eq!(call.args[1].as_identifier().unwrap().name, "__rest");

        let expr = parse("_1 + _2 * _3...").unwrap();
        let last = &expr.rest[1].operand;
        assert!(last.placeholder().unwrap().is_ellipsis());
    }

    #[test]
    fn programs_with_comments_and_separators() {
        let program = parse_program(
            "# setup\ndefine(x, 1);\ndefine(y, x + 1) # trailing\nx + y",
        )
        .unwrap();
        assert_eq!(program.len(), 3);
        assert!(parse_program("").unwrap().is_empty());
    }

    #[test]
    fn trailing_input_is_reported_with_position() {
        let err = parse("a +\n  )").unwrap_err();
        assert_eq!(err.message, "unexpected trailing input");
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 3);
    }
}
