use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::diagnostics::Diagnostic;
use crate::lexer::{self, Token};

type Span = SimpleSpan;

fn fold_binary(left: Expr, (op, right): (BinaryOp, Expr)) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Build the expression parser.
///
/// One layer per precedence level, lowest at the outside; every level
/// is left-associative. Sub-parsers are defined inline so chumsky can
/// infer the generic input type.
fn expression_parser<'a, I>() -> impl Parser<'a, I, Expr, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = Span>,
{
    recursive(|expr| {
        let ident = select! { Token::Ident(name) => name }.labelled("identifier");

        let literal = select! {
            Token::True => Expr::Bool(true),
            Token::False => Expr::Bool(false),
            Token::Number(n) => Expr::Number(n),
            Token::Str(s) => Expr::Str(s),
        }
        .labelled("literal");

        // Identifier followed by parentheses is a call; bare, a variable.
        let call_or_variable = ident
            .then(
                expr.clone()
                    .separated_by(just(Token::Comma))
                    .collect::<Vec<Expr>>()
                    .delimited_by(just(Token::LParen), just(Token::RParen))
                    .or_not(),
            )
            .map(|(name, args)| match args {
                Some(args) => Expr::Call { name, args },
                None => Expr::Variable(name),
            });

        let group = expr
            .clone()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        let term = choice((group, literal, call_or_variable)).labelled("term");

        let unary_op = select! {
            Token::Not => UnaryOp::Not,
            Token::Minus => UnaryOp::Neg,
        };
        let unary = unary_op.repeated().foldr(term, |op, operand| Expr::Unary {
            op,
            operand: Box::new(operand),
        });

        let product_op = select! {
            Token::Star => BinaryOp::Mul,
            Token::Slash => BinaryOp::Div,
        };
        let product = unary
            .clone()
            .foldl(product_op.then(unary).repeated(), fold_binary);

        let sum_op = select! {
            Token::Plus => BinaryOp::Add,
            Token::Minus => BinaryOp::Sub,
        };
        let sum = product
            .clone()
            .foldl(sum_op.then(product).repeated(), fold_binary);

        let comparison_op = select! {
            Token::EqEq => BinaryOp::Eq,
            Token::LegacyEq => BinaryOp::Eq,
            Token::Ne => BinaryOp::Ne,
            Token::Gt => BinaryOp::Gt,
            Token::Lt => BinaryOp::Lt,
            Token::Ge => BinaryOp::Ge,
            Token::Le => BinaryOp::Le,
        };
        let comparison = sum
            .clone()
            .foldl(comparison_op.then(sum).repeated(), fold_binary);

        let conjunction = comparison.clone().foldl(
            just(Token::And).to(BinaryOp::And).then(comparison).repeated(),
            fold_binary,
        );

        conjunction.clone().foldl(
            just(Token::Or).to(BinaryOp::Or).then(conjunction).repeated(),
            fold_binary,
        )
    })
}

/// Parse a token stream into an expression tree.
///
/// Trailing tokens after a complete expression are an error.
pub fn parse(tokens: &[(Token, lexer::Span)]) -> Result<Expr, Vec<Diagnostic>> {
    let token_iter = tokens
        .iter()
        .map(|(tok, span)| (tok.clone(), Span::from(span.clone())));

    let len = tokens.last().map_or(0, |(_, s)| s.end);
    let eoi: Span = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let (output, errors) = expression_parser()
        .then_ignore(end())
        .parse(stream)
        .into_output_errors();

    if let Some(expr) = output
        && errors.is_empty()
    {
        return Ok(expr);
    }

    Err(errors
        .into_iter()
        .map(|e| {
            let span = e.span();
            Diagnostic::error(span.into_range(), e.to_string())
        })
        .collect())
}
