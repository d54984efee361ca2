//! Shared parser primitives for the query grammar.

use crate::ir::Literal;
use chumsky::extra;
use chumsky::prelude::*;

/// Extra type for parsers - uses Rich errors for better messages
pub type Extra<'src> = extra::Err<Rich<'src, char>>;

// ============================================================================
// Primitive parsers
// ============================================================================

/// Parser for names: alphanumeric + underscore
pub fn ident<'src>() -> impl Parser<'src, &'src str, String, Extra<'src>> + Clone {
    any()
        .filter(|c: &char| c.is_alphanumeric() || *c == '_')
        .repeated()
        .at_least(1)
        .to_slice()
        .map(|s: &str| s.to_string())
        .labelled("name")
}

/// Insignificant tokens: whitespace, commas and `#` line comments
pub fn ws<'src>() -> impl Parser<'src, &'src str, (), Extra<'src>> + Clone {
    let blank = any()
        .filter(|c: &char| c.is_whitespace() || *c == ',')
        .ignored();
    let comment = just('#').then(none_of("\n").repeated()).ignored();

    choice((blank, comment)).repeated().ignored()
}

/// Parser for double-quoted strings with backslash escapes: "value"
pub fn string_literal<'src>() -> impl Parser<'src, &'src str, String, Extra<'src>> + Clone {
    let escape = just('\\').ignore_then(choice((
        just('"'),
        just('\\'),
        just('/'),
        just('n').to('\n'),
        just('r').to('\r'),
        just('t').to('\t'),
    )));

    just('"')
        .ignore_then(none_of("\\\"").or(escape).repeated().collect::<String>())
        .then_ignore(just('"'))
        .labelled("string literal")
}

/// Parser for numbers: integers become `Int`, anything with a fraction or
/// exponent becomes `Float`
pub fn number<'src>() -> impl Parser<'src, &'src str, Literal, Extra<'src>> + Clone {
    let fraction = just('.').then(text::digits(10));
    let exponent = one_of("eE")
        .then(one_of("+-").or_not())
        .then(text::digits(10));

    just('-')
        .or_not()
        .then(text::int(10))
        .then(fraction.or_not())
        .then(exponent.or_not())
        .to_slice()
        .try_map(|s: &str, span| {
            if s.contains(['.', 'e', 'E']) {
                s.parse::<f64>()
                    .map(Literal::Float)
                    .map_err(|_| Rich::custom(span, "invalid number"))
            } else {
                s.parse::<i64>()
                    .map(Literal::Int)
                    .map_err(|_| Rich::custom(span, "integer overflow"))
            }
        })
        .labelled("number")
}

/// Parser for argument values
///
/// Bare words other than `true`, `false` and `null` are enum values and are
/// kept as strings.
pub fn value<'src>() -> impl Parser<'src, &'src str, Literal, Extra<'src>> + Clone {
    choice((
        string_literal().map(Literal::String),
        number(),
        ident().map(|word| match word.as_str() {
            "true" => Literal::Boolean(true),
            "false" => Literal::Boolean(false),
            "null" => Literal::Null,
            _ => Literal::String(word),
        }),
    ))
    .labelled("value")
}

/// Keyword parser
pub fn kw<'src>(keyword: &'static str) -> impl Parser<'src, &'src str, (), Extra<'src>> + Clone {
    text::keyword::<&str, _, Extra<'src>>(keyword).ignored()
}

// ============================================================================
// Error formatting
// ============================================================================

/// Format chumsky errors for logs
pub fn format_errors(errs: &[Rich<'_, char>], input: &str) -> String {
    errs.iter()
        .map(|e| {
            let span = e.span();
            let start = span.start;
            let line = input[..start].lines().count().max(1);
            let col = start - input[..start].rfind('\n').map_or(0, |i| i + 1);

            let found = e
                .found()
                .map_or("end of input".to_string(), |c| format!("'{}'", c));

            format!(
                "Line {}, column {}: {} (found {})",
                line,
                col + 1,
                e.reason(),
                found
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
