use crate::{
    document::{ClassDef, Document, Item, Op, Property},
    value::Value,
};
use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_until, take_while, take_while1},
    character::complete::{
        char, digit0, digit1, hex_digit1, not_line_ending, one_of, satisfy,
        space0, space1,
    },
    combinator::{all_consuming, cut, map, map_res, opt, peek, recognize, value},
    error::{context, VerboseError, VerboseErrorKind},
    multi::{many0, many0_count, separated_list0},
    sequence::{delimited, pair, preceded, terminated, tuple},
    Finish,
};

type Input<'a> = &'a str;
type IResult<'a, T> = nom::IResult<Input<'a>, T, VerboseError<Input<'a>>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{line}:{column}: expected {expected}, found {found}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub expected: String,
    pub found: String,
}

pub fn document(input: Input) -> Result<Document, ParseError> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let (_, mut items) =
        all_consuming(preceded(
            line_start,
            delimited(ws, many0(preceded(ws, item)), ws),
        ))(input)
            .finish()
            .map_err(|error| ParseError::new(input, &error))?;
    number_lines(&mut items, input);
    Ok(Document { items })
}

impl ParseError {
    fn new(source: Input, error: &VerboseError<Input>) -> Self {
        let at = error.errors.first().map_or("", |(rest, _)| *rest);
        let expected = error
            .errors
            .iter()
            .find_map(|(_, kind)| match kind {
                VerboseErrorKind::Context(label) => Some((*label).to_owned()),
                _ => None,
            })
            .or_else(|| {
                error.errors.first().map(|(_, kind)| match kind {
                    VerboseErrorKind::Char(c) => format!("`{c}`"),
                    VerboseErrorKind::Nom(nom::error::ErrorKind::Eof) => {
                        "a class, property or `delete`".to_owned()
                    }
                    other => format!("{other:?}"),
                })
            })
            .unwrap_or_else(|| "valid input".to_owned());
        let (line, column) = line_column(source, source.len() - at.len());
        Self {
            line,
            column,
            expected,
            found: describe(at),
        }
    }
}

fn describe(rest: Input) -> String {
    let token: String = rest
        .trim_start()
        .chars()
        .take_while(|c| !c.is_whitespace())
        .take(16)
        .collect();
    if token.is_empty() {
        "end of input".to_owned()
    } else {
        format!("`{token}`")
    }
}

fn line_column(source: Input, offset: usize) -> (usize, usize) {
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before
        .rfind('\n')
        .map_or(before.chars().count(), |nl| before[nl + 1..].chars().count())
        + 1;
    (line, column)
}

// While parsing, `ClassDef::line` holds the length of the input remaining at
// the class keyword; turn that into a line number once the source is known.
fn number_lines(items: &mut [Item], source: Input) {
    for item in items {
        if let Item::Class(class) = item {
            class.line = line_column(source, source.len() - class.line).0;
            if let Some(body) = &mut class.body {
                number_lines(body, source);
            }
        }
    }
}

fn item(input: Input) -> IResult<Item> {
    alt((
        map(class, Item::Class),
        map(delete, Item::Delete),
        map(property, Item::Property),
    ))(input)
}

fn class(input: Input) -> IResult<ClassDef> {
    let remaining = input.len();
    let (input, _) = keyword("class")(input)?;
    let body = delimited(
        char('{'),
        many0(preceded(ws, item)),
        tuple((ws, context("`}`", char('}')), opt(preceded(ws, char(';'))))),
    );
    map(
        cut(tuple((
            preceded(ws, context("class name", identifier)),
            opt(preceded(
                tuple((ws, char(':'), ws)),
                context("parent class name", identifier),
            )),
            preceded(
                ws,
                context(
                    "`{` or `;`",
                    alt((value(None, char(';')), map(body, Some))),
                ),
            ),
        ))),
        move |(name, parent, body)| ClassDef {
            name,
            parent,
            body,
            line: remaining,
        },
    )(input)
}

fn delete(input: Input) -> IResult<String> {
    preceded(
        keyword("delete"),
        cut(terminated(
            preceded(ws, context("class name", identifier)),
            preceded(ws, context("`;`", char(';'))),
        )),
    )(input)
}

fn property(input: Input) -> IResult<Property> {
    let (input, name) = identifier(input)?;
    let (input, is_array) =
        map(opt(tuple((ws, char('['), ws, char(']')))), |brackets| {
            brackets.is_some()
        })(input)?;
    let (input, op) = preceded(
        ws,
        alt((value(Op::Append, tag("+=")), value(Op::Assign, char('=')))),
    )(input)?;
    if op == Op::Append && !is_array {
        return Err(nom::Err::Failure(VerboseError {
            errors: vec![(input, VerboseErrorKind::Context("`[]` before `+=`"))],
        }));
    }
    let (input, value) = if is_array {
        cut(preceded(ws, array_value))(input)?
    } else {
        cut(preceded(ws, scalar_value))(input)?
    };
    let (input, _) = cut(preceded(ws, context("`;`", char(';'))))(input)?;
    Ok((input, Property { name, op, value }))
}

fn array_value(input: Input) -> IResult<Value> {
    context("array", map(array, Value::Array))(input)
}

fn scalar_value(input: Input) -> IResult<Value> {
    context("property value", element)(input)
}

fn array(input: Input) -> IResult<Vec<Value>> {
    delimited(
        pair(char('{'), ws),
        terminated(
            separated_list0(tuple((ws, char(','), ws)), element),
            opt(pair(ws, char(','))),
        ),
        pair(ws, context("`}`", char('}'))),
    )(input)
}

fn element(input: Input) -> IResult<Value> {
    alt((
        map(array, Value::Array),
        map(string_literal, Value::String),
        map(number, Value::Number),
        map(bareword, |word| Value::String(word.to_owned())),
    ))(input)
}

fn string_literal(input: Input) -> IResult<String> {
    delimited(
        char('"'),
        many0(alt((is_not("\""), value("\"", tag("\"\""))))),
        context("closing `\"`", char('"')),
    )(input)
    .map(|(rest, parts)| (rest, parts.concat()))
}

fn number(input: Input) -> IResult<f64> {
    terminated(
        alt((hex_number, decimal_number)),
        peek(preceded(ws, one_of(";,}"))),
    )(input)
}

fn hex_number(input: Input) -> IResult<f64> {
    map_res(
        pair(
            opt(one_of("+-")),
            preceded(alt((tag("0x"), tag("0X"))), hex_digit1),
        ),
        |(sign, digits)| {
            let n = i64::from_str_radix(digits, 16)?;
            Ok::<_, std::num::ParseIntError>(if sign == Some('-') {
                -n as f64
            } else {
                n as f64
            })
        },
    )(input)
}

fn decimal_number(input: Input) -> IResult<f64> {
    let mantissa = alt((
        recognize(pair(digit1, opt(pair(char('.'), digit0)))),
        recognize(pair(char('.'), digit1)),
    ));
    let exponent = tuple((one_of("eE"), opt(one_of("+-")), digit1));
    map_res(
        recognize(tuple((opt(one_of("+-")), mantissa, opt(exponent)))),
        str::parse::<f64>,
    )(input)
}

// Unquoted scalars are strings, e.g. `uniformModel = -;`.
fn bareword(input: Input) -> IResult<&str> {
    map(take_while1(|c: char| !";,{}\"\n".contains(c)), str::trim_end)(input)
}

fn identifier(input: Input) -> IResult<String> {
    map(
        recognize(pair(
            satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
            take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
        )),
        ToOwned::to_owned,
    )(input)
}

fn keyword<'a>(
    word: &'static str,
) -> impl FnMut(Input<'a>) -> IResult<'a, ()> {
    move |input| {
        let (rest, ident) = identifier(input)?;
        if ident == word {
            Ok((rest, ()))
        } else {
            Err(nom::Err::Error(VerboseError {
                errors: vec![(input, VerboseErrorKind::Context(word))],
            }))
        }
    }
}

fn line_comment(input: Input) -> IResult<()> {
    value((), pair(tag("//"), not_line_ending))(input)
}

fn block_comment(input: Input) -> IResult<()> {
    value((), tuple((tag("/*"), take_until("*/"), tag("*/"))))(input)
}

// `#define`, `#include` and friends are skipped, not evaluated.
fn directive(input: Input) -> IResult<()> {
    value((), pair(char('#'), not_line_ending))(input)
}

/// Blanks opening a line, then a directive if the line has one.
fn line_start(input: Input) -> IResult<()> {
    value((), pair(space0, opt(directive)))(input)
}

fn ws(input: Input) -> IResult<()> {
    value(
        (),
        many0_count(alt((
            value((), space1),
            value((), pair(one_of("\r\n"), line_start)),
            line_comment,
            block_comment,
        ))),
    )(input)
}
