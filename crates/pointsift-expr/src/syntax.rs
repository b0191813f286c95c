//! General expression grammar parser using nom
//!
//! The grammar accepted here is deliberately wider than what may be
//! evaluated: attribute access, calls with any target, string literals,
//! collections, lambdas and statement-shaped input all parse into a
//! [`Syntax`] tree so the validator can name them when it rejects them.
//! Text that fits none of these rules is a syntax error.
//!
//! Grammar (lowest precedence first):
//! ```text
//! statement  := 'import' dotted | 'from' dotted 'import' names
//!             | name ('=' | ':=') test | test
//! test       := 'lambda' params ':' test | or_test ('if' or_test 'else' test)?
//! or_test    := and_test ('or' and_test)*
//! and_test   := not_test ('and' not_test)*
//! not_test   := 'not' not_test | comparison
//! comparison := bitwise (comp_op bitwise)*
//! comp_op    := '<' | '<=' | '>' | '>=' | '==' | '!=' | 'in' | 'not' 'in' | 'is' | 'is' 'not'
//! bitwise    := arith (('|' | '^' | '&' | '<<' | '>>') arith)*
//! arith      := term (('+' | '-') term)*
//! term       := factor (('*' | '/' | '//' | '%' | '@') factor)*
//! factor     := ('-' | '+' | '~') factor | power
//! power      := postfix ('**' factor)?
//! postfix    := atom ('(' args ')' | '[' subscripts ']' | '.' name)*
//! args       := (test | name '=' test | '*' test | '**' test) % ','
//! subscripts := (test | test? ':' test? (':' test?)?) % ',' [',']
//! atom       := number | prefix? string | 'True' | 'False' | 'None' | name
//!             | '(' ... ')' | '[' ... ']' | '{' ... '}'
//! ```

use crate::error::{ExprError, ExprResult};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, digit0, digit1, multispace0, one_of, satisfy},
    combinator::{not, opt, recognize, value, verify},
    error::{Error as NomError, ErrorKind},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    Err as NomErr, IResult,
};
use std::fmt;

/// Maximum nesting of parentheses, unary operators and call arguments
pub const MAX_NESTING: usize = 64;

const KEYWORDS: &[&str] = &[
    "and", "or", "not", "in", "is", "if", "else", "for", "lambda", "import", "from", "True",
    "False", "None",
];

/// A node of the raw parse tree
#[derive(Debug, Clone, PartialEq)]
pub enum Syntax {
    Number(f64),
    Str(String),
    Constant(Constant),
    Name(String),
    Unary {
        op: &'static str,
        operand: Box<Syntax>,
    },
    Binary {
        op: &'static str,
        left: Box<Syntax>,
        right: Box<Syntax>,
    },
    BoolOp {
        op: &'static str,
        operands: Vec<Syntax>,
    },
    /// `left op1 c1 op2 c2 ...`; more than one entry is a chain
    Compare {
        left: Box<Syntax>,
        comparisons: Vec<(&'static str, Syntax)>,
    },
    Call {
        func: Box<Syntax>,
        args: Vec<Syntax>,
        keywords: Vec<(String, Syntax)>,
    },
    Attribute {
        value: Box<Syntax>,
        attr: String,
    },
    Subscript {
        value: Box<Syntax>,
        index: Box<Syntax>,
    },
    /// `lower:upper:step` inside a subscript
    Slice {
        lower: Option<Box<Syntax>>,
        upper: Option<Box<Syntax>>,
        step: Option<Box<Syntax>>,
    },
    /// `*value` or `**value` call argument
    Unpack {
        op: &'static str,
        value: Box<Syntax>,
    },
    /// Dict items are stored flattened as key, value, key, value, ...
    Collection {
        kind: CollectionKind,
        items: Vec<Syntax>,
    },
    Comprehension {
        kind: CollectionKind,
        element: Box<Syntax>,
        generators: Vec<Generator>,
    },
    Lambda {
        params: Vec<String>,
        body: Box<Syntax>,
    },
    Conditional {
        body: Box<Syntax>,
        test: Box<Syntax>,
        orelse: Box<Syntax>,
    },
    Import(String),
    Assign {
        target: String,
        value: Box<Syntax>,
    },
}

/// Keyword constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constant {
    True,
    False,
    None,
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::True => write!(f, "True"),
            Constant::False => write!(f, "False"),
            Constant::None => write!(f, "None"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    List,
    Tuple,
    Set,
    Dict,
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionKind::List => write!(f, "list"),
            CollectionKind::Tuple => write!(f, "tuple"),
            CollectionKind::Set => write!(f, "set"),
            CollectionKind::Dict => write!(f, "dict"),
        }
    }
}

/// One `for targets in iter if ...` clause of a comprehension
#[derive(Debug, Clone, PartialEq)]
pub struct Generator {
    pub targets: Vec<String>,
    pub iter: Syntax,
    pub conditions: Vec<Syntax>,
}

type PResult<'a, T> = IResult<&'a str, T>;

/// Parse expression text into a raw syntax tree
pub fn parse_syntax(input: &str) -> ExprResult<Syntax> {
    if input.trim().is_empty() {
        return Err(ExprError::syntax("expression is empty", 0));
    }

    match delimited(multispace0, statement, multispace0)(input) {
        Ok(("", tree)) => Ok(tree),
        Ok((rest, _)) => Err(ExprError::syntax(
            format!("unexpected input '{}'", snippet(rest)),
            offset(input, rest),
        )),
        Err(NomErr::Failure(e)) if e.code == ErrorKind::TooLarge => Err(ExprError::syntax(
            format!("expression nested deeper than {} levels", MAX_NESTING),
            offset(input, e.input),
        )),
        Err(NomErr::Failure(e)) if e.code == ErrorKind::Float => Err(ExprError::syntax(
            format!("number '{}' is out of range", snippet(e.input)),
            offset(input, e.input),
        )),
        Err(NomErr::Failure(e)) if e.code == ErrorKind::Verify => Err(ExprError::syntax(
            "positional argument follows keyword argument",
            offset(input, e.input),
        )),
        Err(NomErr::Error(e)) | Err(NomErr::Failure(e)) => {
            let message = if e.input.trim().is_empty() {
                "unexpected end of input".to_string()
            } else {
                format!("unexpected input '{}'", snippet(e.input))
            };
            Err(ExprError::syntax(message, offset(input, e.input)))
        }
        Err(NomErr::Incomplete(_)) => Err(ExprError::syntax(
            "unexpected end of input",
            input.len(),
        )),
    }
}

fn offset(full: &str, rest: &str) -> usize {
    full.len().saturating_sub(rest.len())
}

fn snippet(rest: &str) -> String {
    rest.trim().chars().take(16).collect()
}

fn fail<T>(input: &str, kind: ErrorKind) -> PResult<'_, T> {
    Err(NomErr::Error(NomError::new(input, kind)))
}

/// Abort the whole parse once nesting exceeds [`MAX_NESTING`]
fn enter(input: &str, depth: usize) -> PResult<'_, ()> {
    if depth > MAX_NESTING {
        Err(NomErr::Failure(NomError::new(input, ErrorKind::TooLarge)))
    } else {
        Ok((input, ()))
    }
}

/// Parse whitespace around an inner parser
fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> PResult<'a, O>
where
    F: FnMut(&'a str) -> PResult<'a, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Parse an identifier (keywords included)
fn identifier(input: &str) -> PResult<'_, &str> {
    recognize(pair(satisfy(is_ident_start), take_while(is_ident_char)))(input)
}

/// Parse an identifier that is not a reserved word
fn name(input: &str) -> PResult<'_, &str> {
    verify(identifier, |s: &str| !KEYWORDS.contains(&s))(input)
}

/// Match a reserved word, not a prefix of a longer identifier
fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    terminated(tag(kw), not(satisfy(is_ident_char)))
}

/// Parse a dotted module path such as `os.path`
fn dotted_name(input: &str) -> PResult<'_, &str> {
    recognize(pair(identifier, many0(pair(char('.'), identifier))))(input)
}

fn statement(input: &str) -> PResult<'_, Syntax> {
    if let Ok((rest, _)) = keyword("import")(input) {
        let (rest, path) = ws(dotted_name)(rest)?;
        return Ok((rest, Syntax::Import(path.to_string())));
    }

    if let Ok((rest, _)) = keyword("from")(input) {
        let (rest, module) = ws(dotted_name)(rest)?;
        let (rest, _) = keyword("import")(rest)?;
        let (rest, names) = separated_list1(ws(char(',')), ws(alt((identifier, tag("*")))))(rest)?;
        return Ok((
            rest,
            Syntax::Import(format!("{} import {}", module, names.join(", "))),
        ));
    }

    let assign_op = alt((tag(":="), terminated(tag("="), not(char('=')))));
    if let Ok((rest, (target, _))) = pair(name, ws(assign_op))(input) {
        let (rest, value) = test(rest, 1)?;
        return Ok((
            rest,
            Syntax::Assign {
                target: target.to_string(),
                value: Box::new(value),
            },
        ));
    }

    test(input, 0)
}

fn test(input: &str, depth: usize) -> PResult<'_, Syntax> {
    enter(input, depth)?;
    let (input, _) = multispace0(input)?;

    if let Ok((rest, _)) = keyword("lambda")(input) {
        return lambda(rest, depth);
    }

    let (input, body) = or_test(input, depth)?;

    match preceded(multispace0, keyword("if"))(input) {
        Ok((rest, _)) => {
            let (rest, condition) = or_test(rest, depth + 1)?;
            let (rest, _) = preceded(multispace0, keyword("else"))(rest)?;
            let (rest, orelse) = test(rest, depth + 1)?;
            Ok((
                rest,
                Syntax::Conditional {
                    body: Box::new(body),
                    test: Box::new(condition),
                    orelse: Box::new(orelse),
                },
            ))
        }
        Err(NomErr::Error(_)) => Ok((input, body)),
        Err(e) => Err(e),
    }
}

fn lambda(input: &str, depth: usize) -> PResult<'_, Syntax> {
    let (input, params) = opt(separated_list1(ws(char(',')), ws(name)))(input)?;
    let (input, _) = ws(char(':'))(input)?;
    let (input, body) = test(input, depth + 1)?;
    Ok((
        input,
        Syntax::Lambda {
            params: params
                .unwrap_or_default()
                .into_iter()
                .map(str::to_string)
                .collect(),
            body: Box::new(body),
        },
    ))
}

fn or_test(input: &str, depth: usize) -> PResult<'_, Syntax> {
    let (input, first) = and_test(input, depth)?;
    let (input, rest) = many0(preceded(ws(keyword("or")), |i| and_test(i, depth)))(input)?;
    Ok((input, fold_bool("or", first, rest)))
}

fn and_test(input: &str, depth: usize) -> PResult<'_, Syntax> {
    let (input, first) = not_test(input, depth)?;
    let (input, rest) = many0(preceded(ws(keyword("and")), |i| not_test(i, depth)))(input)?;
    Ok((input, fold_bool("and", first, rest)))
}

fn fold_bool(op: &'static str, first: Syntax, rest: Vec<Syntax>) -> Syntax {
    if rest.is_empty() {
        return first;
    }
    let mut operands = Vec::with_capacity(rest.len() + 1);
    operands.push(first);
    operands.extend(rest);
    Syntax::BoolOp { op, operands }
}

fn not_test(input: &str, depth: usize) -> PResult<'_, Syntax> {
    let (input, _) = multispace0(input)?;
    if let Ok((rest, _)) = keyword("not")(input) {
        enter(input, depth + 1)?;
        let (rest, operand) = not_test(rest, depth + 1)?;
        return Ok((
            rest,
            Syntax::Unary {
                op: "not",
                operand: Box::new(operand),
            },
        ));
    }
    comparison(input, depth)
}

fn comparison_op(input: &str) -> PResult<'_, &'static str> {
    alt((
        value("<=", tag("<=")),
        value(">=", tag(">=")),
        value("==", tag("==")),
        value("!=", tag("!=")),
        value("<", terminated(tag("<"), not(char('<')))),
        value(">", terminated(tag(">"), not(char('>')))),
        value("not in", pair(keyword("not"), preceded(multispace0, keyword("in")))),
        value("is not", pair(keyword("is"), preceded(multispace0, keyword("not")))),
        value("in", keyword("in")),
        value("is", keyword("is")),
    ))(input)
}

fn comparison(input: &str, depth: usize) -> PResult<'_, Syntax> {
    let (input, left) = bitwise(input, depth)?;
    let (input, comparisons) =
        many0(pair(ws(comparison_op), |i| bitwise(i, depth)))(input)?;
    if comparisons.is_empty() {
        return Ok((input, left));
    }
    Ok((
        input,
        Syntax::Compare {
            left: Box::new(left),
            comparisons,
        },
    ))
}

fn shift_or_bitwise_op(input: &str) -> PResult<'_, &'static str> {
    alt((
        value("<<", tag("<<")),
        value(">>", tag(">>")),
        value("|", tag("|")),
        value("^", tag("^")),
        value("&", tag("&")),
    ))(input)
}

fn additive_op(input: &str) -> PResult<'_, &'static str> {
    alt((value("+", tag("+")), value("-", tag("-"))))(input)
}

fn multiplicative_op(input: &str) -> PResult<'_, &'static str> {
    alt((
        value("//", tag("//")),
        value("/", tag("/")),
        value("*", terminated(tag("*"), not(char('*')))),
        value("%", tag("%")),
        value("@", tag("@")),
    ))(input)
}

/// Parse `operand (op operand)*` into a left-nested tree.
///
/// Every further operand adds a level to the tree, so a long chain
/// counts toward [`MAX_NESTING`] like explicit parentheses do.
fn left_chain<'a>(
    input: &'a str,
    depth: usize,
    op: fn(&'a str) -> PResult<'a, &'static str>,
    operand: fn(&'a str, usize) -> PResult<'a, Syntax>,
) -> PResult<'a, Syntax> {
    let (mut input, mut node) = operand(input, depth)?;
    let mut depth = depth;

    loop {
        let (rest, symbol) = match ws(op)(input) {
            Ok(parsed) => parsed,
            Err(NomErr::Error(_)) => return Ok((input, node)),
            Err(e) => return Err(e),
        };
        depth += 1;
        enter(rest, depth)?;
        let (rest, right) = operand(rest, depth)?;
        node = Syntax::Binary {
            op: symbol,
            left: Box::new(node),
            right: Box::new(right),
        };
        input = rest;
    }
}

fn bitwise(input: &str, depth: usize) -> PResult<'_, Syntax> {
    left_chain(input, depth, shift_or_bitwise_op, arith)
}

fn arith(input: &str, depth: usize) -> PResult<'_, Syntax> {
    left_chain(input, depth, additive_op, term)
}

fn term(input: &str, depth: usize) -> PResult<'_, Syntax> {
    left_chain(input, depth, multiplicative_op, factor)
}

fn factor(input: &str, depth: usize) -> PResult<'_, Syntax> {
    let (input, _) = multispace0(input)?;
    let unary = alt((
        value("-", char('-')),
        value("+", char('+')),
        value("~", char('~')),
    ));
    let parsed: PResult<'_, &'static str> = terminated(unary, multispace0)(input);
    if let Ok((rest, op)) = parsed {
        enter(input, depth + 1)?;
        let (rest, operand) = factor(rest, depth + 1)?;
        return Ok((
            rest,
            Syntax::Unary {
                op,
                operand: Box::new(operand),
            },
        ));
    }
    power(input, depth)
}

fn power(input: &str, depth: usize) -> PResult<'_, Syntax> {
    let (input, base) = postfix(input, depth)?;
    match ws(tag("**"))(input) {
        Ok((rest, _)) => {
            enter(rest, depth + 1)?;
            let (rest, exponent) = factor(rest, depth + 1)?;
            Ok((
                rest,
                Syntax::Binary {
                    op: "**",
                    left: Box::new(base),
                    right: Box::new(exponent),
                },
            ))
        }
        Err(NomErr::Error(_)) => Ok((input, base)),
        Err(e) => Err(e),
    }
}

fn postfix(input: &str, depth: usize) -> PResult<'_, Syntax> {
    let (mut input, mut node) = atom(input, depth)?;

    loop {
        let (rest, _) = multispace0(input)?;
        if let Ok((rest, _)) = char::<_, NomError<&str>>('(')(rest) {
            enter(rest, depth + 1)?;
            let (rest, (args, keywords)) = call_arguments(rest, depth + 1)?;
            let (rest, _) = ws(char(')'))(rest)?;
            node = Syntax::Call {
                func: Box::new(node),
                args,
                keywords,
            };
            input = rest;
        } else if let Ok((rest, _)) = char::<_, NomError<&str>>('[')(rest) {
            let (rest, index) = subscripts(rest, depth + 1)?;
            let (rest, _) = ws(char(']'))(rest)?;
            node = Syntax::Subscript {
                value: Box::new(node),
                index: Box::new(index),
            };
            input = rest;
        } else if let Ok((rest, attr)) =
            preceded(char::<_, NomError<&str>>('.'), ws(identifier))(rest)
        {
            node = Syntax::Attribute {
                value: Box::new(node),
                attr: attr.to_string(),
            };
            input = rest;
        } else {
            return Ok((input, node));
        }
    }
}

type CallArguments = (Vec<Syntax>, Vec<(String, Syntax)>);

fn call_arguments(input: &str, depth: usize) -> PResult<'_, CallArguments> {
    let mut args = Vec::new();
    let mut keywords = Vec::new();
    let mut after_keyword = false;
    let mut after_mapping = false;
    let (mut input, _) = multispace0(input)?;

    while !input.starts_with(')') {
        let unpack = alt((value("**", tag("**")), value("*", tag("*"))));
        let unpacked: PResult<'_, &'static str> = terminated(unpack, multispace0)(input);
        let keyword_arg = pair(name, ws(terminated(char('='), not(char('=')))))(input);

        if let Ok((rest, op)) = unpacked {
            if op == "*" && after_mapping {
                return Err(NomErr::Failure(NomError::new(input, ErrorKind::Verify)));
            }
            let (rest, arg) = test(rest, depth)?;
            if op == "**" {
                after_keyword = true;
                after_mapping = true;
            }
            args.push(Syntax::Unpack {
                op,
                value: Box::new(arg),
            });
            input = rest;
        } else if let Ok((rest, (key, _))) = keyword_arg {
            let (rest, arg) = test(rest, depth)?;
            keywords.push((key.to_string(), arg));
            after_keyword = true;
            input = rest;
        } else {
            if after_keyword {
                return Err(NomErr::Failure(NomError::new(input, ErrorKind::Verify)));
            }
            let (rest, arg) = test(input, depth)?;
            args.push(arg);
            input = rest;
        }

        match ws(char::<_, NomError<&str>>(','))(input) {
            Ok((rest, _)) => input = rest,
            Err(_) => break,
        }
    }

    Ok((input, (args, keywords)))
}

/// Parse the inside of `[ ]` after a value: indices, slices or a tuple of them
fn subscripts(input: &str, depth: usize) -> PResult<'_, Syntax> {
    enter(input, depth)?;
    let mut items = Vec::new();
    let mut trailing_comma = false;
    let mut input = input;

    loop {
        let (rest, item) = subscript_item(input, depth)?;
        items.push(item);
        input = rest;
        match ws(char::<_, NomError<&str>>(','))(input) {
            Ok((rest, _)) => {
                input = rest;
                if input.starts_with(']') {
                    trailing_comma = true;
                    break;
                }
            }
            Err(_) => break,
        }
    }

    if items.len() == 1 && !trailing_comma {
        return Ok((input, items.remove(0)));
    }
    Ok((
        input,
        Syntax::Collection {
            kind: CollectionKind::Tuple,
            items,
        },
    ))
}

fn subscript_item(input: &str, depth: usize) -> PResult<'_, Syntax> {
    let (input, lower) = slice_bound(input, depth)?;
    let Ok((rest, _)) = ws(char::<_, NomError<&str>>(':'))(input) else {
        return match lower {
            Some(index) => Ok((input, *index)),
            None => fail(input, ErrorKind::Char),
        };
    };

    let (rest, upper) = slice_bound(rest, depth)?;
    let (rest, step) = match ws(char::<_, NomError<&str>>(':'))(rest) {
        Ok((rest, _)) => slice_bound(rest, depth)?,
        Err(_) => (rest, None),
    };
    Ok((rest, Syntax::Slice { lower, upper, step }))
}

/// An optional slice component, absent before `:`, `,` or `]`
fn slice_bound(input: &str, depth: usize) -> PResult<'_, Option<Box<Syntax>>> {
    let (input, _) = multispace0(input)?;
    if input.is_empty() || input.starts_with(&[':', ',', ']'][..]) {
        return Ok((input, None));
    }
    let (rest, bound) = test(input, depth)?;
    Ok((rest, Some(Box::new(bound))))
}

fn atom(input: &str, depth: usize) -> PResult<'_, Syntax> {
    let (input, _) = multispace0(input)?;
    let Some(first) = input.chars().next() else {
        return fail(input, ErrorKind::Eof);
    };

    match first {
        '(' => enclosure(&input[1..], depth + 1, ')', CollectionKind::Tuple),
        '[' => enclosure(&input[1..], depth + 1, ']', CollectionKind::List),
        '{' => enclosure(&input[1..], depth + 1, '}', CollectionKind::Set),
        '\'' | '"' => {
            let (rest, text) = string_literal(input)?;
            Ok((rest, Syntax::Str(text)))
        }
        _ if string_prefix(input).is_some() => {
            let prefix_len = string_prefix(input).map_or(0, str::len);
            let (rest, text) = string_literal(&input[prefix_len..])?;
            Ok((rest, Syntax::Str(text)))
        }
        c if c.is_ascii_digit() || c == '.' => {
            let (rest, number) = number(input)?;
            Ok((rest, Syntax::Number(number)))
        }
        _ => {
            let (rest, ident) = identifier(input)?;
            match ident {
                "True" => Ok((rest, Syntax::Constant(Constant::True))),
                "False" => Ok((rest, Syntax::Constant(Constant::False))),
                "None" => Ok((rest, Syntax::Constant(Constant::None))),
                kw if KEYWORDS.contains(&kw) => fail(input, ErrorKind::Tag),
                _ => Ok((rest, Syntax::Name(ident.to_string()))),
            }
        }
    }
}

/// Parse a number (including scientific notation); no sign, no `inf`/`nan`
fn number(input: &str) -> PResult<'_, f64> {
    let (rest, text) = recognize(tuple((
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)?;
    // `0x10`, `3abc` and `1e` are not numbers
    let (rest, _) = not(satisfy(is_ident_char))(rest)?;

    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok((rest, v)),
        Ok(_) => Err(NomErr::Failure(NomError::new(input, ErrorKind::Float))),
        Err(_) => fail(input, ErrorKind::Float),
    }
}

/// Match a string prefix such as `f`, `b` or `rb` directly before a quote
fn string_prefix(input: &str) -> Option<&str> {
    const PREFIXES: &[&str] = &["r", "u", "b", "f", "br", "rb", "fr", "rf"];

    let len = input
        .char_indices()
        .take(3)
        .find(|&(_, c)| c == '\'' || c == '"')
        .map(|(i, _)| i)?;
    let prefix = &input[..len];
    PREFIXES
        .contains(&prefix.to_ascii_lowercase().as_str())
        .then_some(prefix)
}

/// Parse a single- or double-quoted string literal
fn string_literal(input: &str) -> PResult<'_, String> {
    let quote = match input.chars().next() {
        Some(q @ ('\'' | '"')) => q,
        _ => return fail(input, ErrorKind::Char),
    };

    let mut text = String::new();
    let mut chars = input.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            if let Some((_, escaped)) = chars.next() {
                text.push(escaped);
            }
        } else if c == quote {
            return Ok((&input[i + c.len_utf8()..], text));
        } else {
            text.push(c);
        }
    }

    // Unterminated string
    fail(input, ErrorKind::Char)
}

/// Parse the inside of `( )`, `[ ]` or `{ }` after the opening bracket
fn enclosure(input: &str, depth: usize, close: char, kind: CollectionKind) -> PResult<'_, Syntax> {
    enter(input, depth)?;
    let (input, _) = multispace0(input)?;

    if let Ok((rest, _)) = char::<_, NomError<&str>>(close)(input) {
        let kind = if close == '}' { CollectionKind::Dict } else { kind };
        return Ok((rest, Syntax::Collection { kind, items: Vec::new() }));
    }

    let (input, first) = test(input, depth)?;

    // Dict display or dict comprehension
    if close == '}' {
        if let Ok((rest, _)) = ws(char::<_, NomError<&str>>(':'))(input) {
            let (rest, first_value) = test(rest, depth)?;
            if let Ok((rest, generators)) = comprehension_clauses(rest, depth) {
                let (rest, _) = ws(char(close))(rest)?;
                return Ok((
                    rest,
                    Syntax::Comprehension {
                        kind: CollectionKind::Dict,
                        element: Box::new(first_value),
                        generators,
                    },
                ));
            }
            let mut items = vec![first, first_value];
            let mut input = rest;
            while let Ok((rest, _)) = ws(char::<_, NomError<&str>>(','))(input) {
                input = rest;
                if input.starts_with(close) {
                    break;
                }
                let (rest, key) = test(input, depth)?;
                let (rest, _) = ws(char(':'))(rest)?;
                let (rest, val) = test(rest, depth)?;
                items.push(key);
                items.push(val);
                input = rest;
            }
            let (rest, _) = ws(char(close))(input)?;
            return Ok((
                rest,
                Syntax::Collection {
                    kind: CollectionKind::Dict,
                    items,
                },
            ));
        }
    }

    match comprehension_clauses(input, depth) {
        Ok((rest, generators)) => {
            let (rest, _) = ws(char(close))(rest)?;
            return Ok((
                rest,
                Syntax::Comprehension {
                    kind,
                    element: Box::new(first),
                    generators,
                },
            ));
        }
        Err(NomErr::Error(_)) => {}
        Err(e) => return Err(e),
    }

    let mut items = vec![first];
    let mut trailing_comma = false;
    let mut input = input;
    while let Ok((rest, _)) = ws(char::<_, NomError<&str>>(','))(input) {
        input = rest;
        trailing_comma = true;
        if input.starts_with(close) {
            break;
        }
        let (rest, item) = test(input, depth)?;
        items.push(item);
        trailing_comma = false;
        input = rest;
    }
    let (rest, _) = ws(char(close))(input)?;

    // `(x)` is grouping, `(x,)` is a tuple
    if kind == CollectionKind::Tuple && items.len() == 1 && !trailing_comma {
        return Ok((rest, items.remove(0)));
    }
    Ok((rest, Syntax::Collection { kind, items }))
}

fn comprehension_clauses(input: &str, depth: usize) -> PResult<'_, Vec<Generator>> {
    let mut generators = Vec::new();
    let mut input = input;

    while let Ok((rest, _)) = preceded(multispace0, keyword("for"))(input) {
        let (rest, targets) = separated_list1(ws(char(',')), ws(name))(rest)?;
        let (rest, _) = keyword("in")(rest)?;
        let (rest, iter) = or_test(rest, depth + 1)?;
        let mut conditions = Vec::new();
        let mut rest = rest;
        while let Ok((after_if, _)) = preceded(multispace0, keyword("if"))(rest) {
            let (after, condition) = or_test(after_if, depth + 1)?;
            conditions.push(condition);
            rest = after;
        }
        generators.push(Generator {
            targets: targets.into_iter().map(str::to_string).collect(),
            iter,
            conditions,
        });
        input = rest;
    }

    if generators.is_empty() {
        fail(input, ErrorKind::Tag)
    } else {
        Ok((input, generators))
    }
}
