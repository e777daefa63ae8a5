//! Type expressions: the textual form of a rule used by configuration files.
//!
//! `TypeExpr::parse("dict[str, list[int] | None]")` produces a syntax tree that
//! is resolved against a [`TypeRegistry`] into a [`TypeRule`]. Supported forms:
//! class and builtin names, `Any`, `None`, `list[T]`, `set[T]`, `dict[K, V]`,
//! `tuple[T, ...]`, `tuple[A, B]`, `tuple[()]`, `Optional[T]`, `Union[A, B]`,
//! `A | B` and `Literal[...]` over strings, numbers, `True`, `False`, `None`.
use super::TypeRule;
use crate::type_system::{builtins, TypeRegistry};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unexpected {found} in type expression")]
    Unexpected { found: String },
    #[error("unexpected end of type expression")]
    UnexpectedEnd,
    #[error("unknown type '{0}'")]
    UnknownType(String),
    #[error("'{0}' does not take type arguments")]
    NotGeneric(String),
    #[error("'{base}' expects {expected} type argument(s), got {got}")]
    Arity { base: String, expected: usize, got: usize },
    #[error("invalid literal value '{0}'")]
    BadLiteral(String),
    #[error("'...' and '()' are only valid inside tuple[...]")]
    MisplacedMarker,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeExpr {
    Name(String),
    Generic { base: String, args: Vec<TypeExpr> },
    Union(Vec<TypeExpr>),
    Literal(Vec<Value>),
    /// The `...` of `tuple[T, ...]`.
    Ellipsis,
    /// The `()` of `tuple[()]`.
    EmptyTuple,
}

impl TypeExpr {
    pub fn parse(source: &str) -> Result<Self, ExprError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_union()?;
        match parser.next() {
            None => Ok(expr),
            Some(tok) => Err(ExprError::Unexpected { found: tok.to_string() }),
        }
    }

    /// Resolves names against `registry` and builds the rule tree.
    pub fn resolve(&self, registry: &TypeRegistry) -> Result<TypeRule, ExprError> {
        match self {
            TypeExpr::Name(name) => match name.as_str() {
                "Any" => Ok(TypeRule::Any),
                "None" => Ok(TypeRule::instance_of(builtins::none_type())),
                other => registry
                    .get(other)
                    .map(TypeRule::instance_of)
                    .ok_or_else(|| ExprError::UnknownType(other.to_string())),
            },
            TypeExpr::Union(options) => Ok(TypeRule::Union(
                options.iter().map(|e| e.resolve(registry)).collect::<Result<_, _>>()?,
            )),
            TypeExpr::Literal(values) => Ok(TypeRule::LiteralSet(values.clone())),
            TypeExpr::Generic { base, args } => resolve_generic(base, args, registry),
            TypeExpr::Ellipsis | TypeExpr::EmptyTuple => Err(ExprError::MisplacedMarker),
        }
    }
}

fn resolve_generic(base: &str, args: &[TypeExpr], registry: &TypeRegistry) -> Result<TypeRule, ExprError> {
    let arity = |expected: usize| -> Result<(), ExprError> {
        if args.len() == expected {
            Ok(())
        } else {
            Err(ExprError::Arity { base: base.to_string(), expected, got: args.len() })
        }
    };
    let boxed = |e: &TypeExpr| e.resolve(registry).map(Box::new);

    match base {
        "list" | "List" => {
            arity(1)?;
            Ok(TypeRule::ListOf(Some(boxed(&args[0])?)))
        }
        "set" | "Set" => {
            arity(1)?;
            Ok(TypeRule::SetOf(Some(boxed(&args[0])?)))
        }
        "dict" | "Dict" => {
            arity(2)?;
            Ok(TypeRule::DictOf(Some(boxed(&args[0])?), Some(boxed(&args[1])?)))
        }
        "Optional" => {
            arity(1)?;
            Ok(TypeRule::optional(args[0].resolve(registry)?))
        }
        "Union" => Ok(TypeRule::Union(
            args.iter().map(|e| e.resolve(registry)).collect::<Result<_, _>>()?,
        )),
        "tuple" | "Tuple" => match args {
            [TypeExpr::EmptyTuple] => Ok(TypeRule::TupleFixed(Vec::new())),
            [element, TypeExpr::Ellipsis] => Ok(TypeRule::TupleHomogeneous(boxed(element)?)),
            _ => Ok(TypeRule::TupleFixed(
                args.iter().map(|e| e.resolve(registry)).collect::<Result<_, _>>()?,
            )),
        },
        other if registry.get(other).is_some() || other == "Any" || other == "None" => {
            Err(ExprError::NotGeneric(other.to_string()))
        }
        other => Err(ExprError::UnknownType(other.to_string())),
    }
}

impl FromStr for TypeExpr {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TypeExpr::parse(s)
    }
}

impl TryFrom<String> for TypeExpr {
    type Error = ExprError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        TypeExpr::parse(&s)
    }
}

impl From<TypeExpr> for String {
    fn from(expr: TypeExpr) -> Self {
        expr.to_string()
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Name(name) => f.write_str(name),
            TypeExpr::Generic { base, args } => {
                write!(f, "{}[", base)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str("]")
            }
            TypeExpr::Union(options) => {
                for (i, opt) in options.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{}", opt)?;
                }
                Ok(())
            }
            TypeExpr::Literal(values) => {
                f.write_str("Literal[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&v.repr())?;
                }
                f.write_str("]")
            }
            TypeExpr::Ellipsis => f.write_str("..."),
            TypeExpr::EmptyTuple => f.write_str("()"),
        }
    }
}

// --- Tokenizer ---

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Number(String),
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Pipe,
    Ellipsis,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "'{}'", s),
            Token::Str(s) => write!(f, "string {:?}", s),
            Token::Number(n) => write!(f, "number {}", n),
            Token::LBracket => f.write_str("'['"),
            Token::RBracket => f.write_str("']'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::Comma => f.write_str("','"),
            Token::Pipe => f.write_str("'|'"),
            Token::Ellipsis => f.write_str("'...'"),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '[' => { tokens.push(Token::LBracket); i += 1; }
            ']' => { tokens.push(Token::RBracket); i += 1; }
            '(' => { tokens.push(Token::LParen); i += 1; }
            ')' => { tokens.push(Token::RParen); i += 1; }
            ',' => { tokens.push(Token::Comma); i += 1; }
            '|' => { tokens.push(Token::Pipe); i += 1; }
            '.' => {
                let dots = chars[i..].iter().take(3).filter(|(_, ch)| *ch == '.').count();
                if dots < 3 {
                    return Err(ExprError::UnexpectedChar { ch: c, offset });
                }
                tokens.push(Token::Ellipsis);
                i += 3;
            }
            '\'' | '"' => {
                let quote = c;
                let mut text = String::new();
                i += 1;
                loop {
                    let Some(&(_, ch)) = chars.get(i) else {
                        return Err(ExprError::UnterminatedString);
                    };
                    i += 1;
                    match ch {
                        '\\' => {
                            let Some(&(_, escaped)) = chars.get(i) else {
                                return Err(ExprError::UnterminatedString);
                            };
                            i += 1;
                            text.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                other => other,
                            });
                        }
                        ch if ch == quote => break,
                        ch => text.push(ch),
                    }
                }
                tokens.push(Token::Str(text));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                    i += 1;
                }
                tokens.push(Token::Number(chars[start..i].iter().map(|(_, ch)| ch).collect()));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].1.is_alphanumeric() || chars[i].1 == '_' || chars[i].1 == '.') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().map(|(_, ch)| ch).collect()));
            }
            other => return Err(ExprError::UnexpectedChar { ch: other, offset }),
        }
    }
    Ok(tokens)
}

// --- Parser ---

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn parse_union(&mut self) -> Result<TypeExpr, ExprError> {
        let first = self.parse_term()?;
        if self.peek() != Some(&Token::Pipe) {
            return Ok(first);
        }
        let mut options = vec![first];
        while self.peek() == Some(&Token::Pipe) {
            self.pos += 1;
            options.push(self.parse_term()?);
        }
        Ok(TypeExpr::Union(options))
    }

    fn parse_term(&mut self) -> Result<TypeExpr, ExprError> {
        match self.next().ok_or(ExprError::UnexpectedEnd)? {
            Token::Ident(name) => {
                if self.peek() != Some(&Token::LBracket) {
                    return Ok(TypeExpr::Name(name));
                }
                self.pos += 1;
                if name == "Literal" {
                    return Ok(TypeExpr::Literal(self.parse_literals()?));
                }
                let args = self.parse_args()?;
                Ok(TypeExpr::Generic { base: name, args })
            }
            Token::Ellipsis => Ok(TypeExpr::Ellipsis),
            Token::LParen => match self.next() {
                Some(Token::RParen) => Ok(TypeExpr::EmptyTuple),
                Some(tok) => Err(ExprError::Unexpected { found: tok.to_string() }),
                None => Err(ExprError::UnexpectedEnd),
            },
            tok => Err(ExprError::Unexpected { found: tok.to_string() }),
        }
    }

    /// Comma-separated arguments up to and including the closing bracket.
    fn parse_args(&mut self) -> Result<Vec<TypeExpr>, ExprError> {
        let mut args = Vec::new();
        loop {
            args.push(self.parse_union()?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RBracket) => return Ok(args),
                Some(tok) => return Err(ExprError::Unexpected { found: tok.to_string() }),
                None => return Err(ExprError::UnexpectedEnd),
            }
        }
    }

    fn parse_literals(&mut self) -> Result<Vec<Value>, ExprError> {
        let mut values = Vec::new();
        loop {
            let value = match self.next().ok_or(ExprError::UnexpectedEnd)? {
                Token::Str(s) => Value::from(s),
                Token::Number(n) => parse_number(&n)?,
                Token::Ident(id) => match id.as_str() {
                    "True" => Value::Bool(true),
                    "False" => Value::Bool(false),
                    "None" => Value::None,
                    _ => return Err(ExprError::BadLiteral(id)),
                },
                tok => return Err(ExprError::BadLiteral(tok.to_string())),
            };
            values.push(value);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RBracket) => return Ok(values),
                Some(tok) => return Err(ExprError::Unexpected { found: tok.to_string() }),
                None => return Err(ExprError::UnexpectedEnd),
            }
        }
    }
}

fn parse_number(text: &str) -> Result<Value, ExprError> {
    if let Ok(i) = text.parse::<i64>() {
        return Ok(Value::Int(i));
    }
    text.parse::<f64>()
        .map(Value::Float)
        .map_err(|_| ExprError::BadLiteral(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{describe, matches};
    use crate::type_system::ClassSpec;
    use rstest::rstest;

    #[rstest]
    #[case("int", "int")]
    #[case("list[int]", "list[int]")]
    #[case("dict[str, int | float]", "dict[str, int | float]")]
    #[case("Optional[str]", "str | NoneType")]
    #[case("str | None", "str | NoneType")]
    #[case("tuple[int, ...]", "tuple[int, ...]")]
    #[case("tuple[int, str]", "tuple[int, str]")]
    #[case("tuple[()]", "tuple[()]")]
    #[case("Literal['r', \"w\", 1, -2.5, None]", "Literal['r', 'w', 1, -2.5, None]")]
    #[case("list", "list")]
    #[case("Any", "Any")]
    fn test_parse_and_describe(#[case] source: &str, #[case] described: &str) {
        let reg = TypeRegistry::new();
        let rule = TypeExpr::parse(source).unwrap().resolve(&reg).unwrap();
        assert_eq!(describe(&rule), described);
    }

    #[rstest]
    #[case("list[", ExprError::UnexpectedEnd)]
    #[case("Widget", ExprError::UnknownType("Widget".into()))]
    #[case("int[str]", ExprError::NotGeneric("int".into()))]
    #[case("dict[str]", ExprError::Arity { base: "dict".into(), expected: 2, got: 1 })]
    #[case("list[...]", ExprError::MisplacedMarker)]
    #[case("Literal[object]", ExprError::BadLiteral("object".into()))]
    #[case("int $", ExprError::UnexpectedChar { ch: '$', offset: 4 })]
    fn test_parse_errors(#[case] source: &str, #[case] expected: ExprError) {
        let reg = TypeRegistry::new();
        let err = TypeExpr::parse(source).and_then(|e| e.resolve(&reg)).unwrap_err();
        assert_eq!(err, expected);
    }

    #[test]
    fn test_resolves_registered_classes() {
        let mut reg = TypeRegistry::new();
        let cat = reg.register(ClassSpec::new("Cat")).unwrap();
        let rule = TypeExpr::parse("list[Cat]").unwrap().resolve(&reg).unwrap();
        let obj = Value::Object(cat.instantiate(Default::default()).unwrap());
        assert!(matches(&Value::list([obj]), &rule));
        assert!(!matches(&Value::list([Value::Int(1)]), &rule));
    }

    #[test]
    fn test_serde_round_trip_as_string() {
        let expr: TypeExpr = serde_json::from_str("\"dict[str, list[int]]\"").unwrap();
        assert_eq!(serde_json::to_string(&expr).unwrap(), "\"dict[str, list[int]]\"");
        assert!(serde_json::from_str::<TypeExpr>("\"dict[\"").is_err());
    }
}
