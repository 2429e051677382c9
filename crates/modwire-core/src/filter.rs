//! LDAP-style match expressions over attribute maps.
//!
//! Supported syntax: `(&(a=1)(b>=2.0))`, `(|...)`, `(!...)`, equality,
//! presence `(a=*)`, substrings `(a=foo*bar)`, ordering `>=` / `<=` and
//! approximate match `~=`. Comparisons are typed by the attribute value
//! being tested: strings compare lexically, longs numerically, versions by
//! version order, and a list matches if any element matches.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use modwire_util::errors::ModwireError;
use serde::{Deserialize, Serialize};

use crate::attrs::{AttrValue, Attributes};
use crate::version::Version;

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Equal { key: String, value: String },
    Approx { key: String, value: String },
    GreaterEq { key: String, value: String },
    LessEq { key: String, value: String },
    Present { key: String },
    /// `parts` are the literal runs between `*`; an empty first or last part
    /// means the pattern is open at that end.
    Substring { key: String, parts: Vec<String> },
}

#[derive(Clone, Copy)]
enum Op {
    Equal,
    Approx,
    GreaterEq,
    LessEq,
}

impl Filter {
    pub fn parse(input: &str) -> Result<Self, ModwireError> {
        let mut parser = Parser {
            input,
            chars: input.char_indices().collect(),
            pos: 0,
        };
        parser.skip_ws();
        let filter = parser.filter()?;
        parser.skip_ws();
        if parser.pos != parser.chars.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(filter)
    }

    /// Evaluate this filter against an attribute map.
    pub fn matches(&self, attrs: &Attributes) -> bool {
        match self {
            Self::And(items) => items.iter().all(|f| f.matches(attrs)),
            Self::Or(items) => items.iter().any(|f| f.matches(attrs)),
            Self::Not(inner) => !inner.matches(attrs),
            Self::Present { key } => attrs.contains_key(key),
            Self::Equal { key, value } => compare_attr(attrs, key, value, Op::Equal),
            Self::Approx { key, value } => compare_attr(attrs, key, value, Op::Approx),
            Self::GreaterEq { key, value } => compare_attr(attrs, key, value, Op::GreaterEq),
            Self::LessEq { key, value } => compare_attr(attrs, key, value, Op::LessEq),
            Self::Substring { key, parts } => match attrs.get(key) {
                Some(AttrValue::List(items)) => items.iter().any(|s| substring_match(s, parts)),
                Some(other) => substring_match(&other.to_string(), parts),
                None => false,
            },
        }
    }
}

fn compare_attr(attrs: &Attributes, key: &str, operand: &str, op: Op) -> bool {
    let Some(value) = attrs.get(key) else {
        return false;
    };
    match value {
        AttrValue::Str(s) => compare_str(s, operand, op),
        AttrValue::List(items) => items.iter().any(|s| compare_str(s, operand, op)),
        AttrValue::Long(n) => match operand.trim().parse::<i64>() {
            Ok(rhs) => ordering_satisfies(n.cmp(&rhs), op),
            Err(_) => false,
        },
        AttrValue::Version(v) => match Version::parse(operand) {
            Ok(rhs) => ordering_satisfies(v.cmp(&rhs), op),
            Err(_) => false,
        },
    }
}

fn compare_str(lhs: &str, rhs: &str, op: Op) -> bool {
    match op {
        Op::Approx => normalize(lhs) == normalize(rhs),
        _ => ordering_satisfies(lhs.cmp(rhs), op),
    }
}

fn ordering_satisfies(ord: Ordering, op: Op) -> bool {
    match op {
        Op::Equal | Op::Approx => ord == Ordering::Equal,
        Op::GreaterEq => ord != Ordering::Less,
        Op::LessEq => ord != Ordering::Greater,
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn substring_match(value: &str, parts: &[String]) -> bool {
    let Some((first, rest)) = parts.split_first() else {
        return true;
    };
    let Some(mut remaining) = value.strip_prefix(first.as_str()) else {
        return false;
    };
    let Some((last, middle)) = rest.split_last() else {
        return remaining.is_empty();
    };
    for part in middle {
        match remaining.find(part.as_str()) {
            Some(idx) => remaining = &remaining[idx + part.len()..],
            None => return false,
        }
    }
    remaining.len() >= last.len() && remaining.ends_with(last.as_str())
}

struct Parser<'a> {
    input: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, message: &str) -> ModwireError {
        ModwireError::Filter {
            filter: self.input.to_string(),
            message: format!("{message} at offset {}", self.offset()),
        }
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|(i, _)| *i)
            .unwrap_or(self.input.len())
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, want: char) -> Result<(), ModwireError> {
        match self.bump() {
            Some(c) if c == want => Ok(()),
            _ => Err(self.error(&format!("expected `{want}`"))),
        }
    }

    fn filter(&mut self) -> Result<Filter, ModwireError> {
        self.expect('(')?;
        self.skip_ws();
        let filter = match self.peek() {
            Some('&') => {
                self.bump();
                Filter::And(self.filter_list()?)
            }
            Some('|') => {
                self.bump();
                Filter::Or(self.filter_list()?)
            }
            Some('!') => {
                self.bump();
                self.skip_ws();
                Filter::Not(Box::new(self.filter()?))
            }
            Some(_) => self.item()?,
            None => return Err(self.error("unexpected end of filter")),
        };
        self.skip_ws();
        self.expect(')')?;
        Ok(filter)
    }

    fn filter_list(&mut self) -> Result<Vec<Filter>, ModwireError> {
        let mut items = Vec::new();
        self.skip_ws();
        while self.peek() == Some('(') {
            items.push(self.filter()?);
            self.skip_ws();
        }
        if items.is_empty() {
            return Err(self.error("empty filter list"));
        }
        Ok(items)
    }

    fn item(&mut self) -> Result<Filter, ModwireError> {
        let mut key = String::new();
        while let Some(c) = self.peek() {
            if matches!(c, '=' | '~' | '>' | '<' | '(' | ')') {
                break;
            }
            key.push(c);
            self.pos += 1;
        }
        let key = key.trim().to_string();
        if key.is_empty() {
            return Err(self.error("missing attribute name"));
        }

        let op = match self.bump() {
            Some('=') => None,
            Some('~') => Some(Op::Approx),
            Some('>') => Some(Op::GreaterEq),
            Some('<') => Some(Op::LessEq),
            _ => return Err(self.error("expected an operator")),
        };
        if op.is_some() {
            self.expect('=')?;
        }

        let (parts, starred) = self.value()?;
        match op {
            Some(op) => {
                if starred {
                    return Err(self.error("`*` is only allowed with `=`"));
                }
                let value = parts.concat();
                Ok(match op {
                    Op::Approx => Filter::Approx { key, value },
                    Op::GreaterEq => Filter::GreaterEq { key, value },
                    Op::LessEq => Filter::LessEq { key, value },
                    Op::Equal => Filter::Equal { key, value },
                })
            }
            None if !starred => Ok(Filter::Equal {
                key,
                value: parts.concat(),
            }),
            None if parts.iter().all(String::is_empty) && parts.len() == 2 => {
                Ok(Filter::Present { key })
            }
            None => Ok(Filter::Substring { key, parts }),
        }
    }

    /// Reads a value up to the closing `)`, splitting on unescaped `*`.
    fn value(&mut self) -> Result<(Vec<String>, bool), ModwireError> {
        let mut parts = vec![String::new()];
        let mut starred = false;
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated value")),
                Some(')') => break,
                Some('(') => return Err(self.error("unescaped `(` in value")),
                Some('\\') => {
                    self.pos += 1;
                    let escaped = self
                        .bump()
                        .ok_or_else(|| self.error("dangling escape"))?;
                    if let Some(last) = parts.last_mut() {
                        last.push(escaped);
                    }
                }
                Some('*') => {
                    self.pos += 1;
                    starred = true;
                    parts.push(String::new());
                }
                Some(c) => {
                    self.pos += 1;
                    if let Some(last) = parts.last_mut() {
                        last.push(c);
                    }
                }
            }
        }
        Ok((parts, starred))
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '(' | ')' | '*') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And(items) | Self::Or(items) => {
                f.write_str(if matches!(self, Self::And(_)) { "(&" } else { "(|" })?;
                for item in items {
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            Self::Not(inner) => write!(f, "(!{inner})"),
            Self::Equal { key, value } => write!(f, "({key}={})", escape(value)),
            Self::Approx { key, value } => write!(f, "({key}~={})", escape(value)),
            Self::GreaterEq { key, value } => write!(f, "({key}>={})", escape(value)),
            Self::LessEq { key, value } => write!(f, "({key}<={})", escape(value)),
            Self::Present { key } => write!(f, "({key}=*)"),
            Self::Substring { key, parts } => {
                let joined: Vec<String> = parts.iter().map(|p| escape(p)).collect();
                write!(f, "({key}={})", joined.join("*"))
            }
        }
    }
}

impl FromStr for Filter {
    type Err = ModwireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Filter {
    type Error = ModwireError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Filter> for String {
    fn from(value: Filter) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, AttrValue)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn equality_and_presence() {
        let a = attrs(&[("os", "linux".into())]);
        assert!(Filter::parse("(os=linux)").unwrap().matches(&a));
        assert!(!Filter::parse("(os=win32)").unwrap().matches(&a));
        assert!(Filter::parse("(os=*)").unwrap().matches(&a));
        assert!(!Filter::parse("(arch=*)").unwrap().matches(&a));
    }

    #[test]
    fn composite_filters() {
        let a = attrs(&[("os", "linux".into()), ("arch", "x86_64".into())]);
        let f = Filter::parse("(&(os=linux)(|(arch=aarch64)(arch=x86_64)))").unwrap();
        assert!(f.matches(&a));
        let f = Filter::parse("(!(os=linux))").unwrap();
        assert!(!f.matches(&a));
    }

    #[test]
    fn typed_version_comparison() {
        let a = attrs(&[("version", Version::new(1, 10, 0).into())]);
        // Lexically "1.10.0" < "1.9", numerically it is greater.
        assert!(Filter::parse("(version>=1.9)").unwrap().matches(&a));
        assert!(!Filter::parse("(version<=1.9)").unwrap().matches(&a));
    }

    #[test]
    fn typed_long_comparison() {
        let a = attrs(&[("cores", 8.into())]);
        assert!(Filter::parse("(cores>=4)").unwrap().matches(&a));
        assert!(!Filter::parse("(cores>=not-a-number)").unwrap().matches(&a));
    }

    #[test]
    fn substring_and_lists() {
        let a = attrs(&[(
            "ee",
            AttrValue::List(vec!["JavaSE-1.8".into(), "JavaSE-11".into()]),
        )]);
        assert!(Filter::parse("(ee=JavaSE-1*)").unwrap().matches(&a));
        assert!(Filter::parse("(ee=*SE-11)").unwrap().matches(&a));
        assert!(!Filter::parse("(ee=*17)").unwrap().matches(&a));
    }

    #[test]
    fn approximate_match() {
        let a = attrs(&[("vendor", "Acme Corp".into())]);
        assert!(Filter::parse("(vendor~=acmecorp)").unwrap().matches(&a));
    }

    #[test]
    fn escapes_and_display() {
        let f = Filter::parse(r"(name=a\*b)").unwrap();
        assert_eq!(
            f,
            Filter::Equal {
                key: "name".into(),
                value: "a*b".into()
            }
        );
        assert_eq!(f.to_string(), r"(name=a\*b)");
        let reparsed = Filter::parse(&f.to_string()).unwrap();
        assert_eq!(reparsed, f);
    }

    #[test]
    fn parse_errors() {
        assert!(Filter::parse("(a=b").is_err());
        assert!(Filter::parse("a=b").is_err());
        assert!(Filter::parse("(&)").is_err());
        assert!(Filter::parse("(a>=b*)").is_err());
        assert!(Filter::parse("(a=b)(c=d)").is_err());
    }
}
