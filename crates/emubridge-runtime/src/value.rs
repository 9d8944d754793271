//! Typed values held by the variable store.

use std::fmt;

use smol_str::SmolStr;

use crate::error::RuntimeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Scalar,
    List,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Family::Scalar => "scalar",
            Family::List => "list",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    Int,
    Bool,
    String,
    IntList,
    BoolList,
    StringList,
}

impl VarType {
    /// Accepts `Int`, `INT`, `IntList`, `INT[]`, `bool`, `Str[]`, ...
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        let lower = tag.trim().to_ascii_lowercase();
        let (base, list) = match lower
            .strip_suffix("[]")
            .or_else(|| lower.strip_suffix("list"))
        {
            Some(base) => (base, true),
            None => (lower.as_str(), false),
        };
        let ty = match (base, list) {
            ("int" | "integer", false) => Self::Int,
            ("bool" | "boolean", false) => Self::Bool,
            ("string" | "str", false) => Self::String,
            ("int" | "integer", true) => Self::IntList,
            ("bool" | "boolean", true) => Self::BoolList,
            ("string" | "str", true) => Self::StringList,
            _ => return None,
        };
        Some(ty)
    }

    #[must_use]
    pub fn family(self) -> Family {
        match self {
            Self::Int | Self::Bool | Self::String => Family::Scalar,
            Self::IntList | Self::BoolList | Self::StringList => Family::List,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Int => "Int",
            Self::Bool => "Bool",
            Self::String => "String",
            Self::IntList => "IntList",
            Self::BoolList => "BoolList",
            Self::StringList => "StringList",
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    String(String),
    IntList(Vec<i64>),
    BoolList(Vec<bool>),
    StringList(Vec<String>),
}

impl Value {
    /// Parses literal text for the given type. Lists take a bracketed literal such
    /// as `[]`, `[1, 2]` or `['a', "b"]`.
    pub fn parse(ty: VarType, text: &str) -> Result<Self, RuntimeError> {
        Ok(match ty {
            VarType::Int => Self::Int(parse_int(text)?),
            VarType::Bool => Self::Bool(parse_bool(text)?),
            VarType::String => Self::String(parse_string(text)),
            VarType::IntList => Self::IntList(parse_list(text, parse_int)?),
            VarType::BoolList => Self::BoolList(parse_list(text, parse_bool)?),
            VarType::StringList => {
                Self::StringList(parse_list(text, |item| Ok(parse_string(item)))?)
            }
        })
    }

    #[must_use]
    pub fn var_type(&self) -> VarType {
        match self {
            Self::Int(_) => VarType::Int,
            Self::Bool(_) => VarType::Bool,
            Self::String(_) => VarType::String,
            Self::IntList(_) => VarType::IntList,
            Self::BoolList(_) => VarType::BoolList,
            Self::StringList(_) => VarType::StringList,
        }
    }

    #[must_use]
    pub fn family(&self) -> Family {
        self.var_type().family()
    }

    /// `None` for scalars.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Int(_) | Self::Bool(_) | Self::String(_) => None,
            Self::IntList(items) => Some(items.len()),
            Self::BoolList(items) => Some(items.len()),
            Self::StringList(items) => Some(items.len()),
        }
    }

    /// Wire rendering for `GET name`: `Int 5` for scalars, `0:7,1:8` for lists.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Int(value) => format!("Int {value}"),
            Self::Bool(value) => format!("Bool {}", render_bool(*value)),
            Self::String(value) => format!("String {value}"),
            Self::IntList(items) => render_pairs(items, i64::to_string),
            Self::BoolList(items) => render_pairs(items, |value| render_bool(*value).to_string()),
            Self::StringList(items) => render_pairs(items, Clone::clone),
        }
    }

    /// Wire rendering for `GET name idx`. `None` for scalars and out-of-range indices.
    #[must_use]
    pub fn render_element(&self, index: usize) -> Option<String> {
        match self {
            Self::Int(_) | Self::Bool(_) | Self::String(_) => None,
            Self::IntList(items) => items.get(index).map(i64::to_string),
            Self::BoolList(items) => items.get(index).map(|value| render_bool(*value).to_string()),
            Self::StringList(items) => items.get(index).cloned(),
        }
    }

    /// Overwrites `index`, or appends when `index == len`.
    pub fn set_element(
        &mut self,
        name: &str,
        index: usize,
        text: &str,
    ) -> Result<(), RuntimeError> {
        match self {
            Self::IntList(items) => write_element(items, name, index, parse_int(text)?),
            Self::BoolList(items) => write_element(items, name, index, parse_bool(text)?),
            Self::StringList(items) => write_element(items, name, index, parse_string(text)),
            scalar => Err(RuntimeError::TypeMismatch(
                format!(
                    "'{name}' is declared {}, cannot index element {index}",
                    scalar.var_type()
                )
                .into(),
            )),
        }
    }
}

#[must_use]
pub fn render_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

pub fn parse_bool(text: &str) -> Result<bool, RuntimeError> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("true") || text == "1" {
        Ok(true)
    } else if text.eq_ignore_ascii_case("false") || text == "0" {
        Ok(false)
    } else {
        Err(RuntimeError::TypeMismatch(
            format!("'{text}' is not a Bool").into(),
        ))
    }
}

pub fn parse_int(text: &str) -> Result<i64, RuntimeError> {
    let text = text.trim();
    text.parse::<i64>()
        .map_err(|_| RuntimeError::TypeMismatch(format!("'{text}' is not an Int").into()))
}

/// Verbatim text; only a quote pair at the very ends is removed.
fn parse_string(text: &str) -> String {
    for quote in ['\'', '"'] {
        if let Some(inner) = text
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner.to_string();
        }
    }
    text.to_string()
}

fn parse_list<T>(
    text: &str,
    parse: impl Fn(&str) -> Result<T, RuntimeError>,
) -> Result<Vec<T>, RuntimeError> {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| {
            RuntimeError::TypeMismatch(SmolStr::new(format!(
                "list literal must be bracketed, got '{trimmed}'"
            )))
        })?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    inner.split(',').map(|item| parse(item.trim())).collect()
}

fn write_element<T>(
    items: &mut Vec<T>,
    name: &str,
    index: usize,
    value: T,
) -> Result<(), RuntimeError> {
    let len = items.len();
    if index < len {
        items[index] = value;
    } else if index == len {
        items.push(value);
    } else {
        return Err(RuntimeError::IndexOutOfRange {
            name: SmolStr::new(name),
            index,
            len,
        });
    }
    Ok(())
}

fn render_pairs<T>(items: &[T], render: impl Fn(&T) -> String) -> String {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| format!("{index}:{}", render(item)))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_case_insensitive_with_list_suffixes() {
        assert_eq!(VarType::parse("Int"), Some(VarType::Int));
        assert_eq!(VarType::parse("INT"), Some(VarType::Int));
        assert_eq!(VarType::parse("INT[]"), Some(VarType::IntList));
        assert_eq!(VarType::parse("IntList"), Some(VarType::IntList));
        assert_eq!(VarType::parse("bool[]"), Some(VarType::BoolList));
        assert_eq!(VarType::parse("Str"), Some(VarType::String));
        assert_eq!(VarType::parse("StringList"), Some(VarType::StringList));
        assert_eq!(VarType::parse("Float"), None);
        assert_eq!(VarType::parse("List"), None);
    }

    #[test]
    fn scalar_parse_and_render() {
        assert_eq!(Value::parse(VarType::Int, "5").expect("int").render(), "Int 5");
        assert_eq!(
            Value::parse(VarType::Bool, "true").expect("bool").render(),
            "Bool True"
        );
        assert_eq!(
            Value::parse(VarType::String, "'Luigi Raceway'").expect("string"),
            Value::String("Luigi Raceway".into())
        );
        assert!(matches!(
            Value::parse(VarType::Int, "five"),
            Err(RuntimeError::TypeMismatch(_))
        ));
        assert!(matches!(
            Value::parse(VarType::Bool, "maybe"),
            Err(RuntimeError::TypeMismatch(_))
        ));
    }

    #[test]
    fn list_literals() {
        assert_eq!(
            Value::parse(VarType::IntList, "[]").expect("empty"),
            Value::IntList(Vec::new())
        );
        let list = Value::parse(VarType::IntList, "[3, -4, 5]").expect("ints");
        assert_eq!(list.render(), "0:3,1:-4,2:5");
        assert_eq!(list.render_element(1).as_deref(), Some("-4"));
        assert_eq!(list.render_element(3), None);
        assert_eq!(
            Value::parse(VarType::StringList, "['a', \"b c\"]").expect("strings"),
            Value::StringList(vec!["a".into(), "b c".into()])
        );
        assert!(Value::parse(VarType::IntList, "1, 2").is_err());
        assert!(Value::parse(VarType::BoolList, "[True, nope]").is_err());
    }

    #[test]
    fn string_literals_keep_surrounding_text() {
        let parse = |text: &str| Value::parse(VarType::String, text).expect("string");
        assert_eq!(parse(" x "), Value::String(" x ".into()));
        assert_eq!(parse("'x'"), Value::String("x".into()));
        assert_eq!(parse(" 'x' "), Value::String(" 'x' ".into()));
        assert_eq!(parse("\"a b\""), Value::String("a b".into()));
        assert_eq!(parse("'x\""), Value::String("'x\"".into()));
    }

    #[test]
    fn element_writes_append_overwrite_or_reject() {
        let mut list = Value::IntList(vec![1]);
        list.set_element("xs", 1, "2").expect("append");
        list.set_element("xs", 0, "9").expect("overwrite");
        assert_eq!(list, Value::IntList(vec![9, 2]));

        let err = list.set_element("xs", 5, "7").expect_err("gap");
        assert!(matches!(
            err,
            RuntimeError::IndexOutOfRange { index: 5, len: 2, .. }
        ));
        assert_eq!(list, Value::IntList(vec![9, 2]));

        assert!(list.set_element("xs", 0, "nine").is_err());
        assert!(Value::Int(1).set_element("x", 0, "1").is_err());
    }
}
