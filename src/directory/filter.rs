// src/directory/filter.rs

use crate::directory::{dn, Entry};
use thiserror::Error;

/// LDAP-фильтр (RFC 4515)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Equality(String, String),
    Substring(String, Vec<String>),
    GreaterOrEqual(String, String),
    LessOrEqual(String, String),
    ApproxMatch(String, String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Present(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("Invalid filter syntax: {0}")]
    InvalidSyntax(String),
    #[error("Unbalanced parentheses in {0}")]
    Unbalanced(String),
    #[error("Invalid escape sequence in {0}")]
    InvalidEscape(String),
}

impl Filter {
    /// Разбирает фильтр из строки (например, "(uid=jdoe)")
    pub fn parse(s: &str) -> Result<Self, FilterError> {
        let s = s.trim();
        if !s.starts_with('(') || !s.ends_with(')') || s.len() < 3 {
            return Err(FilterError::InvalidSyntax(s.to_string()));
        }
        Self::parse_inner(&s[1..s.len() - 1])
    }

    fn parse_inner(s: &str) -> Result<Self, FilterError> {
        match s.chars().next() {
            Some('&') => Self::parse_list(&s[1..]).map(Filter::And),
            Some('|') => Self::parse_list(&s[1..]).map(Filter::Or),
            Some('!') => Ok(Filter::Not(Box::new(Self::parse(&s[1..])?))),
            Some(_) => Self::parse_item(s),
            None => Err(FilterError::InvalidSyntax(s.to_string())),
        }
    }

    fn parse_item(s: &str) -> Result<Self, FilterError> {
        let eq_pos = s.find('=').ok_or_else(|| FilterError::InvalidSyntax(s.to_string()))?;
        let (lhs, raw_value) = (&s[..eq_pos], &s[eq_pos + 1..]);

        let (attr, op) = match lhs.chars().last() {
            Some(c @ ('>' | '<' | '~')) => (&lhs[..lhs.len() - 1], Some(c)),
            _ => (lhs, None),
        };
        let attr = attr.trim();
        if attr.is_empty() {
            return Err(FilterError::InvalidSyntax(s.to_string()));
        }
        let attr = attr.to_string();

        match op {
            Some('>') => Ok(Filter::GreaterOrEqual(attr, unescape(raw_value)?)),
            Some('<') => Ok(Filter::LessOrEqual(attr, unescape(raw_value)?)),
            Some(_) => Ok(Filter::ApproxMatch(attr, unescape(raw_value)?)),
            None if raw_value == "*" => Ok(Filter::Present(attr)),
            None if raw_value.contains('*') => {
                let parts = raw_value
                    .split('*')
                    .map(unescape)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Filter::Substring(attr, parts))
            }
            None => Ok(Filter::Equality(attr, unescape(raw_value)?)),
        }
    }

    fn parse_list(s: &str) -> Result<Vec<Filter>, FilterError> {
        let mut filters = Vec::new();
        let mut depth = 0usize;
        let mut start = 0;

        for (i, ch) in s.char_indices() {
            match ch {
                '(' => {
                    if depth == 0 {
                        start = i;
                    }
                    depth += 1;
                }
                ')' => {
                    if depth == 0 {
                        return Err(FilterError::Unbalanced(s.to_string()));
                    }
                    depth -= 1;
                    if depth == 0 {
                        filters.push(Filter::parse(&s[start..=i])?);
                    }
                }
                c if depth == 0 && !c.is_whitespace() => {
                    return Err(FilterError::InvalidSyntax(s.to_string()));
                }
                _ => {}
            }
        }

        if depth != 0 {
            return Err(FilterError::Unbalanced(s.to_string()));
        }
        if filters.is_empty() {
            return Err(FilterError::InvalidSyntax(s.to_string()));
        }
        Ok(filters)
    }

    /// Проверяет, соответствует ли запись фильтру.
    /// Значения сравниваются без учёта регистра; `entryDN` — виртуальный атрибут.
    pub fn matches(&self, entry: &Entry) -> bool {
        match self {
            Filter::Equality(attr, value) | Filter::ApproxMatch(attr, value) => {
                if attr.eq_ignore_ascii_case("entryDN") {
                    return dn::eq(&entry.dn, value);
                }
                values_of(entry, attr).iter().any(|v| v.eq_ignore_ascii_case(value))
            }
            Filter::Substring(attr, parts) => values_of(entry, attr)
                .iter()
                .any(|v| matches_substring(&v.to_lowercase(), parts)),
            Filter::GreaterOrEqual(attr, value) => values_of(entry, attr)
                .iter()
                .any(|v| v.to_lowercase() >= value.to_lowercase()),
            Filter::LessOrEqual(attr, value) => values_of(entry, attr)
                .iter()
                .any(|v| v.to_lowercase() <= value.to_lowercase()),
            Filter::Present(attr) => {
                attr.eq_ignore_ascii_case("entryDN") || entry.get(attr).is_some()
            }
            Filter::And(filters) => filters.iter().all(|f| f.matches(entry)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(entry)),
            Filter::Not(filter) => !filter.matches(entry),
        }
    }
}

fn values_of<'a>(entry: &'a Entry, attr: &str) -> &'a [String] {
    entry.get(attr).unwrap_or(&[])
}

/// `parts` — куски между `*`: первый якорится в начале, последний в конце
fn matches_substring(value: &str, parts: &[String]) -> bool {
    let Some((first, rest)) = parts.split_first() else {
        return true;
    };
    let first = first.to_lowercase();
    if !value.starts_with(&first) {
        return false;
    }
    let mut pos = first.len();
    let Some((last, middle)) = rest.split_last() else {
        return value.len() == pos;
    };
    for part in middle {
        let part = part.to_lowercase();
        match value[pos..].find(&part) {
            Some(found) => pos += found + part.len(),
            None => return false,
        }
    }
    value[pos..].ends_with(&last.to_lowercase())
}

/// Экранирует значение для подстановки в фильтр
pub fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '*' => out.push_str("\\2a"),
            '(' => out.push_str("\\28"),
            ')' => out.push_str("\\29"),
            '\\' => out.push_str("\\5c"),
            '\0' => out.push_str("\\00"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(value: &str) -> Result<String, FilterError> {
    let mut bytes = Vec::with_capacity(value.len());
    let raw = value.as_bytes();
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'\\' {
            let hex_pair = value
                .get(i + 1..i + 3)
                .ok_or_else(|| FilterError::InvalidEscape(value.to_string()))?;
            let byte = u8::from_str_radix(hex_pair, 16)
                .map_err(|_| FilterError::InvalidEscape(value.to_string()))?;
            bytes.push(byte);
            i += 3;
        } else {
            bytes.push(raw[i]);
            i += 1;
        }
    }
    String::from_utf8(bytes).map_err(|_| FilterError::InvalidEscape(value.to_string()))
}
