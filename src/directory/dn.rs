// src/directory/dn.rs

//! Построение и разбор DN (RFC 4514).

/// Экранирует значение RDN
pub fn escape_value(value: &str) -> String {
    let last = value.chars().count().saturating_sub(1);
    let mut out = String::with_capacity(value.len() + 8);
    for (i, c) in value.chars().enumerate() {
        match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                out.push('\\');
                out.push(c);
            }
            '#' if i == 0 => out.push_str("\\#"),
            ' ' if i == 0 || i == last => out.push_str("\\ "),
            '\0' => out.push_str("\\00"),
            _ => out.push(c),
        }
    }
    out
}

/// `<attr>=<value>,<parent>`
pub fn child_dn(attr: &str, value: &str, parent_dn: &str) -> String {
    if parent_dn.is_empty() {
        format!("{}={}", attr, escape_value(value))
    } else {
        format!("{}={},{}", attr, escape_value(value), parent_dn)
    }
}

/// DN родителя: всё после первой неэкранированной запятой
pub fn parent_dn(dn: &str) -> Option<&str> {
    let mut escaped = false;
    for (i, c) in dn.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            ',' => return Some(dn[i + 1..].trim_start()),
            _ => {}
        }
    }
    None
}

/// Количество RDN в DN
pub fn depth(dn: &str) -> usize {
    let mut count = 0;
    let mut current = Some(dn);
    while let Some(d) = current.filter(|d| !d.is_empty()) {
        count += 1;
        current = parent_dn(d);
    }
    count
}

/// Нормальная форма для сравнения: нижний регистр, без пробелов вокруг запятых
pub fn normalize(dn: &str) -> String {
    let mut out = String::with_capacity(dn.len());
    let mut escaped = false;
    let mut chars = dn.trim().chars().peekable();
    while let Some(c) = chars.next() {
        if escaped {
            escaped = false;
            out.extend(c.to_lowercase());
            continue;
        }
        match c {
            '\\' => {
                escaped = true;
                out.push(c);
            }
            ',' => {
                while out.ends_with(' ') && !out.ends_with("\\ ") {
                    out.pop();
                }
                out.push(',');
                while chars.peek() == Some(&' ') {
                    chars.next();
                }
            }
            _ => out.extend(c.to_lowercase()),
        }
    }
    out
}

pub fn eq(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}
