#![forbid(unsafe_code)]

//! Entity escaping for C14N output.
//!
//! Canonical XML escapes:
//! - Text nodes: `&` → `&amp;`, `<` → `&lt;`, `>` → `&gt;`, `\r` → `&#xD;`
//! - Attribute values: `&`, `<`, `"` plus the whitespace characters `\t`, `\n`, `\r`
//!
//! Comment and processing-instruction content is written unchanged.

#[derive(Clone, Copy)]
enum Context {
    Text,
    Attribute,
}

fn escape(s: &str, context: Context) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        let entity = match (context, ch) {
            (_, '&') => "&amp;",
            (_, '<') => "&lt;",
            (Context::Text, '>') => "&gt;",
            (Context::Attribute, '"') => "&quot;",
            (Context::Attribute, '\t') => "&#x9;",
            (Context::Attribute, '\n') => "&#xA;",
            (_, '\r') => "&#xD;",
            _ => {
                out.push(ch);
                continue;
            }
        };
        out.push_str(entity);
    }
    out
}

/// Escape text node content per C14N rules.
pub fn escape_text(s: &str) -> String {
    escape(s, Context::Text)
}

/// Escape attribute value per C14N rules.
pub fn escape_attr(s: &str) -> String {
    escape(s, Context::Attribute)
}
