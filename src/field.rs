//! Field references: `{{Location::value}} {Section::value} Field Name[2]`.
//!
//! Both groups and the trailing instance are optional. A backslash makes the
//! next `{`, `}`, `[`, `]` or `\` literal, so a field name may start with a
//! brace or end in a bracket without being read as a group or an instance.
//! Input that does not fit the grammar is never an error: the whole trimmed
//! string becomes the field name.

use std::collections::HashMap;
use std::fmt;

/// Runtime binding keys available to strategy templates as `#{key}`.
pub mod keys {
    pub const FIELD_NAME: &str = "fieldName";
    pub const FIELD_NAME_LOWER: &str = "fieldName.lowercase";
    pub const FIELD_INSTANCE: &str = "fieldInstance";
    pub const LOCATION_NAME: &str = "location.name";
    pub const LOCATION_VALUE: &str = "location.value";
    pub const SECTION_NAME: &str = "section.name";
    pub const SECTION_VALUE: &str = "section.value";
    /// Identifier captured from a label's indirection attribute.
    pub const FOR_ID: &str = "forId";
}

/// A parsed logical element reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldReference {
    pub location_name: String,
    pub location_value: String,
    pub section_name: String,
    pub section_value: String,
    pub field_name: String,
    /// 1-based occurrence index.
    pub instance: u32,
}

impl FieldReference {
    /// Parse a raw field string. Never fails.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let chars = scan(trimmed);
        parse_chars(&chars).unwrap_or_else(|| Self::literal(text(&chars).trim()))
    }

    /// A reference with only a field name.
    pub fn literal(field_name: &str) -> Self {
        Self {
            location_name: String::new(),
            location_value: String::new(),
            section_name: String::new(),
            section_value: String::new(),
            field_name: field_name.to_string(),
            instance: 1,
        }
    }

    /// Whether a location or section narrows the search.
    pub fn is_scoped(&self) -> bool {
        !self.location_name.is_empty() || !self.section_name.is_empty()
    }

    /// Runtime bindings published for strategy templates.
    pub fn bindings(&self) -> Bindings {
        let mut bindings = Bindings::default();
        bindings.insert(keys::FIELD_NAME, &self.field_name);
        bindings.insert(keys::FIELD_NAME_LOWER, &self.field_name.to_lowercase());
        bindings.insert(keys::FIELD_INSTANCE, &self.instance.to_string());
        bindings.insert(keys::LOCATION_NAME, &self.location_name);
        bindings.insert(keys::LOCATION_VALUE, &self.location_value);
        bindings.insert(keys::SECTION_NAME, &self.section_name);
        bindings.insert(keys::SECTION_VALUE, &self.section_value);
        bindings
    }
}

impl fmt::Display for FieldReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.location_name.is_empty() {
            f.write_str("{{")?;
            write_group(f, &self.location_name, &self.location_value)?;
            f.write_str("}} ")?;
        }
        if !self.section_name.is_empty() {
            f.write_str("{")?;
            write_group(f, &self.section_name, &self.section_value)?;
            f.write_str("} ")?;
        }
        f.write_str(&self.field_name)?;
        if self.instance != 1 {
            write!(f, "[{}]", self.instance)?;
        }
        Ok(())
    }
}

fn write_group(f: &mut fmt::Formatter<'_>, name: &str, value: &str) -> fmt::Result {
    f.write_str(name)?;
    if !value.is_empty() {
        write!(f, "::{}", value)?;
    }
    Ok(())
}

/// Runtime bindings for one resolution call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings(HashMap<String, String>);

impl Bindings {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        self.0.insert(key.to_string(), value.to_string());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
struct Ch {
    c: char,
    escaped: bool,
}

fn scan(input: &str) -> Vec<Ch> {
    let mut out = Vec::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if matches!(next, '{' | '}' | '[' | ']' | '\\') {
                    chars.next();
                    out.push(Ch {
                        c: next,
                        escaped: true,
                    });
                    continue;
                }
            }
        }
        out.push(Ch { c, escaped: false });
    }
    out
}

fn is(chars: &[Ch], pos: usize, c: char) -> bool {
    chars.get(pos).is_some_and(|ch| !ch.escaped && ch.c == c)
}

fn text(chars: &[Ch]) -> String {
    chars.iter().map(|ch| ch.c).collect()
}

fn skip_ws(chars: &[Ch], mut pos: usize) -> usize {
    while chars.get(pos).is_some_and(|ch| ch.c.is_whitespace()) {
        pos += 1;
    }
    pos
}

fn find(chars: &[Ch], from: usize, c: char) -> Option<usize> {
    (from..chars.len()).find(|&i| is(chars, i, c))
}

fn find_pair(chars: &[Ch], from: usize, c: char) -> Option<usize> {
    (from..chars.len().saturating_sub(1)).find(|&i| is(chars, i, c) && is(chars, i + 1, c))
}

/// `Name::value` → (name, value), both trimmed. Empty names are malformed.
fn split_group(chars: &[Ch]) -> Option<(String, String)> {
    let (name, value) = match find_pair(chars, 0, ':') {
        Some(i) => (text(&chars[..i]), text(&chars[i + 2..])),
        None => (text(chars), String::new()),
    };
    let name = name.trim().to_string();
    if name.is_empty() {
        return None;
    }
    Some((name, value.trim().to_string()))
}

fn parse_chars(chars: &[Ch]) -> Option<FieldReference> {
    let mut reference = FieldReference::literal("");
    let mut pos = skip_ws(chars, 0);

    if is(chars, pos, '{') && is(chars, pos + 1, '{') {
        let close = find_pair(chars, pos + 2, '}')?;
        let (name, value) = split_group(&chars[pos + 2..close])?;
        reference.location_name = name;
        reference.location_value = value;
        pos = skip_ws(chars, close + 2);
    }

    if is(chars, pos, '{') && !is(chars, pos + 1, '{') {
        let close = find(chars, pos + 1, '}')?;
        let (name, value) = split_group(&chars[pos + 1..close])?;
        reference.section_name = name;
        reference.section_value = value;
        pos = skip_ws(chars, close + 1);
    }

    let mut rest = &chars[pos..];
    while rest.last().is_some_and(|ch| ch.c.is_whitespace()) {
        rest = &rest[..rest.len() - 1];
    }

    if let Some((instance, open)) = trailing_instance(rest) {
        reference.instance = instance;
        rest = &rest[..open];
    }

    reference.field_name = text(rest).trim().to_string();
    if reference.field_name.is_empty() {
        return None;
    }
    Some(reference)
}

/// `Name[3]` → (3, index of `[`). Zero and non-numeric brackets belong to the name.
fn trailing_instance(chars: &[Ch]) -> Option<(u32, usize)> {
    let last = chars.len().checked_sub(1)?;
    if !is(chars, last, ']') {
        return None;
    }
    let open = (0..last).rev().find(|&i| is(chars, i, '['))?;
    let digits = text(&chars[open + 1..last]);
    let digits = digits.trim();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let instance: u32 = digits.parse().ok()?;
    (instance > 0).then_some((instance, open))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_name() {
        let r = FieldReference::parse("  Submit  ");
        assert_eq!(r, FieldReference::literal("Submit"));
        assert!(!r.is_scoped());
    }

    #[test]
    fn parse_full_reference() {
        let r = FieldReference::parse("{{Login Form::main}} {Credentials::left} User Name[2]");
        assert_eq!(r.location_name, "Login Form");
        assert_eq!(r.location_value, "main");
        assert_eq!(r.section_name, "Credentials");
        assert_eq!(r.section_value, "left");
        assert_eq!(r.field_name, "User Name");
        assert_eq!(r.instance, 2);
        assert!(r.is_scoped());
    }

    #[test]
    fn parse_recovers_every_component_combination() {
        for location in [None, Some(("Header", "")), Some(("Header", "top"))] {
            for section in [None, Some(("Nav", "")), Some(("Nav", "v2"))] {
                for instance in [None, Some(1u32), Some(7)] {
                    let mut raw = String::new();
                    if let Some((l, lv)) = location {
                        raw.push_str(&format!("{{{{{}{}}}}} ", l, fmt_value(lv)));
                    }
                    if let Some((s, sv)) = section {
                        raw.push_str(&format!("{{{}{}}} ", s, fmt_value(sv)));
                    }
                    raw.push_str("Save Draft");
                    if let Some(n) = instance {
                        raw.push_str(&format!("[{}]", n));
                    }

                    let r = FieldReference::parse(&raw);
                    assert_eq!(r.location_name, location.map_or("", |l| l.0), "{raw}");
                    assert_eq!(r.location_value, location.map_or("", |l| l.1), "{raw}");
                    assert_eq!(r.section_name, section.map_or("", |s| s.0), "{raw}");
                    assert_eq!(r.section_value, section.map_or("", |s| s.1), "{raw}");
                    assert_eq!(r.field_name, "Save Draft", "{raw}");
                    assert_eq!(r.instance, instance.unwrap_or(1), "{raw}");
                }
            }
        }
    }

    fn fmt_value(v: &str) -> String {
        if v.is_empty() {
            String::new()
        } else {
            format!("::{}", v)
        }
    }

    #[test]
    fn groups_are_trimmed() {
        let r = FieldReference::parse("{{  Cart  ::  mini }}{ Totals } Checkout");
        assert_eq!(r.location_name, "Cart");
        assert_eq!(r.location_value, "mini");
        assert_eq!(r.section_name, "Totals");
        assert_eq!(r.field_name, "Checkout");
    }

    #[test]
    fn section_without_location() {
        let r = FieldReference::parse("{Sidebar} Logout");
        assert!(r.location_name.is_empty());
        assert_eq!(r.section_name, "Sidebar");
        assert_eq!(r.field_name, "Logout");
    }

    #[test]
    fn zero_or_text_brackets_stay_in_name() {
        assert_eq!(FieldReference::parse("Item[0]").field_name, "Item[0]");
        assert_eq!(FieldReference::parse("Item[abc]").field_name, "Item[abc]");
        assert_eq!(FieldReference::parse("Item[0]").instance, 1);
    }

    #[test]
    fn escaped_brackets_are_literal() {
        let r = FieldReference::parse(r"Matrix\[3\]");
        assert_eq!(r.field_name, "Matrix[3]");
        assert_eq!(r.instance, 1);

        let r = FieldReference::parse(r"Matrix\[3\][2]");
        assert_eq!(r.field_name, "Matrix[3]");
        assert_eq!(r.instance, 2);
    }

    #[test]
    fn escaped_braces_are_literal() {
        let r = FieldReference::parse(r"\{\{Not a location\}\} Name");
        assert!(r.location_name.is_empty());
        assert_eq!(r.field_name, "{{Not a location}} Name");

        let r = FieldReference::parse(r"{Form} \{json\}");
        assert_eq!(r.section_name, "Form");
        assert_eq!(r.field_name, "{json}");
    }

    #[test]
    fn braces_inside_name_need_no_escape() {
        let r = FieldReference::parse("Price {USD}");
        assert!(r.section_name.is_empty());
        assert_eq!(r.field_name, "Price {USD}");
    }

    #[test]
    fn malformed_falls_back_to_literal() {
        for raw in ["{{Unclosed Submit", "{Unclosed Submit", "{{Only Location}}", "{{}} Name", "{::x} Name"] {
            let r = FieldReference::parse(raw);
            assert_eq!(r, FieldReference::literal(raw.trim()), "{raw}");
        }
    }

    #[test]
    fn malformed_literal_still_decodes_escapes() {
        let r = FieldReference::parse(r"{{Open \[x\]");
        assert_eq!(r.field_name, "{{Open [x]");
        assert_eq!(r.instance, 1);
        assert!(!r.is_scoped());
    }

    #[test]
    fn backslash_before_other_chars_is_kept() {
        let r = FieldReference::parse(r"C:\temp");
        assert_eq!(r.field_name, r"C:\temp");
    }

    #[test]
    fn bindings_cover_runtime_keys() {
        let r = FieldReference::parse("{{Header::top}} {Nav} Sign In[3]");
        let b = r.bindings();
        assert_eq!(b.get(keys::FIELD_NAME), Some("Sign In"));
        assert_eq!(b.get(keys::FIELD_NAME_LOWER), Some("sign in"));
        assert_eq!(b.get(keys::FIELD_INSTANCE), Some("3"));
        assert_eq!(b.get(keys::LOCATION_NAME), Some("Header"));
        assert_eq!(b.get(keys::LOCATION_VALUE), Some("top"));
        assert_eq!(b.get(keys::SECTION_NAME), Some("Nav"));
        assert_eq!(b.get(keys::SECTION_VALUE), Some(""));
        assert!(b.get(keys::FOR_ID).is_none());
        assert_eq!(b.len(), 7);
        assert!(!b.is_empty());
        assert!(Bindings::default().is_empty());
    }

    #[test]
    fn display_round_trips_simple_forms() {
        let raw = "{{Header::top}} {Nav} Sign In[3]";
        let r = FieldReference::parse(raw);
        assert_eq!(r.to_string(), raw);
        assert_eq!(FieldReference::parse(&r.to_string()), r);
    }
}
