//! Positional body templates.
//!
//! Templates reference captured groups by 1-based position, either as
//! `{1}` or as `%1$s`. `{{1}}` produces the literal text `{1}` and `%%` a
//! literal percent sign; every other brace is plain text, so JSON bodies
//! need no escaping. A placeholder pointing past the captured groups is
//! left in the output as written.

use crate::response::{ResponseBody, ResponseDefinition};

#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplateSegment {
    Literal(String),
    Placeholder { index: usize, raw: String },
}

/// Parsed body template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyTemplate {
    segments: Vec<TemplateSegment>,
}

impl BodyTemplate {
    pub fn parse(template: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = template;

        while let Some(ch) = rest.chars().next() {
            if let Some((escaped, len)) = escape_at(rest) {
                literal.push_str(escaped);
                rest = &rest[len..];
                continue;
            }
            if let Some((index, len)) = placeholder_at(rest) {
                if !literal.is_empty() {
                    segments.push(TemplateSegment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(TemplateSegment::Placeholder {
                    index,
                    raw: rest[..len].to_string(),
                });
                rest = &rest[len..];
                continue;
            }
            literal.push(ch);
            rest = &rest[ch.len_utf8()..];
        }

        if !literal.is_empty() {
            segments.push(TemplateSegment::Literal(literal));
        }

        Self { segments }
    }

    pub fn render(&self, groups: &[String]) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                TemplateSegment::Literal(text) => out.push_str(text),
                TemplateSegment::Placeholder { index, raw } => {
                    match index.checked_sub(1).and_then(|i| groups.get(i)) {
                        Some(value) => out.push_str(value),
                        None => out.push_str(raw),
                    }
                }
            }
        }
        out
    }
}

// `%%`, or a doubled-brace placeholder such as `{{12}}`. Returns the
// literal text and the number of bytes consumed.
fn escape_at(s: &str) -> Option<(&str, usize)> {
    if s.starts_with("%%") {
        return Some(("%", 2));
    }
    let body = s.strip_prefix("{{")?;
    let digits = body.bytes().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 || !body[digits..].starts_with("}}") {
        return None;
    }
    Some((&s[1..digits + 3], digits + 4))
}

// Returns the 1-based index and the byte length of a placeholder at the
// start of `s`.
fn placeholder_at(s: &str) -> Option<(usize, usize)> {
    let (open, close) = if s.starts_with('{') {
        ("{", "}")
    } else if s.starts_with('%') {
        ("%", "$s")
    } else {
        return None;
    };
    let body = &s[open.len()..];
    let digits = body.bytes().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 || !body[digits..].starts_with(close) {
        return None;
    }
    let index = body[..digits].parse().ok()?;
    Some((index, open.len() + digits + close.len()))
}

/// Binds captured groups into response bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseResolver;

impl ResponseResolver {
    pub fn new() -> Self {
        Self
    }

    /// Produce the response to send. Only a template body changes; every
    /// other field is copied and `response` itself is left untouched.
    pub fn resolve(&self, response: &ResponseDefinition, groups: &[String]) -> ResponseDefinition {
        match response.body() {
            ResponseBody::Template(template) => {
                let rendered = BodyTemplate::parse(template).render(groups);
                response.with_resolved_body(ResponseBody::Text(rendered))
            }
            _ => response.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::Fault;

    fn groups(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_printf_style_placeholders() {
        let template = BodyTemplate::parse("blah %1$s -> (%1$s) %2$s");
        assert_eq!(template.render(&groups(&["g1", "g2"])), "blah g1 -> (g1) g2");
    }

    #[test]
    fn test_brace_placeholders() {
        let template = BodyTemplate::parse(r#"{"id": "{1}", "page": {2}}"#);
        assert_eq!(template.render(&groups(&["42", "7"])), r#"{"id": "42", "page": 7}"#);
    }

    #[test]
    fn test_escapes() {
        let template = BodyTemplate::parse("{{1}} is {1}, 100%% and %%1$s");
        assert_eq!(template.render(&groups(&["one"])), "{1} is one, 100% and %1$s");
    }

    #[test]
    fn test_nested_json_braces_are_literal() {
        let template = BodyTemplate::parse(r#"{"user": {"id": {1}}}"#);
        assert_eq!(template.render(&groups(&["42"])), r#"{"user": {"id": 42}}"#);

        let template = BodyTemplate::parse(r#"{"a": {"b": 1}}"#);
        assert_eq!(template.render(&[]), r#"{"a": {"b": 1}}"#);

        let template = BodyTemplate::parse(r#"{"a":{"b":"%1$s"}}"#);
        assert_eq!(template.render(&groups(&["x"])), r#"{"a":{"b":"x"}}"#);

        let template = BodyTemplate::parse("{{}} {{a}} }}");
        assert_eq!(template.render(&[]), "{{}} {{a}} }}");
    }

    #[test]
    fn test_resolve_nested_json_template() {
        let mut stored = ResponseDefinition::ok();
        stored
            .set_body_template(r#"{"order": {"items": [{"sku": "{1}"}]}}"#)
            .unwrap();
        let resolved = ResponseResolver::new().resolve(&stored, &groups(&["pen"]));
        assert_eq!(
            resolved.body(),
            &ResponseBody::Text(r#"{"order": {"items": [{"sku": "pen"}]}}"#.into())
        );
    }

    #[test]
    fn test_out_of_range_placeholders_are_kept() {
        let template = BodyTemplate::parse("{0} {1} {3} %2$s");
        assert_eq!(template.render(&groups(&["a"])), "{0} a {3} %2$s");
    }

    #[test]
    fn test_incomplete_placeholders_are_literal() {
        let template = BodyTemplate::parse("{a} {12 %1 %s 50%");
        assert_eq!(template.render(&groups(&["x"])), "{a} {12 %1 %s 50%");
    }

    #[test]
    fn test_resolve_template_body() {
        let mut stored = ResponseDefinition::new(201)
            .with_header("Content-Type", "text/plain")
            .with_fixed_delay(10)
            .with_fault(Fault::EmptyResponse);
        stored.set_body_template("blah %1$s -> (%1$s) %2$s").unwrap();
        let before = stored.clone();

        let resolved = ResponseResolver::new().resolve(&stored, &groups(&["g1", "g2"]));
        assert_eq!(resolved.body(), &ResponseBody::Text("blah g1 -> (g1) g2".into()));
        assert_eq!(resolved.status(), 201);
        assert_eq!(resolved.headers(), stored.headers());
        assert_eq!(resolved.fixed_delay_milliseconds(), Some(10));
        assert_eq!(resolved.fault(), Some(Fault::EmptyResponse));
        assert!(resolved.was_configured());
        assert_eq!(stored, before);
    }

    #[test]
    fn test_non_template_bodies_pass_through() {
        let resolver = ResponseResolver::new();
        let captured = groups(&["ignored"]);

        let text = ResponseDefinition::with_text(200, "%1$s stays");
        assert_eq!(resolver.resolve(&text, &captured), text);

        let mut binary = ResponseDefinition::ok();
        binary.set_binary_body(vec![1, 2, 3]).unwrap();
        assert_eq!(resolver.resolve(&binary, &captured), binary);

        let mut file = ResponseDefinition::ok();
        file.set_body_file_name("body.json").unwrap();
        assert_eq!(resolver.resolve(&file, &captured), file);

        let unmatched = ResponseDefinition::not_configured();
        assert_eq!(resolver.resolve(&unmatched, &[]), unmatched);
    }
}
