//! Just enough HTML handling for the fragments the overlay writes into fields:
//! plain text, `<li>` lists and tag groups. Anything else is treated as opaque
//! markup and only ever stripped down to its text.

use serde::{Deserialize, Serialize};

pub const TAG_GROUP_CLASS: &str = "tag-group";
pub const TAG_CLASS: &str = "tag";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagGroup {
    pub name: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open {
        name: String,
        classes: Vec<String>,
        /// Void (`<br>`) or self-closed (`<x/>`); never gets a matching close.
        empty: bool,
    },
    Close { name: String },
    Text(String),
}

const VOID_ELEMENTS: [&str; 8] = ["br", "hr", "img", "input", "meta", "link", "source", "wbr"];

/// Index of the `>` ending the tag that starts at `tag[0]`, skipping quoted values.
fn tag_end(tag: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in tag.char_indices().skip(1) {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return Some(i),
            _ => {}
        }
    }
    None
}

fn tokenize(html: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = html;

    while !rest.is_empty() {
        match rest.find('<') {
            Some(0) => {
                let Some(end) = tag_end(rest) else {
                    // Unterminated tag: keep the remainder as text.
                    tokens.push(Token::Text(unescape_html(rest)));
                    break;
                };
                let inner = rest[1..end].trim();
                rest = &rest[end + 1..];

                if let Some(name) = inner.strip_prefix('/') {
                    tokens.push(Token::Close {
                        name: name.trim().to_ascii_lowercase(),
                    });
                } else if !inner.starts_with('!') {
                    let self_closed = inner.ends_with('/');
                    let inner = inner.trim_end_matches('/');
                    let name_len = inner
                        .find(|c: char| c.is_whitespace())
                        .unwrap_or(inner.len());
                    let name = inner[..name_len].to_ascii_lowercase();
                    let classes = attributes(&inner[name_len..])
                        .into_iter()
                        .find(|(attr, _)| attr.eq_ignore_ascii_case("class"))
                        .map(|(_, value)| value.split_whitespace().map(str::to_string).collect())
                        .unwrap_or_default();
                    let empty = self_closed || VOID_ELEMENTS.contains(&name.as_str());
                    tokens.push(Token::Open {
                        name,
                        classes,
                        empty,
                    });
                }
            }
            Some(start) => {
                tokens.push(Token::Text(unescape_html(&rest[..start])));
                rest = &rest[start..];
            }
            None => {
                tokens.push(Token::Text(unescape_html(rest)));
                break;
            }
        }
    }

    tokens
}

/// `name="value"`, `name='value'`, `name=value` and bare `name` attributes.
fn attributes(mut rest: &str) -> Vec<(&str, &str)> {
    let mut attrs = Vec::new();
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        let name_len = rest
            .find(|c: char| c.is_whitespace() || c == '=')
            .unwrap_or(rest.len());
        let name = &rest[..name_len];
        rest = rest[name_len..].trim_start();

        let Some(after_eq) = rest.strip_prefix('=') else {
            if !name.is_empty() {
                attrs.push((name, ""));
            }
            if name_len == 0 {
                break;
            }
            continue;
        };
        let after_eq = after_eq.trim_start();
        let (value, remaining) = match after_eq.chars().next() {
            Some(q @ ('"' | '\'')) => {
                let body = &after_eq[1..];
                let close = body.find(q).unwrap_or(body.len());
                (&body[..close], body.get(close + 1..).unwrap_or(""))
            }
            _ => {
                let len = after_eq
                    .find(char::is_whitespace)
                    .unwrap_or(after_eq.len());
                (&after_eq[..len], &after_eq[len..])
            }
        };
        attrs.push((name, value));
        rest = remaining;
    }
    attrs
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Visible text of a fragment. `<br>` becomes a newline.
pub fn strip_tags(html: &str) -> String {
    let mut out = String::new();
    for token in tokenize(html) {
        match token {
            Token::Text(text) => out.push_str(&text),
            Token::Open { name, .. } if name == "br" => out.push('\n'),
            _ => {}
        }
    }
    out
}

pub fn has_list_marker(html: &str) -> bool {
    tokenize(html)
        .iter()
        .any(|t| matches!(t, Token::Open { name, .. } if name == "li"))
}

pub fn has_tag_group_marker(html: &str) -> bool {
    tokenize(html).iter().any(|t| match t {
        Token::Open { classes, .. } => classes.iter().any(|c| c == TAG_GROUP_CLASS),
        _ => false,
    })
}

/// Text of every `<li>`, in order.
pub fn list_items(html: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current: Option<String> = None;

    for token in tokenize(html) {
        match token {
            Token::Open { name, .. } if name == "li" => {
                if let Some(item) = current.take() {
                    items.push(item.trim().to_string());
                }
                current = Some(String::new());
            }
            Token::Close { name } if name == "li" => {
                if let Some(item) = current.take() {
                    items.push(item.trim().to_string());
                }
            }
            Token::Text(text) => {
                if let Some(item) = current.as_mut() {
                    item.push_str(&text);
                }
            }
            _ => {}
        }
    }
    if let Some(item) = current {
        items.push(item.trim().to_string());
    }

    items
}

pub fn render_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("<li>{}</li>", escape_html(item)))
        .collect()
}

pub fn tag_groups(html: &str) -> Vec<TagGroup> {
    #[derive(PartialEq)]
    enum Capture {
        None,
        Title,
        Tag,
    }

    let mut groups: Vec<TagGroup> = Vec::new();
    let mut capture = Capture::None;
    // Elements opened inside the captured one and not yet closed.
    let mut depth = 0usize;
    let mut buffer = String::new();

    for token in tokenize(html) {
        match token {
            Token::Open { empty, .. } if capture != Capture::None => {
                if !empty {
                    depth += 1;
                }
            }
            Token::Open {
                name,
                classes,
                empty,
            } => {
                if classes.iter().any(|c| c == TAG_GROUP_CLASS) {
                    groups.push(TagGroup {
                        name: String::new(),
                        tags: Vec::new(),
                    });
                } else if empty {
                    continue;
                } else if classes.iter().any(|c| c == TAG_CLASS) {
                    capture = Capture::Tag;
                    depth = 0;
                    buffer.clear();
                } else if is_heading(&name) && !groups.is_empty() {
                    capture = Capture::Title;
                    depth = 0;
                    buffer.clear();
                }
            }
            Token::Text(text) if capture != Capture::None => buffer.push_str(&text),
            Token::Close { .. } if capture != Capture::None => {
                if depth > 0 {
                    depth -= 1;
                    continue;
                }
                let text = buffer.trim().to_string();
                if let Some(group) = groups.last_mut() {
                    if capture == Capture::Title {
                        group.name = text;
                    } else if !text.is_empty() {
                        group.tags.push(text);
                    }
                } else if capture == Capture::Tag && !text.is_empty() {
                    groups.push(TagGroup {
                        name: String::new(),
                        tags: vec![text],
                    });
                }
                capture = Capture::None;
            }
            _ => {}
        }
    }

    groups
}

fn is_heading(name: &str) -> bool {
    matches!(name, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

pub fn render_tag_groups(groups: &[TagGroup]) -> String {
    groups
        .iter()
        .map(|group| {
            let tags: String = group
                .tags
                .iter()
                .map(|tag| format!("<span class=\"{TAG_CLASS}\">{}</span>", escape_html(tag)))
                .collect();
            format!(
                "<div class=\"{TAG_GROUP_CLASS}\"><h4>{}</h4><div class=\"tags\">{tags}</div></div>",
                escape_html(&group.name)
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markup_and_entities() {
        assert_eq!(strip_tags("<b>Tom &amp; Jerry</b><br/>ok"), "Tom & Jerry\nok");
        assert_eq!(strip_tags("no markup"), "no markup");
    }

    #[test]
    fn reads_list_items_back() {
        let html = render_list(&["Kubernetes".to_string(), "a < b".to_string()]);
        assert!(has_list_marker(&html));
        assert_eq!(list_items(&html), vec!["Kubernetes", "a < b"]);
    }

    #[test]
    fn reads_hand_written_tag_groups() {
        let html = r#"<div class='tag-group primary'><h3>Cloud</h3>
            <span class="tag">AWS</span><span class="tag">Azure</span></div>"#;
        assert!(has_tag_group_marker(html));
        assert_eq!(
            tag_groups(html),
            vec![TagGroup {
                name: "Cloud".to_string(),
                tags: vec!["AWS".to_string(), "Azure".to_string()],
            }]
        );
    }

    #[test]
    fn nested_markup_and_quoted_brackets_inside_tags() {
        let html = r#"<div class="tag-group" title="a > b"><h4>Cloud <em>native</em></h4>
            <span class="tag"><b>AWS</b> Lambda</span><span data-class="tag">skip</span><span class="tag">GCP<br>Run</span></div>"#;
        assert_eq!(
            tag_groups(html),
            vec![TagGroup {
                name: "Cloud native".to_string(),
                tags: vec!["AWS Lambda".to_string(), "GCPRun".to_string()],
            }]
        );
        assert!(!has_tag_group_marker(r#"<div data-class="tag-group">x</div>"#));
        assert_eq!(strip_tags(r#"<a title="1 > 0">link</a>"#), "link");
    }

    #[test]
    fn plain_tag_class_is_not_a_group_marker() {
        assert!(!has_tag_group_marker(r#"<span class="tag">AWS</span>"#));
    }
}
