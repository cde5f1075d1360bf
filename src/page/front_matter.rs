//! Front matter extraction.
//!
//! A document may open with a metadata block fenced by `---`:
//!
//! ```text
//! ---
//! layout: post
//! title: Hello
//! ---
//! <p>body</p>
//! ```
//!
//! Only the first block is special. The block is a flat YAML mapping; the
//! `layout` key names the next template to apply and every other key is a
//! page variable.

use super::error::RenderError;
use serde_yaml::Value;
use std::collections::BTreeMap;

/// Fence marker opening and closing the metadata block.
pub const FENCE: &str = "---";

/// Reserved key naming the layout that wraps this document.
pub const LAYOUT_KEY: &str = "layout";

/// Parsed metadata of one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    entries: BTreeMap<String, Value>,
}

impl FrontMatter {
    /// Name of the wrapping layout, if any.
    ///
    /// Scalar names such as `layout: 2024` are taken as text.
    pub fn layout(&self) -> Option<String> {
        self.entries
            .get(LAYOUT_KEY)
            .and_then(scalar_text)
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty())
    }

    /// Page variable rendered as text.
    ///
    /// `layout` is not a variable. Mappings and sequences have no text form.
    pub fn variable(&self, name: &str) -> Option<String> {
        if name == LAYOUT_KEY {
            return None;
        }
        self.entries.get(name).and_then(scalar_text)
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => Some(String::new()),
        Value::Tagged(tagged) => tagged.value.as_str().map(str::to_owned),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for FrontMatter {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// A document split into its metadata block and body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document<'a> {
    /// `None` when the document has no metadata block at all.
    pub metadata: Option<FrontMatter>,
    pub body: &'a str,
}

/// Split `text` into its optional metadata block and the remaining body.
///
/// Fails with [`RenderError::MalformedInput`] when the block is never
/// closed or is not a valid key/value mapping.
pub fn parse(text: &str) -> Result<Document<'_>, RenderError> {
    let Some(after_open) = text.strip_prefix(FENCE) else {
        return Ok(Document {
            metadata: None,
            body: text,
        });
    };

    let close = after_open
        .find(FENCE)
        .ok_or_else(|| RenderError::MalformedInput("unterminated metadata block".into()))?;

    let metadata = parse_block(&after_open[..close])?;

    let rest = &after_open[close + FENCE.len()..];
    let body = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    Ok(Document {
        metadata: Some(metadata),
        body,
    })
}

/// Parse the text between the fences as a flat mapping.
///
/// Indentation is not significant, so lines are trimmed before handing the
/// block to the YAML parser.
fn parse_block(block: &str) -> Result<FrontMatter, RenderError> {
    let normalized = block
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if normalized.is_empty() {
        return Ok(FrontMatter::default());
    }

    let value: Value = serde_yaml::from_str(&normalized)
        .map_err(|err| RenderError::MalformedInput(format!("invalid metadata block: {err}")))?;

    match value {
        Value::Null => Ok(FrontMatter::default()),
        Value::Mapping(mapping) => mapping
            .into_iter()
            .map(|(key, value)| Ok((key_to_string(key)?, value)))
            .collect(),
        _ => Err(RenderError::MalformedInput(
            "metadata block is not a key/value mapping".into(),
        )),
    }
}

fn key_to_string(key: Value) -> Result<String, RenderError> {
    match key {
        Value::String(s) => Ok(s),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(RenderError::MalformedInput(format!(
            "unsupported metadata key: {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "<html><head><title>Hello world</head><body><p>hi there</p></body></html>";

    fn meta(pairs: &[(&str, Value)]) -> FrontMatter {
        pairs.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    #[test]
    fn test_empty_string() {
        let doc = parse("").unwrap();
        assert_eq!(doc.metadata, None);
        assert_eq!(doc.body, "");
    }

    #[test]
    fn test_no_front_matter_is_identity() {
        for text in [BODY, "plain\ntext\n", " ---\nnot: fenced\n---\n", "--"] {
            let doc = parse(text).unwrap();
            assert_eq!(doc.metadata, None);
            assert_eq!(doc.body, text);
        }
    }

    #[test]
    fn test_layout() {
        let text = format!("---\nlayout: mylayout\n---\n{BODY}");
        let doc = parse(&text).unwrap();
        let metadata = doc.metadata.unwrap();
        assert_eq!(metadata.layout().as_deref(), Some("mylayout"));
        assert_eq!(metadata, meta(&[("layout", Value::from("mylayout"))]));
        assert_eq!(doc.body, BODY);
    }

    #[test]
    fn test_boolean_value() {
        let text = format!("---\npublished: false\n---\n{BODY}");
        let doc = parse(&text).unwrap();
        assert_eq!(doc.metadata, Some(meta(&[("published", Value::Bool(false))])));
        assert_eq!(doc.body, BODY);
    }

    #[test]
    fn test_custom_variable() {
        let text = format!("---\nfood: Pizza\n---\n{BODY}");
        let doc = parse(&text).unwrap();
        let metadata = doc.metadata.unwrap();
        assert_eq!(metadata.variable("food").as_deref(), Some("Pizza"));
        assert_eq!(metadata.layout(), None);
    }

    #[test]
    fn test_whitespace_is_insignificant() {
        let text = format!("---\n\t   food    : Pizza  \n\n\n---\n{BODY}");
        let doc = parse(&text).unwrap();
        assert_eq!(doc.metadata, Some(meta(&[("food", Value::from("Pizza"))])));
        assert_eq!(doc.body, BODY);
    }

    #[test]
    fn test_only_first_block_is_special() {
        let rest = "<body>\n---\ndrink: Cola\n---\n<p>hi there</p></body>";
        let text = format!("---\nfood: Pizza\n---\n{rest}");
        let doc = parse(&text).unwrap();
        assert_eq!(doc.metadata, Some(meta(&[("food", Value::from("Pizza"))])));
        assert_eq!(doc.body, rest);
    }

    #[test]
    fn test_block_later_in_file_is_body() {
        let text = "<html><body>\n---\nfood: Pizza\n---\n<h1>Nothing here</h1></body></html>";
        let doc = parse(text).unwrap();
        assert_eq!(doc.metadata, None);
        assert_eq!(doc.body, text);
    }

    #[test]
    fn test_empty_block_is_still_metadata() {
        let doc = parse("---\n---\n<p>x</p>").unwrap();
        assert_eq!(doc.metadata, Some(FrontMatter::default()));
        assert_eq!(doc.body, "<p>x</p>");
    }

    #[test]
    fn test_only_one_line_break_stripped() {
        let doc = parse("---\na: 1\n---\n\nbody").unwrap();
        assert_eq!(doc.body, "\nbody");

        let doc = parse("---\r\na: 1\r\n---\r\nbody").unwrap();
        assert_eq!(doc.body, "body");
    }

    #[test]
    fn test_unterminated_block() {
        let err = parse("---\nfood: Pizza\n<html><body><h1>Nothing here</h1></body></html>")
            .unwrap_err();
        assert!(matches!(err, RenderError::MalformedInput(ref msg) if msg.contains("unterminated")));
    }

    #[test]
    fn test_invalid_yaml() {
        let text = format!("---\n*: \n---\n{BODY}");
        let err = parse(&text).unwrap_err();
        assert!(matches!(err, RenderError::MalformedInput(_)));
    }

    #[test]
    fn test_scalar_block_rejected() {
        let err = parse("---\njust some words\n---\nbody").unwrap_err();
        assert!(matches!(err, RenderError::MalformedInput(_)));
    }

    #[test]
    fn test_variable_text_forms() {
        let doc = parse("---\ncount: 3\ndraft: true\nempty:\ntags: [a, b]\n---\n").unwrap();
        let metadata = doc.metadata.unwrap();
        assert_eq!(metadata.variable("count").as_deref(), Some("3"));
        assert_eq!(metadata.variable("draft").as_deref(), Some("true"));
        assert_eq!(metadata.variable("empty").as_deref(), Some(""));
        assert_eq!(metadata.variable("tags"), None);
        assert_eq!(metadata.variable("missing"), None);
    }

    #[test]
    fn test_layout_is_not_a_variable() {
        let doc = parse("---\nlayout: base\n---\n").unwrap();
        let metadata = doc.metadata.unwrap();
        assert_eq!(metadata.variable("layout"), None);
        assert_eq!(metadata.layout().as_deref(), Some("base"));
    }

    #[test]
    fn test_scalar_layout_names() {
        let doc = parse("---\nlayout: 2024\n---\n").unwrap();
        assert_eq!(doc.metadata.unwrap().layout().as_deref(), Some("2024"));

        let doc = parse("---\nlayout: true\n---\n").unwrap();
        assert_eq!(doc.metadata.unwrap().layout().as_deref(), Some("true"));

        let doc = parse("---\nlayout:\n---\n").unwrap();
        assert_eq!(doc.metadata.unwrap().layout(), None);
    }
}
