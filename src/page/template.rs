//! Tag substitution engine.
//!
//! Two tag syntaxes are recognized, each confined to a single line:
//!
//! | Tag                   | Effect                                            |
//! |-----------------------|---------------------------------------------------|
//! | `{{ name }}`          | value of `name` in the environment, or nothing    |
//! | `{% include file %}`  | raw contents of `<includes>/file`, unprocessed    |
//!
//! Any other command word renders as nothing. A tag whose closing marker is
//! missing on its line produces an [`Advisory`] and the rest of the line is
//! emitted untouched. Every processed line is terminated with `\n`.

use super::{error::RenderError, front_matter::FrontMatter};
use std::{
    borrow::Cow,
    fmt, fs,
    path::{Path, PathBuf},
};

/// Variable reserved for the body wrapped by a layout.
pub const CONTENT_VAR: &str = "content";

const INCLUDE_COMMAND: &str = "include";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// `{{ name }}`
    Value,
    /// `{% command args %}`
    Command,
}

impl TagKind {
    pub const fn open(self) -> &'static str {
        match self {
            Self::Value => "{{",
            Self::Command => "{%",
        }
    }

    pub const fn close(self) -> &'static str {
        match self {
            Self::Value => "}}",
            Self::Command => "%}",
        }
    }
}

/// Variables visible to a render pass.
///
/// `page` is the front matter of the document being built; `content` is
/// only present while rendering a layout.
#[derive(Debug, Clone)]
pub struct Environment<'a> {
    page: &'a FrontMatter,
    content: Option<String>,
}

impl<'a> Environment<'a> {
    pub fn new(page: &'a FrontMatter) -> Self {
        Self {
            page,
            content: None,
        }
    }

    /// Same page variables, with `content` replaced.
    pub fn with_content(&self, content: String) -> Self {
        Self {
            page: self.page,
            content: Some(content),
        }
    }

    /// Resolve a bare top-level name. Dotted names are not split.
    pub fn lookup(&self, name: &str) -> Option<Cow<'_, str>> {
        if name == CONTENT_VAR {
            return self.content.as_deref().map(Cow::Borrowed);
        }
        self.page.variable(name).map(Cow::Owned)
    }
}

/// Non-fatal diagnostic: a tag opened but never closed on its line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advisory {
    pub source: PathBuf,
    /// 1-based line number within the rendered body.
    pub line: usize,
    pub kind: TagKind,
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no closing `{}` for `{}` on line {} of {}",
            self.kind.close(),
            self.kind.open(),
            self.line,
            self.source.display()
        )
    }
}

/// Output of a render pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    pub advisories: Vec<Advisory>,
}

/// Renders bodies against an environment, reading includes from one directory.
#[derive(Debug, Clone)]
pub struct Renderer {
    includes: PathBuf,
}

impl Renderer {
    pub fn new(includes: impl Into<PathBuf>) -> Self {
        Self {
            includes: includes.into(),
        }
    }

    /// Substitute every tag in `body`, line by line.
    ///
    /// `source` only labels advisories. Fails when an included file cannot
    /// be read.
    pub fn render(
        &self,
        body: &str,
        env: &Environment<'_>,
        source: &Path,
    ) -> Result<Rendered, RenderError> {
        let mut out = Rendered {
            text: String::with_capacity(body.len() + 1),
            advisories: Vec::new(),
        };

        for (idx, line) in body.split('\n').enumerate() {
            if let Some(kind) = self.render_line(line, env, &mut out.text)? {
                out.advisories.push(Advisory {
                    source: source.to_path_buf(),
                    line: idx + 1,
                    kind,
                });
            }
            out.text.push('\n');
        }

        Ok(out)
    }

    /// Render one line into `out`. Returns the kind of an unterminated tag.
    fn render_line(
        &self,
        line: &str,
        env: &Environment<'_>,
        out: &mut String,
    ) -> Result<Option<TagKind>, RenderError> {
        let mut rest = line;
        let mut unterminated = None;

        while let Some((start, kind)) = next_tag(rest) {
            let inner_start = start + kind.open().len();
            let Some(len) = rest[inner_start..].find(kind.close()) else {
                unterminated = Some(kind);
                break;
            };

            out.push_str(&rest[..start]);
            self.resolve(kind, &rest[inner_start..inner_start + len], env, out)?;
            rest = &rest[inner_start + len + kind.close().len()..];
        }

        out.push_str(rest);
        Ok(unterminated)
    }

    fn resolve(
        &self,
        kind: TagKind,
        inner: &str,
        env: &Environment<'_>,
        out: &mut String,
    ) -> Result<(), RenderError> {
        match kind {
            TagKind::Value => {
                if let Some(value) = env.lookup(inner.trim()) {
                    out.push_str(&value);
                }
            }
            TagKind::Command => {
                let mut words = inner.split_whitespace();
                if words.next() == Some(INCLUDE_COMMAND) {
                    let name = words.next().ok_or_else(|| {
                        RenderError::MalformedInput("`include` needs a file name".into())
                    })?;
                    out.push_str(&self.read_include(name)?);
                }
            }
        }
        Ok(())
    }

    fn read_include(&self, name: &str) -> Result<String, RenderError> {
        let path = self.includes.join(name);
        fs::read_to_string(&path).map_err(|err| RenderError::not_found("include", name, path, err))
    }
}

/// Leftmost opening marker in `s`; `{{` wins a tie.
fn next_tag(s: &str) -> Option<(usize, TagKind)> {
    let value = s.find(TagKind::Value.open()).map(|i| (i, TagKind::Value));
    let command = s.find(TagKind::Command.open()).map(|i| (i, TagKind::Command));

    match (value, command) {
        (Some(v), Some(c)) => Some(if c.0 < v.0 { c } else { v }),
        (v, c) => v.or(c),
    }
}
