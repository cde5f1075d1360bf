//! Layout chain resolution.
//!
//! A document naming `layout: post` is rendered, then `_layouts/post.html`
//! is rendered with `content` set to that output. If the layout names a
//! further layout the process repeats, until a layout without one is
//! reached. The page variables stay those of the original document for
//! the whole chain.

use super::{
    error::RenderError,
    front_matter::{self, FrontMatter},
    template::{Environment, Rendered, Renderer},
};
use rustc_hash::FxHashSet;
use std::{fs, path::PathBuf};

/// Extension of layout documents.
pub const LAYOUT_EXTENSION: &str = "html";

#[derive(Debug, Clone)]
pub struct LayoutResolver {
    dir: PathBuf,
}

impl LayoutResolver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{LAYOUT_EXTENSION}"))
    }

    /// Wrap an already rendered body in its layout chain.
    ///
    /// Returns `body` untouched when `page` names no layout. Fails on a
    /// missing layout, a malformed layout front matter block, or when the
    /// chain comes back to a layout it already used.
    pub fn resolve(
        &self,
        renderer: &Renderer,
        body: Rendered,
        page: &FrontMatter,
    ) -> Result<Rendered, RenderError> {
        let mut output = body;
        let mut env = Environment::new(page);
        let mut chain: Vec<String> = Vec::new();
        let mut visited = FxHashSet::default();
        let mut next = page.layout();

        while let Some(name) = next {
            chain.push(name.clone());
            if !visited.insert(name.clone()) {
                return Err(RenderError::CycleDetected { chain });
            }

            let path = self.path_of(&name);
            let text = fs::read_to_string(&path)
                .map_err(|err| RenderError::not_found("layout", &name, path.clone(), err))?;
            let layout = front_matter::parse(&text)?;

            env = env.with_content(output.text);
            let wrapped = renderer.render(layout.body, &env, &path)?;

            let mut advisories = output.advisories;
            advisories.extend(wrapped.advisories);
            output = Rendered {
                text: wrapped.text,
                advisories,
            };

            next = layout.metadata.as_ref().and_then(FrontMatter::layout);
        }

        Ok(output)
    }
}
