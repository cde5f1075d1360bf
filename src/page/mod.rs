//! Document rendering pipeline.
//!
//! ```text
//! source text
//!     │
//!     ├── front_matter::parse()   metadata + body
//!     ├── Renderer::render()      {{ value }} / {% include %}
//!     ├── Conversion::apply()     optional, e.g. Markdown → HTML
//!     └── LayoutResolver          wrap in layout chain
//! ```

mod convert;
mod error;
pub mod front_matter;
mod layout;
pub mod template;

pub use convert::Conversion;
pub use error::RenderError;
pub use front_matter::FrontMatter;
pub use layout::LayoutResolver;
pub use template::{Environment, Rendered, Renderer};

use std::path::{Path, PathBuf};

/// Result of running a document through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutput {
    Rendered(Rendered),
    /// No metadata block while one is required; copy the source as-is.
    Verbatim,
}

/// Renders template documents of one site.
#[derive(Debug, Clone)]
pub struct PageBuilder {
    renderer: Renderer,
    layouts: LayoutResolver,
    require_front_matter: bool,
}

impl PageBuilder {
    pub fn new(includes: impl Into<PathBuf>, layouts: impl Into<PathBuf>) -> Self {
        Self {
            renderer: Renderer::new(includes),
            layouts: LayoutResolver::new(layouts),
            require_front_matter: true,
        }
    }

    pub fn require_front_matter(mut self, require: bool) -> Self {
        self.require_front_matter = require;
        self
    }

    /// Whether raw file contents skip rendering because they lack a
    /// required metadata block. Works on bytes so non-UTF-8 files can
    /// still be copied.
    pub fn copies_verbatim(&self, bytes: &[u8]) -> bool {
        self.require_front_matter && !bytes.starts_with(front_matter::FENCE.as_bytes())
    }

    /// Render `text`, read from `source`, through the whole pipeline.
    pub fn build(
        &self,
        source: &Path,
        text: &str,
        conversion: Option<Conversion>,
    ) -> Result<PageOutput, RenderError> {
        let document = front_matter::parse(text)?;

        let page = match document.metadata {
            Some(metadata) => metadata,
            None if self.require_front_matter => return Ok(PageOutput::Verbatim),
            None => FrontMatter::default(),
        };

        let mut rendered = self
            .renderer
            .render(document.body, &Environment::new(&page), source)?;
        if let Some(conversion) = conversion {
            rendered.text = conversion.apply(&rendered.text);
        }

        self.layouts
            .resolve(&self.renderer, rendered, &page)
            .map(PageOutput::Rendered)
    }
}
