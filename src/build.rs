//! Site building orchestration.
//!
//! ```text
//! build_tree()
//!     │
//!     ├── collect_entries()    depth-first walk, excluded entries pruned
//!     │
//!     └── build_file()         per file, in parallel
//!             │
//!             ├── Skip         destination at least as new as source
//!             ├── Transform    front matter → tags → conversion → layouts
//!             └── CopyVerbatim byte copy (also templates without front matter)
//! ```
//!
//! Files are independent build units: a failure is logged and counted and
//! the walk carries on. There is no dependency tracking, so editing a
//! layout or include does not mark its users stale.

use crate::{
    config::SiteConfig,
    log,
    page::{Conversion, PageBuilder, PageOutput},
    utils::{exclude::ExclusionPolicy, path},
};
use anyhow::{Context, Result};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::{
    fs,
    ops::Add,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One entry of the source tree, relative to the source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
}

/// How a file is turned into its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    CopyVerbatim,
    RenderTemplate(Option<Conversion>),
}

/// Pure mapping from file extension to [`Transform`].
#[derive(Debug, Clone, Default)]
pub struct TransformTable {
    templates: FxHashMap<String, Transform>,
}

impl TransformTable {
    /// Every listed extension is rendered; `md` and `markdown` are also
    /// converted to HTML. Matching is case-sensitive.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let templates = extensions
            .into_iter()
            .map(|ext| {
                let ext = ext.as_ref();
                let conversion = match ext {
                    "md" | "markdown" => Some(Conversion::Markdown),
                    _ => None,
                };
                (ext.to_owned(), Transform::RenderTemplate(conversion))
            })
            .collect();
        Self { templates }
    }

    pub fn transform_for(&self, rel: &Path) -> Transform {
        path::extension(&rel.to_string_lossy())
            .and_then(|ext| self.templates.get(ext).copied())
            .unwrap_or(Transform::CopyVerbatim)
    }
}

/// What a build pass will do with one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildDecision {
    Transform(Option<Conversion>),
    CopyVerbatim,
    Skip,
}

/// What a build pass did with one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Transformed,
    Copied,
    Skipped,
}

/// Counters for one [`Builder::build_tree`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub transformed: usize,
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BuildReport {
    fn record(mut self, outcome: Option<Outcome>) -> Self {
        match outcome {
            Some(Outcome::Transformed) => self.transformed += 1,
            Some(Outcome::Copied) => self.copied += 1,
            Some(Outcome::Skipped) => self.skipped += 1,
            None => self.failed += 1,
        }
        self
    }
}

impl Add for BuildReport {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            transformed: self.transformed + other.transformed,
            copied: self.copied + other.copied,
            skipped: self.skipped + other.skipped,
            failed: self.failed + other.failed,
        }
    }
}

/// Builds one source tree into one destination tree.
#[derive(Debug, Clone)]
pub struct Builder {
    source: PathBuf,
    destination: PathBuf,
    policy: ExclusionPolicy,
    transforms: TransformTable,
    pages: PageBuilder,
}

impl Builder {
    pub fn new(config: &SiteConfig) -> Self {
        Self {
            source: config.source.clone(),
            destination: config.destination.clone(),
            policy: ExclusionPolicy::from_config(config),
            transforms: TransformTable::new(&config.templates),
            pages: PageBuilder::new(&config.includes, &config.layouts)
                .require_front_matter(config.require_front_matter),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn policy(&self) -> &ExclusionPolicy {
        &self.policy
    }

    /// Walk the source tree depth-first, in name order.
    ///
    /// Excluded directories are pruned without being read. Unreadable
    /// entries are logged and left out.
    pub fn collect_entries(&self) -> Vec<SourceEntry> {
        self.collect_entries_in(Path::new(""))
    }

    /// Like [`Builder::collect_entries`], for the subtree at `rel`.
    ///
    /// The subtree root itself is not listed; paths stay relative to the
    /// source root.
    pub fn collect_entries_in(&self, rel: &Path) -> Vec<SourceEntry> {
        let walker = WalkDir::new(self.source.join(rel))
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0 || !self.policy.is_excluded_path(self.relative(entry.path()))
            });

        let mut entries = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) if entry.depth() > 0 => entry,
                Ok(_) => continue,
                Err(err) => {
                    log!("error"; "{err}");
                    continue;
                }
            };

            let path = entry.path();
            let kind = if path.is_dir() {
                EntryKind::Directory
            } else if path.is_file() {
                EntryKind::File
            } else {
                continue;
            };

            entries.push(SourceEntry {
                path: self.relative(path).to_path_buf(),
                kind,
            });
        }
        entries
    }

    fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.source).unwrap_or(path)
    }

    /// Build every file of the tree, skipping up-to-date outputs.
    pub fn build_tree(&self) -> Result<BuildReport> {
        fs::create_dir_all(&self.destination).with_context(|| {
            format!(
                "Failed to create destination directory: {}",
                self.destination.display()
            )
        })?;

        let files: Vec<PathBuf> = self
            .collect_entries()
            .into_iter()
            .filter(|entry| entry.kind == EntryKind::File)
            .map(|entry| entry.path)
            .collect();

        let report = files
            .par_iter()
            .map(|rel| match self.build_file(rel) {
                Ok(outcome) => Some(outcome),
                Err(err) => {
                    log!("error"; "{}: {:#}", rel.display(), err);
                    None
                }
            })
            .fold(BuildReport::default, BuildReport::record)
            .reduce(BuildReport::default, Add::add);

        log_build_result(&report);
        Ok(report)
    }

    /// Mirrored output path of a source file.
    ///
    /// Converted documents take the extension of their conversion output.
    pub fn destination_for(&self, rel: &Path) -> PathBuf {
        let dest = self.destination.join(rel);
        match self.transforms.transform_for(rel) {
            Transform::RenderTemplate(Some(conversion)) => {
                dest.with_extension(conversion.output_extension())
            }
            _ => dest,
        }
    }

    /// Decide what to do with one source file.
    pub fn decide(&self, rel: &Path) -> Result<BuildDecision> {
        let src = self.source.join(rel);
        let dest = self.destination_for(rel);

        if is_up_to_date(&src, &dest)? {
            return Ok(BuildDecision::Skip);
        }

        Ok(match self.transforms.transform_for(rel) {
            Transform::RenderTemplate(conversion) => BuildDecision::Transform(conversion),
            Transform::CopyVerbatim => BuildDecision::CopyVerbatim,
        })
    }

    /// Build a single file given relative to the source root.
    ///
    /// This is the step shared by the full walk and the watch loop.
    /// Excluded paths are skipped.
    pub fn build_file(&self, rel: &Path) -> Result<Outcome> {
        if self.policy.is_excluded_path(rel) {
            return Ok(Outcome::Skipped);
        }

        let src = self.source.join(rel);
        let dest = self.destination_for(rel);

        match self.decide(rel)? {
            BuildDecision::Skip => Ok(Outcome::Skipped),
            BuildDecision::CopyVerbatim => {
                log!("build"; "copying {}", rel.display());
                copy_file(&src, &dest)?;
                Ok(Outcome::Copied)
            }
            BuildDecision::Transform(conversion) => self.transform(rel, &src, &dest, conversion),
        }
    }

    fn transform(
        &self,
        rel: &Path,
        src: &Path,
        dest: &Path,
        conversion: Option<Conversion>,
    ) -> Result<Outcome> {
        let bytes = fs::read(src).with_context(|| format!("Failed to read {}", src.display()))?;
        if self.pages.copies_verbatim(&bytes) {
            return copy_without_front_matter(rel, src, dest);
        }
        let text = String::from_utf8(bytes)
            .with_context(|| format!("{} is not valid UTF-8", src.display()))?;

        match self.pages.build(rel, &text, conversion)? {
            PageOutput::Verbatim => copy_without_front_matter(rel, src, dest),
            PageOutput::Rendered(rendered) => {
                for advisory in &rendered.advisories {
                    log!("warn"; "{advisory}");
                }
                log!("build"; "building {}", rel.display());
                ensure_parent_dir(dest)?;
                fs::write(dest, rendered.text)
                    .with_context(|| format!("Failed to write {}", dest.display()))?;
                Ok(Outcome::Transformed)
            }
        }
    }
}

/// Whether `dest` exists and is at least as new as `src`.
fn is_up_to_date(src: &Path, dest: &Path) -> Result<bool> {
    let src_time = src
        .metadata()
        .and_then(|meta| meta.modified())
        .with_context(|| format!("Failed to stat {}", src.display()))?;

    if let Ok(dst_meta) = dest.metadata()
        && let Ok(dst_time) = dst_meta.modified()
    {
        return Ok(src_time <= dst_time);
    }
    Ok(false)
}

/// Create every missing ancestor of `path`, root first.
fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

fn copy_without_front_matter(rel: &Path, src: &Path, dest: &Path) -> Result<Outcome> {
    log!("build"; "copying {} verbatim, no front matter", rel.display());
    copy_file(src, dest)?;
    Ok(Outcome::Copied)
}

fn copy_file(src: &Path, dest: &Path) -> Result<()> {
    ensure_parent_dir(dest)?;
    fs::copy(src, dest)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dest.display()))?;
    Ok(())
}

/// Remove the destination tree, if present.
pub fn clean(destination: &Path) -> Result<()> {
    if destination.exists() {
        fs::remove_dir_all(destination).with_context(|| {
            format!("Failed to clear output directory: {}", destination.display())
        })?;
        log!("clean"; "removed {}", destination.display());
    }
    Ok(())
}

fn log_build_result(report: &BuildReport) {
    match report.failed {
        0 => log!(
            "build";
            "done: {} built, {} copied, {} up to date",
            report.transformed,
            report.copied,
            report.skipped
        ),
        n => log!("error"; "{n} file(s) failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        fs::File,
        time::{Duration, SystemTime},
    };
    use tempfile::TempDir;

    struct Site {
        dir: TempDir,
    }

    impl Site {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            fs::create_dir(dir.path().join("_layouts")).unwrap();
            fs::create_dir(dir.path().join("_includes")).unwrap();
            Self { dir }
        }

        fn root(&self) -> &Path {
            self.dir.path()
        }

        fn write(&self, rel: &str, content: impl AsRef<[u8]>) -> &Self {
            let path = self.root().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
            self
        }

        fn config(&self) -> SiteConfig {
            let root = self.root();
            SiteConfig {
                root: Some(root.to_path_buf()),
                config_path: root.join("_config.toml"),
                source: root.to_path_buf(),
                destination: root.join("_site"),
                layouts: root.join("_layouts"),
                includes: root.join("_includes"),
                ..SiteConfig::default()
            }
        }

        fn builder(&self) -> Builder {
            Builder::new(&self.config())
        }

        fn output(&self, rel: &str) -> PathBuf {
            self.root().join("_site").join(rel)
        }

        fn read_output(&self, rel: &str) -> String {
            fs::read_to_string(self.output(rel)).unwrap()
        }
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    #[test]
    fn test_transform_table() {
        let table = TransformTable::new(["html", "md"]);

        assert_eq!(
            table.transform_for(Path::new("index.html")),
            Transform::RenderTemplate(None)
        );
        assert_eq!(
            table.transform_for(Path::new("blog/post.md")),
            Transform::RenderTemplate(Some(Conversion::Markdown))
        );
        assert_eq!(table.transform_for(Path::new("logo.png")), Transform::CopyVerbatim);
        assert_eq!(table.transform_for(Path::new("INDEX.HTML")), Transform::CopyVerbatim);
        assert_eq!(table.transform_for(Path::new("Makefile")), Transform::CopyVerbatim);
    }

    #[test]
    fn test_destination_rewrites_converted_extension() {
        let site = Site::new();
        let builder = site.builder();

        assert_eq!(builder.destination_for(Path::new("blog/post.md")), site.output("blog/post.html"));
        assert_eq!(builder.destination_for(Path::new("a/b.html")), site.output("a/b.html"));
        assert_eq!(builder.destination_for(Path::new("img/x.png")), site.output("img/x.png"));
    }

    #[test]
    fn test_collect_entries_prunes_excluded() {
        let site = Site::new();
        site.write("index.html", "")
            .write("blog/post.md", "")
            .write("blog/_drafts/wip.md", "")
            .write("_layouts/base.html", "")
            .write("_site/old.html", "")
            .write("_config.toml", "")
            .write("node_modules/pkg/index.js", "")
            .write("_notes.txt", "");

        let entries = site.builder().collect_entries();
        let paths: Vec<_> = entries.iter().map(|e| e.path.clone()).collect();

        assert_eq!(
            paths,
            [
                PathBuf::from("blog"),
                PathBuf::from("blog/post.md"),
                PathBuf::from("index.html"),
            ]
        );
        assert_eq!(entries[0].kind, EntryKind::Directory);
        assert_eq!(entries[1].kind, EntryKind::File);
    }

    #[test]
    fn test_explicit_exclude() {
        let site = Site::new();
        site.write("README.md", "---\n---\nx").write("a.html", "---\n---\nx");
        let config = SiteConfig {
            exclude: vec!["README.md".into()],
            ..site.config()
        };

        Builder::new(&config).build_tree().unwrap();

        assert!(site.output("a.html").exists());
        assert!(!site.output("README.html").exists());
    }

    #[test]
    fn test_plain_copy_is_byte_identical() {
        let site = Site::new();
        let bytes: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        site.write("img/deep/logo.png", &bytes);

        let report = site.builder().build_tree().unwrap();

        assert_eq!(report.copied, 1);
        assert_eq!(fs::read(site.output("img/deep/logo.png")).unwrap(), bytes);
    }

    #[test]
    fn test_second_build_does_nothing() {
        let site = Site::new();
        site.write("_layouts/base.html", "<body>{{ content }}</body>")
            .write("index.html", "---\nlayout: base\n---\n<p>home</p>")
            .write("post.md", "---\n---\n# Post")
            .write("style.css", "body {}")
            .write("raw.html", "<p>no front matter</p>");

        let builder = site.builder();
        let first = builder.build_tree().unwrap();
        assert_eq!(first.transformed, 2);
        assert_eq!(first.copied, 2);
        assert_eq!(first.failed, 0);

        let second = builder.build_tree().unwrap();
        assert_eq!(
            second,
            BuildReport {
                transformed: 0,
                copied: 0,
                skipped: 4,
                failed: 0,
            }
        );
    }

    #[test]
    fn test_stale_output_is_rebuilt() {
        let site = Site::new();
        site.write("page.html", "---\ntitle: one\n---\n{{ title }}");
        let builder = site.builder();
        builder.build_tree().unwrap();

        site.write("page.html", "---\ntitle: two\n---\n{{ title }}");
        set_mtime(&site.output("page.html"), SystemTime::UNIX_EPOCH + Duration::from_secs(1));

        assert_eq!(
            builder.decide(Path::new("page.html")).unwrap(),
            BuildDecision::Transform(None)
        );
        assert_eq!(builder.build_file(Path::new("page.html")).unwrap(), Outcome::Transformed);
        assert_eq!(site.read_output("page.html"), "two\n");
    }

    #[test]
    fn test_newer_output_is_skipped() {
        let site = Site::new();
        site.write("a.txt", "a");
        let builder = site.builder();
        site.write("_site/a.txt", "stale but newer");

        set_mtime(&site.root().join("a.txt"), SystemTime::UNIX_EPOCH + Duration::from_secs(1));

        assert_eq!(builder.decide(Path::new("a.txt")).unwrap(), BuildDecision::Skip);
        assert_eq!(builder.build_file(Path::new("a.txt")).unwrap(), Outcome::Skipped);
        assert_eq!(site.read_output("a.txt"), "stale but newer");
    }

    #[test]
    fn test_markdown_page_with_layout_and_include() {
        let site = Site::new();
        site.write("_includes/footer.html", "<hr>")
            .write("_layouts/base.html", "<title>{{ title }}</title>\n{{ content }}{% include footer.html %}")
            .write("blog/hello.md", "---\nlayout: base\ntitle: Hello\n---\nHi *there*");

        site.builder().build_tree().unwrap();

        assert_eq!(
            site.read_output("blog/hello.html"),
            "<title>Hello</title>\n<p>Hi <em>there</em></p>\n<hr>\n"
        );
        assert!(!site.output("blog/hello.md").exists());
    }

    #[test]
    fn test_template_without_front_matter_is_copied() {
        let site = Site::new();
        let raw = "<p>{{ not processed }}</p>";
        site.write("raw.html", raw);

        let report = site.builder().build_tree().unwrap();

        assert_eq!(report.copied, 1);
        assert_eq!(site.read_output("raw.html"), raw);
    }

    #[test]
    fn test_non_utf8_template_without_front_matter_is_copied() {
        let site = Site::new();
        let latin1 = b"<p>caf\xe9</p>";
        site.write("legacy.html", latin1);

        let report = site.builder().build_tree().unwrap();

        assert_eq!(report.copied, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(fs::read(site.output("legacy.html")).unwrap(), latin1);
    }

    #[test]
    fn test_non_utf8_template_with_front_matter_fails() {
        let site = Site::new();
        site.write("bad.html", b"---\ntitle: x\n---\n<p>caf\xe9</p>");

        let report = site.builder().build_tree().unwrap();

        assert_eq!(report.failed, 1);
        assert!(!site.output("bad.html").exists());
    }

    #[test]
    fn test_failures_are_isolated() {
        let site = Site::new();
        site.write("broken.html", "---\nlayout: missing\n---\nx")
            .write("unterminated.html", "---\ntitle: x\n")
            .write("cycle.html", "---\nlayout: loop\n---\nx")
            .write("_layouts/loop.html", "---\nlayout: loop\n---\n{{ content }}")
            .write("ok.html", "---\n---\nfine");

        let report = site.builder().build_tree().unwrap();

        assert_eq!(report.failed, 3);
        assert_eq!(report.transformed, 1);
        assert_eq!(site.read_output("ok.html"), "fine\n");
        assert!(!site.output("broken.html").exists());
        assert!(!site.output("cycle.html").exists());
    }

    #[test]
    fn test_build_file_skips_excluded() {
        let site = Site::new();
        site.write("_drafts/wip.html", "---\n---\nx");

        let outcome = site.builder().build_file(Path::new("_drafts/wip.html")).unwrap();

        assert_eq!(outcome, Outcome::Skipped);
        assert!(!site.output("_drafts/wip.html").exists());
    }

    #[test]
    fn test_unresolved_variable_renders_empty() {
        let site = Site::new();
        site.write("a.html", "---\n---\n[{{ missing }}]");

        site.builder().build_tree().unwrap();

        assert_eq!(site.read_output("a.html"), "[]\n");
    }

    #[test]
    fn test_clean() {
        let site = Site::new();
        site.write("_site/a/b.html", "x");

        clean(&site.root().join("_site")).unwrap();
        assert!(!site.root().join("_site").exists());

        // cleaning twice is fine
        clean(&site.root().join("_site")).unwrap();
    }

    #[test]
    fn test_report_addition() {
        let a = BuildReport::default().record(Some(Outcome::Copied)).record(None);
        let b = BuildReport::default().record(Some(Outcome::Skipped));
        assert_eq!(
            a + b,
            BuildReport {
                transformed: 0,
                copied: 1,
                skipped: 1,
                failed: 1,
            }
        );
    }
}
