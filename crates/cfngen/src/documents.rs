//! collection of hcl documents ([SourceFile] and its parsed root structures)
//!
//! [Documents] tracks
//! - the source file (path and text, for source ranges and snippets)
//! - the root blocks
//! - the root attributes
//!
//! Every root structure keeps a handle to the [SourceFile] it was parsed from so that later
//! stages can turn spans into [SourceRange]s.
use crate::diagnostic::{Pos, SourceRange};
use hcl_edit::structure::{Attribute, Block, Body, Structure};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Text of a single hcl document
#[derive(Debug)]
pub struct SourceFile {
    path: Option<PathBuf>,
    text: String,
    line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn new(path: Option<PathBuf>, text: impl Into<String>) -> Self {
        let text = text.into();
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(index, _)| index + 1))
            .collect();

        Self {
            path,
            text,
            line_starts,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Directory containing this file, `None` for documents not loaded from disk
    pub fn dir(&self) -> Option<&Path> {
        self.path.as_deref().and_then(Path::parent)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Text of the given line (1-based) without the line terminator
    pub fn line(&self, number: usize) -> Option<&str> {
        let start = *self.line_starts.get(number.checked_sub(1)?)?;
        let end = self
            .line_starts
            .get(number)
            .map(|next| next - 1)
            .unwrap_or(self.text.len());

        self.text
            .get(start..end)
            .map(|line| line.trim_end_matches('\r'))
    }

    pub fn pos(&self, byte: usize) -> Pos {
        let byte = byte.min(self.text.len());
        let line_index = self.line_starts.partition_point(|start| *start <= byte) - 1;
        let line_start = self.line_starts[line_index];
        let column = self
            .text
            .get(line_start..byte)
            .map(|prefix| prefix.chars().count())
            .unwrap_or(byte - line_start);

        Pos {
            line: line_index + 1,
            column: column + 1,
            byte,
        }
    }

    pub fn range(&self, span: Range<usize>) -> SourceRange {
        SourceRange {
            filename: self.path.clone(),
            start: self.pos(span.start),
            end: self.pos(span.end),
        }
    }

    /// Range of any spanned hcl node, falling back to the start of the file for nodes without
    /// span information (which only happens for nodes that were not produced by the parser)
    pub fn range_of(&self, node: &impl hcl_edit::Span) -> SourceRange {
        self.range(node.span().unwrap_or_default())
    }
}

#[derive(Default, Debug)]
pub struct Documents {
    sources: Vec<Arc<SourceFile>>,
    root_attributes: Vec<(usize, Attribute)>,
    root_blocks: Vec<(usize, Block)>,
}

impl Documents {
    /// Parses and indexes an hcl document
    pub fn insert(
        &mut self,
        text: impl Into<String>,
        path: impl Into<Option<PathBuf>>,
    ) -> Result<(), LoadError> {
        let source = SourceFile::new(path.into(), text);
        let body = hcl_edit::parser::parse_body(source.text()).map_err(|source_error| {
            LoadError::HclParseFailed {
                path: source
                    .path()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "<input>".to_string()),
                source: source_error,
            }
        })?;

        self.insert_body(body, source);
        Ok(())
    }

    fn insert_body(&mut self, body: Body, source: SourceFile) {
        let source_index = self.sources.len();
        self.sources.push(Arc::new(source));

        for structure in body.into_iter() {
            match structure {
                Structure::Block(block) => self.root_blocks.push((source_index, block)),
                Structure::Attribute(attribute) => {
                    self.root_attributes.push((source_index, attribute))
                }
            }
        }
    }

    pub fn attributes(&self) -> impl Iterator<Item = SourceAttribute> {
        self.root_attributes
            .iter()
            .map(|(source_index, attribute)| (&self.sources[*source_index], attribute))
    }

    pub fn blocks(&self) -> impl Iterator<Item = SourceBlock> {
        self.root_blocks
            .iter()
            .map(|(source_index, block)| (&self.sources[*source_index], block))
    }

    pub fn sources(&self) -> impl Iterator<Item = &Arc<SourceFile>> {
        self.sources.iter()
    }

    /// Source file a range points into
    pub fn source_of(&self, range: &SourceRange) -> Option<&Arc<SourceFile>> {
        self.sources
            .iter()
            .find(|source| source.path() == range.filename.as_deref())
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}

impl Documents {
    pub fn load_file(&mut self, file_path: &Path) -> Result<(), LoadError> {
        let file_path = file_path.canonicalize()?;
        tracing::info!(path=%file_path.display(), "loading file");

        let file_contents = std::fs::read_to_string(&file_path)?;
        self.insert(file_contents, Some(file_path))
    }

    /// Loads every `.hcl` file below `dir_path`
    ///
    /// Files are loaded in path order, hidden directories are skipped.
    pub fn load_directory(&mut self, dir_path: &Path) -> Result<(), LoadError> {
        let mut files = Vec::new();
        collect_hcl_files(dir_path, &mut files)?;
        files.sort();

        if files.is_empty() {
            return Err(LoadError::NoFilesFound(dir_path.to_path_buf()));
        }

        for file_path in files {
            self.load_file(&file_path)?;
        }

        Ok(())
    }
}

fn collect_hcl_files(dir_path: &Path, files: &mut Vec<PathBuf>) -> Result<(), LoadError> {
    for dir_entry in std::fs::read_dir(dir_path)? {
        let dir_entry = dir_entry?;
        let file_type = dir_entry.file_type()?;
        let file_name = dir_entry.file_name();
        let file_name = file_name.to_string_lossy();

        if file_type.is_dir() {
            if !file_name.starts_with('.') {
                collect_hcl_files(&dir_entry.path(), files)?;
            }
            continue;
        }

        if file_type.is_file() && file_name.ends_with(".hcl") {
            files.push(dir_entry.path());
        }
    }

    Ok(())
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("No .hcl files found in {}", .0.display())]
    NoFilesFound(PathBuf),
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    #[error("Unable to parse {path}")]
    HclParseFailed {
        path: String,
        #[source]
        source: hcl_edit::parser::Error,
    },
}

/// Utility macro to create [Documents]
///
/// Create from a single document
/// ```
/// # use cfngen::documents;
/// documents!(r#"resource "func" { type = "aws:lambda_function" }"#);
/// ```
///
/// Create from multiple documents (path required)
/// ```
/// # use cfngen::documents;
/// documents! {
///   "one.hcl" => r#"resource "one" { type = "aws:iam_role" }"#,
///   "two.hcl" => r#"resource "two" { type = "aws:iam_role" }"#
/// };
/// ```
///
/// # Panic
/// Panics on invalid input
///
/// ```should_panic
/// # use cfngen::documents;
/// documents!("not = valid = hcl");
/// ```
#[macro_export]
macro_rules! documents {
    // single document without source
    { $expr:expr } => {{
        let mut docs = $crate::documents::Documents::default();
        docs.insert($expr, None).expect("body must parse");
        docs
    }};
    // multi document with sources
    { $($source:expr => $expr:expr),+ } => {{
        let mut docs = $crate::documents::Documents::default();
        $(
            docs.insert($expr, Some(std::path::PathBuf::from($source))).expect("body must parse");
        )+

        docs
    }};
}

pub type SourceAttribute<'a> = (&'a Arc<SourceFile>, &'a Attribute);
pub type SourceBlock<'a> = (&'a Arc<SourceFile>, &'a Block);
