use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use g4_index::{DocumentId, GrammarIndex};
use rayon::prelude::*;

/// A grammar file read from disk.
#[derive(Debug)]
pub(crate) struct SourceFile {
    pub(crate) path: PathBuf,
    pub(crate) id: DocumentId,
    pub(crate) text: String,
}

/// Every file named on the command line, registered with one index so
/// imports between them resolve.
#[derive(Debug)]
pub(crate) struct Workspace {
    pub(crate) index: GrammarIndex,
    pub(crate) files: Vec<SourceFile>,
}

impl Workspace {
    #[tracing::instrument]
    pub(crate) fn load(paths: &[PathBuf]) -> Result<Self> {
        let files = paths
            .par_iter()
            .map(|path| read(path))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_files(files))
    }

    pub(crate) fn from_files(files: Vec<SourceFile>) -> Self {
        let index = GrammarIndex::new();
        for file in &files {
            index.update(&file.id, &file.text);
        }
        tracing::debug!(files = files.len(), "loaded workspace");
        Self { index, files }
    }

    pub(crate) fn file(&self, path: &Path) -> Option<&SourceFile> {
        self.files.iter().find(|file| file.path == path)
    }
}

impl SourceFile {
    pub(crate) fn new(path: PathBuf, text: String) -> Self {
        Self {
            id: DocumentId::new(path.display().to_string()),
            path,
            text,
        }
    }
}

fn read(path: &Path) -> Result<SourceFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(SourceFile::new(path.to_path_buf(), text))
}
