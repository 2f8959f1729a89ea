use std::{
    io::{self, Write},
    path::PathBuf,
};

use anyhow::Result;
use clap::Args as ClapArgs;
use g4_index::convert::location_to_range;

use crate::workspace::{SourceFile, Workspace};

/// Print reference-count lenses in editor coordinates (0-based lines)
#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Grammar files; imports between them are resolved
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

pub fn run(args: &Args) -> Result<()> {
    let workspace = Workspace::load(&args.files)?;
    let mut stdout = io::stdout().lock();

    for file in &workspace.files {
        if workspace.files.len() > 1 {
            writeln!(stdout, "{}", file.id)?;
        }
        for line in lens_lines(&workspace, file) {
            writeln!(stdout, "{line}")?;
        }
    }
    Ok(())
}

/// One line per symbol an editor would annotate with its reference count.
fn lens_lines(workspace: &Workspace, file: &SourceFile) -> Vec<String> {
    let index = &workspace.index;
    index
        .list_symbols_fast(&file.id, &file.text, false)
        .iter()
        .filter(|info| info.symbol.kind.shows_reference_count())
        .filter_map(|info| {
            let range = location_to_range(info.symbol.definition.as_ref()?);
            let count = index.count_references_fast(&file.id, &file.text, &info.symbol.name);
            Some(format!(
                "{}:{} {}: {count} references",
                range.start.line, range.start.character, info.symbol.name
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lens_lines_use_editor_lines() {
        let file = SourceFile::new(
            "Expr.g4".into(),
            "grammar Expr;\ntokens { EXTRA }\nexpr: expr '+' INT | INT;\nINT: DIGIT+;\nfragment DIGIT: [0-9];\n"
                .to_string(),
        );
        let workspace = Workspace::from_files(vec![file]);
        let lines = workspace
            .files
            .first()
            .map(|file| lens_lines(&workspace, file))
            .unwrap_or_default();
        assert_eq!(
            lines,
            vec![
                "2:0 expr: 1 references",
                "3:0 INT: 2 references",
                "4:9 DIGIT: 1 references",
            ]
        );
    }
}
