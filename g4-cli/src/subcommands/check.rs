use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args as ClapArgs;
use g4_index::{DiagnosticCode, Severity};

use crate::{error, workspace::Workspace};

/// Report syntax errors and semantic problems
#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Grammar files; imports between them are resolved
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Hide warnings
    #[arg(long, short)]
    pub quiet: bool,
}

pub fn run(args: &Args) -> Result<()> {
    let workspace = Workspace::load(&args.files)?;
    let ids: Vec<_> = workspace.files.iter().map(|file| file.id.clone()).collect();
    let analyses = workspace.index.refresh(&ids);

    let mut failed = 0_usize;
    for (file, analysis) in workspace.files.iter().zip(analyses) {
        let analysis = analysis?;
        let mut errors = 0_usize;
        for diagnostic in analysis.diagnostics() {
            if diagnostic.severity == Severity::Warning && args.quiet {
                continue;
            }
            if diagnostic.is_error() {
                errors += 1;
            }
            let advice = match diagnostic.code {
                DiagnosticCode::Syntax => analysis
                    .syntax_errors()
                    .iter()
                    .find(|syntax| syntax.location == diagnostic.location)
                    .and_then(g4_parser::SyntaxError::advice),
                DiagnosticCode::DuplicateDefinition
                | DiagnosticCode::UnresolvedReference
                | DiagnosticCode::UnknownImport => None,
            };
            eprintln!("{:?}", error::report(file, diagnostic, advice));
        }
        if errors > 0 {
            failed += 1;
        }
        tracing::info!(
            file = %file.id,
            errors,
            unresolved = analysis.unresolved().len(),
            "checked grammar"
        );
    }

    if failed > 0 {
        bail!("{failed} grammar file(s) with errors");
    }
    Ok(())
}
