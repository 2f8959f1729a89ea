use std::{
    io::{self, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::Args as ClapArgs;

use crate::workspace::Workspace;

/// Show where a symbol is referenced
#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Grammar to search
    pub file: PathBuf,

    /// Symbol name, matched exactly
    pub name: String,

    /// Additional grammars that `file` imports
    #[arg(long = "with", value_name = "FILES", num_args = 1..)]
    pub with: Vec<PathBuf>,
}

pub fn run(args: &Args) -> Result<()> {
    let mut paths = vec![args.file.clone()];
    paths.extend(args.with.iter().cloned());
    let workspace = Workspace::load(&paths)?;

    let file = workspace
        .file(&args.file)
        .with_context(|| format!("{} was not loaded", args.file.display()))?;
    let references = workspace.index.references(&file.id, &args.name)?;

    let mut stdout = io::stdout().lock();
    for reference in &references {
        let start = reference.location.start;
        writeln!(
            stdout,
            "{}:{}:{}: {} {}",
            file.id, start.line, start.column, reference.namespace, reference.name
        )?;
    }
    writeln!(
        stdout,
        "{}: {} references",
        args.name,
        workspace.index.count_references_fast(&file.id, &file.text, &args.name)
    )?;
    Ok(())
}
