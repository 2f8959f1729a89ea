use std::{
    io::{self, Write},
    path::PathBuf,
};

use anyhow::Result;
use clap::Args as ClapArgs;
use g4_index::{SymbolFilter, SymbolInfo, SymbolKind};
use serde::Serialize;

use crate::workspace::Workspace;

/// List the symbols each grammar defines or references
#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Grammar files; imports between them are resolved
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Include every reference location
    #[arg(long)]
    pub exhaustive: bool,

    /// Also list the grammars named by `import` and `tokenVocab`
    #[arg(long)]
    pub imports: bool,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct FileSymbols<'a> {
    file: &'a str,
    symbols: Vec<SymbolInfo>,
}

pub fn run(args: &Args) -> Result<()> {
    let workspace = Workspace::load(&args.files)?;
    let listings: Vec<FileSymbols<'_>> = workspace
        .files
        .iter()
        .map(|file| {
            let mut symbols = workspace
                .index
                .list_symbols_fast(&file.id, &file.text, args.exhaustive);
            if args.imports {
                let imports = SymbolFilter::all()
                    .with_kinds([SymbolKind::Import, SymbolKind::TokenVocab]);
                symbols.extend(workspace.index.list_symbols(&file.id, &file.text, &imports));
            }
            FileSymbols {
                file: file.id.as_str(),
                symbols,
            }
        })
        .collect();

    let mut stdout = io::stdout().lock();
    if args.json {
        serde_json::to_writer_pretty(&mut stdout, &listings)?;
        writeln!(stdout)?;
        return Ok(());
    }

    for listing in &listings {
        writeln!(stdout, "{}", listing.file)?;
        for info in &listing.symbols {
            write_symbol(&mut stdout, info)?;
        }
    }
    Ok(())
}

fn write_symbol(out: &mut impl Write, info: &SymbolInfo) -> io::Result<()> {
    let symbol = &info.symbol;
    let position = symbol.definition.as_ref().map_or_else(
        || "-".to_string(),
        |location| format!("{}:{}", location.start.line, location.start.column),
    );
    writeln!(
        out,
        "  {position:<8} {:<20} {:<24} {}",
        format!("{:?}", symbol.kind),
        symbol.name,
        info.reference_count
    )?;
    for reference in &info.references {
        writeln!(out, "    -> {}:{}", reference.start.line, reference.start.column)?;
    }
    Ok(())
}
