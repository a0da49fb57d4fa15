//! `banter meta`

use std::path::{Path, PathBuf};

use banter_compiler::meta::{LineMeta, Metadata};
use clap::{Args, Subcommand};

#[derive(Args, Debug)]
pub struct MetaArgs {
    /// Metadata JSON file
    pub metafile: PathBuf,

    #[command(subcommand)]
    pub command: MetaCommand,
}

#[derive(Subcommand, Debug)]
pub enum MetaCommand {
    /// Print fields of matching entries as a table
    Get {
        /// Only entries from these sections
        #[arg(short, long)]
        section: Vec<String>,

        /// Only these line ids
        #[arg(short, long)]
        line_id: Vec<String>,

        /// Skip the header row
        #[arg(short = 'H', long)]
        no_header: bool,

        /// Fields to print; `section` and `line_id` are virtual
        #[arg(required = true)]
        field: Vec<String>,
    },
    /// Set one field of one line's entry
    Set {
        section: String,
        line_id: String,
        field: String,
        value: String,
    },
}

pub fn run(args: MetaArgs) -> Result<(), String> {
    match args.command {
        MetaCommand::Get {
            section,
            line_id,
            no_header,
            field,
        } => get(&args.metafile, &section, &line_id, no_header, &field),
        MetaCommand::Set {
            section,
            line_id,
            field,
            value,
        } => set(&args.metafile, &section, &line_id, &field, &value),
    }
}

fn get(
    path: &Path,
    sections: &[String],
    line_ids: &[String],
    no_header: bool,
    fields: &[String],
) -> Result<(), String> {
    let meta = Metadata::load(path).map_err(|e| e.to_string())?;

    let mut widths: Vec<usize> = fields.iter().map(|f| f.len()).collect();
    let mut rows: Vec<Vec<String>> = Vec::new();
    for (section, line_id, line_meta) in meta.iter() {
        if !sections.is_empty() && !sections.iter().any(|s| s == section) {
            continue;
        }
        if !line_ids.is_empty() && !line_ids.iter().any(|l| l == line_id) {
            continue;
        }
        let row: Vec<String> = fields
            .iter()
            .map(|field| field_value(section, line_id, line_meta, field))
            .collect();
        for (i, value) in row.iter().enumerate() {
            widths[i] = widths[i].max(value.len());
        }
        rows.push(row);
    }

    if !no_header {
        print_row(fields, &widths);
    }
    for row in &rows {
        print_row(row, &widths);
    }
    Ok(())
}

fn field_value(section: &str, line_id: &str, line_meta: &LineMeta, field: &str) -> String {
    match field {
        "section" => section.to_string(),
        "line_id" => line_id.to_string(),
        _ => line_meta.get(field).cloned().unwrap_or_default(),
    }
}

/// Cells padded to their column width, tab separated.
fn print_row(cells: &[String], widths: &[usize]) {
    let line = cells
        .iter()
        .zip(widths.iter().copied())
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("\t");
    println!("{line}");
}

fn set(
    path: &Path,
    section: &str,
    line_id: &str,
    field: &str,
    value: &str,
) -> Result<(), String> {
    let mut meta = Metadata::load(path).map_err(|e| e.to_string())?;
    meta.set(section, line_id, field, value);
    meta.save(path).map_err(|e| e.to_string())
}
