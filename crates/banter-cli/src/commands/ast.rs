//! `banter ast`
//!
//! Debug tool: dump what the parser makes of a script or a single
//! expression, before id generation or any analysis.

use banter_dsl::expr::parse_expression;
use banter_dsl::parse;
use clap::Args;

#[derive(Args, Debug)]
pub struct AstArgs {
    /// Script text, or a path with --file
    pub input: String,

    /// Parse a single expression instead of a script
    #[arg(short, long)]
    pub expr: bool,

    /// Treat INPUT as a file path
    #[arg(short, long)]
    pub file: bool,
}

pub fn run(args: AstArgs) -> Result<(), String> {
    let source = if args.file {
        std::fs::read_to_string(&args.input)
            .map_err(|e| format!("failed to read {}: {e}", args.input))?
    } else {
        args.input
    };

    if args.expr {
        let expression = parse_expression(&source)?;
        println!("{expression:#?}");
    } else {
        let (sections, errors) = parse(&source);
        if !errors.is_empty() {
            let joined = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("\n");
            return Err(joined);
        }
        match sections {
            Some(sections) => println!("{sections:#?}"),
            None => return Err("no sections parsed".to_string()),
        }
    }
    Ok(())
}
