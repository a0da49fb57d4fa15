//! `banter play`
//!
//! Interactive terminal player. Renders `color`/`bold` markup, numbers
//! choice options 1-based, and keeps the variable environment in an
//! optional JSON file across sessions.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use banter_artifact::Artifact;
use banter_runtime::{ChoiceView, RenderedFragment, Suspension, Vm};
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct PlayArgs {
    /// Compiled artifact
    pub input: PathBuf,

    /// Section to play
    #[arg(short, long)]
    pub section: String,

    /// Environment JSON, loaded before the session and saved after
    #[arg(short, long)]
    pub env: Option<PathBuf>,

    /// Node to resume from instead of the section start
    #[arg(short, long)]
    pub node: Option<String>,
}

pub fn run(args: PlayArgs) -> Result<(), String> {
    let artifact = Artifact::load(&args.input).map_err(|e| e.to_string())?;
    let mut vm = Vm::new(&artifact);

    if let Some(env_path) = &args.env {
        if env_path.is_file() {
            let text = fs::read_to_string(env_path)
                .map_err(|e| format!("failed to read {}: {e}", env_path.display()))?;
            vm.env_mut().load_json(&text).map_err(|e| e.to_string())?;
        }
    }

    vm.enter(&args.section, args.node.as_deref())
        .map_err(|e| e.to_string())?;

    let mut step = vm.advance(None).map_err(|e| e.to_string())?;
    loop {
        for var in &step.changed_vars {
            let value = vm.env().get(var).map_err(|e| e.to_string())?;
            let line = format!("# SET {var} = {value}");
            println!("{}", line.as_str().dimmed().bold());
        }
        match &step.suspension {
            Suspension::Say {
                speaker_id, text, ..
            } => {
                println!("{}: {}", speaker_id, render_text(text));
                step = vm.advance(None).map_err(|e| e.to_string())?;
            }
            Suspension::Choice { options, .. } => {
                let answer = present_choice(options)?;
                println!();
                step = vm.advance(Some(answer)).map_err(|e| e.to_string())?;
            }
            Suspension::Ended => break,
        }
    }

    if let Some(env_path) = &args.env {
        let json = vm.env().to_json().map_err(|e| e.to_string())?;
        fs::write(env_path, json)
            .map_err(|e| format!("failed to write {}: {e}", env_path.display()))?;
    }
    Ok(())
}

fn render_text(fragments: &[RenderedFragment]) -> String {
    let mut out = String::new();
    for fragment in fragments {
        let mut piece = fragment.text.as_str().normal();
        for tag in &fragment.tags {
            match tag.name.as_str() {
                "color" => {
                    if let Some(name) = &tag.parameter {
                        piece = piece.color(name.as_str());
                    }
                }
                "bold" => piece = piece.bold(),
                _ => {}
            }
        }
        out.push_str(&piece.to_string());
    }
    out
}

/// Print the options and prompt until an enabled one is chosen.
/// Returns the zero-based option index.
fn present_choice(options: &[ChoiceView]) -> Result<usize, String> {
    let mut valid = Vec::new();
    for (i, option) in options.iter().enumerate() {
        let number = i + 1;
        let label = if option.enabled {
            valid.push(number);
            number.to_string()
        } else {
            "X".dimmed().to_string()
        };
        let dest = format!("@{}", option.dest);
        println!(
            "{}. {} -> {}",
            label,
            render_text(&option.text),
            dest.as_str().dimmed().underline()
        );
    }
    if valid.is_empty() {
        return Err("no valid answers".to_string());
    }
    Ok(read_answer(&valid)? - 1)
}

fn read_answer(valid: &[usize]) -> Result<usize, String> {
    let mut line = String::new();
    loop {
        print!("Answer: ");
        io::stdout().flush().map_err(|e| e.to_string())?;
        line.clear();
        let read = io::stdin()
            .read_line(&mut line)
            .map_err(|e| e.to_string())?;
        if read == 0 {
            return Err("stdin closed mid-choice".to_string());
        }
        match line.trim().parse::<usize>() {
            Ok(n) if valid.contains(&n) => return Ok(n),
            Ok(_) => println!("Not a valid option"),
            Err(_) => println!("Input must be a number"),
        }
    }
}
