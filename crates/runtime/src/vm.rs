//! The dialogue VM.
//!
//! A `Vm` borrows a compiled artifact and runs one session at a time.
//! `enter` positions the cursor; `advance` walks internal nodes until
//! the dialogue suspends with a line to show, a choice to put to the
//! player, or the end of the section.

use banter_artifact::{
    Artifact, CompiledExpr, CompiledFragment, CompiledLine, CompiledNode, MarkupState, NodeKind,
    END_NODE,
};
use tracing::{debug, trace};

use crate::env::Environment;
use crate::error::{Error, Result};
use crate::eval::{eval, eval_assign};
use crate::rng::RngStream;

/// Upper bound on internal nodes crossed per advance.
pub const MAX_INTERNAL_STEPS: usize = 100;

/// A span of rendered line text under one markup state.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFragment {
    pub text: String,
    pub tags: Vec<MarkupState>,
}

/// Fragment texts joined, markup dropped.
pub fn plain_text(fragments: &[RenderedFragment]) -> String {
    fragments.iter().map(|f| f.text.as_str()).collect()
}

/// One option of a suspended choice. Disabled options may still be
/// chosen; `enabled` is advice for the host.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceView {
    pub text: Vec<RenderedFragment>,
    pub line_id: Option<String>,
    pub dest: String,
    pub enabled: bool,
}

/// Where the walk stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum Suspension {
    Say {
        node_id: String,
        tags: Vec<String>,
        speaker_id: String,
        line_id: Option<String>,
        text: Vec<RenderedFragment>,
    },
    Choice {
        node_id: String,
        tags: Vec<String>,
        options: Vec<ChoiceView>,
    },
    Ended,
}

/// Result of one advance: the suspension plus every variable the run
/// nodes on the way assigned, in first-assignment order.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub suspension: Suspension,
    pub changed_vars: Vec<String>,
}

#[derive(Debug, Clone)]
struct Cursor {
    section: String,
    node: String,
}

/// A dialogue session over one artifact.
#[derive(Debug)]
pub struct Vm<'a> {
    artifact: &'a Artifact,
    env: Environment,
    rng: RngStream,
    trace: Vec<String>,
    cursor: Option<Cursor>,
}

impl<'a> Vm<'a> {
    /// Fresh VM with a time-seeded rand stream.
    pub fn new(artifact: &'a Artifact) -> Self {
        Self::with_rng(artifact, RngStream::from_time())
    }

    /// Fresh VM with a fixed rand seed. Same seed, same walk.
    pub fn with_seed(artifact: &'a Artifact, seed: u64) -> Self {
        Self::with_rng(artifact, RngStream::new(seed))
    }

    fn with_rng(artifact: &'a Artifact, rng: RngStream) -> Self {
        Vm {
            artifact,
            env: Environment::from_spec(&artifact.environment),
            rng,
            trace: Vec::new(),
            cursor: None,
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    /// Node the next advance resumes from, while a session is running.
    /// After a say suspension this is the say's successor, so it doubles
    /// as a resume token for a later `enter`.
    pub fn current_node(&self) -> Option<&str> {
        self.cursor.as_ref().map(|c| c.node.as_str())
    }

    pub fn current_section(&self) -> Option<&str> {
        self.cursor.as_ref().map(|c| c.section.as_str())
    }

    /// Node ids visited since the last enter, in visit order.
    pub fn trace(&self) -> &[String] {
        &self.trace
    }

    /// Open a session at `section`, at `node` or the section's first
    /// node. Does not walk; call `advance` for the first suspension.
    pub fn enter(&mut self, section: &str, node: Option<&str>) -> Result<()> {
        let table = self
            .artifact
            .sections
            .get(section)
            .ok_or_else(|| Error::UnknownSection(section.to_string()))?;
        let start = node.unwrap_or(&table.start_node);
        if !table.nodes.contains_key(start) {
            return Err(Error::UnknownNode {
                section: section.to_string(),
                node: start.to_string(),
            });
        }
        debug!(section = %section, node = %start, "enter");
        self.trace.clear();
        self.cursor = Some(Cursor {
            section: section.to_string(),
            node: start.to_string(),
        });
        Ok(())
    }

    /// Walk to the next suspension. `choice` answers a pending choice
    /// by option index; pass `None` everywhere else. Advancing a
    /// suspended choice with `None` re-presents it, guards freshly
    /// evaluated.
    pub fn advance(&mut self, choice: Option<usize>) -> Result<Step> {
        if let Some(index) = choice {
            self.take_option(index)?;
        }
        self.walk()
    }

    fn take_option(&mut self, index: usize) -> Result<()> {
        let artifact = self.artifact;
        let cursor = self.cursor.as_mut().ok_or(Error::NoSession)?;
        let node = lookup(artifact, &cursor.section, &cursor.node)?;
        let options = match &node.kind {
            NodeKind::Choice { options } => options,
            _ => return Err(Error::NotAChoice),
        };
        let option = options.get(index).ok_or(Error::InvalidOption {
            index,
            len: options.len(),
        })?;
        // A disabled option is still a valid answer.
        cursor.node = option.dest.clone();
        Ok(())
    }

    fn walk(&mut self) -> Result<Step> {
        let artifact = self.artifact;
        let mut changed_vars: Vec<String> = Vec::new();
        let cursor = self.cursor.as_mut().ok_or(Error::NoSession)?;
        for _ in 0..MAX_INTERNAL_STEPS {
            if cursor.node == END_NODE {
                debug!(section = %cursor.section, "section ended");
                self.cursor = None;
                return Ok(Step {
                    suspension: Suspension::Ended,
                    changed_vars,
                });
            }
            let node = lookup(artifact, &cursor.section, &cursor.node)?;
            self.trace.push(cursor.node.clone());
            trace!(node = %cursor.node, "visit");
            match &node.kind {
                NodeKind::Say {
                    speaker_id,
                    line,
                    next,
                } => {
                    let suspension = Suspension::Say {
                        node_id: cursor.node.clone(),
                        tags: node.tags.clone(),
                        speaker_id: speaker_id.clone(),
                        line_id: line.line_id.clone(),
                        text: interpolate(line, &self.env)?,
                    };
                    // Move past the line; its successor is the resume
                    // point.
                    cursor.node = next.clone();
                    return Ok(Step {
                        suspension,
                        changed_vars,
                    });
                }
                NodeKind::Choice { options } => {
                    let mut views = Vec::with_capacity(options.len());
                    for option in options {
                        views.push(ChoiceView {
                            text: interpolate(&option.line, &self.env)?,
                            line_id: option.line.line_id.clone(),
                            dest: option.dest.clone(),
                            enabled: option_enabled(option.cond.as_ref(), &self.env)?,
                        });
                    }
                    // Cursor stays put until an option answers it.
                    return Ok(Step {
                        suspension: Suspension::Choice {
                            node_id: cursor.node.clone(),
                            tags: node.tags.clone(),
                            options: views,
                        },
                        changed_vars,
                    });
                }
                NodeKind::If {
                    cond,
                    true_dest,
                    false_dest,
                } => {
                    let value = eval(cond, &self.env)?;
                    let taken = value.as_bool().ok_or_else(|| {
                        Error::Eval(format!("condition must be bool, got {}", value.value_type()))
                    })?;
                    cursor.node = if taken {
                        true_dest.clone()
                    } else {
                        false_dest.clone()
                    };
                }
                NodeKind::Run { code, next } => {
                    let name = eval_assign(code, &mut self.env)?;
                    if !changed_vars.contains(&name) {
                        changed_vars.push(name);
                    }
                    cursor.node = next.clone();
                }
                NodeKind::Goto { dest } => {
                    cursor.node = dest.clone();
                }
                NodeKind::Rand { dests } => {
                    if dests.is_empty() {
                        return Err(Error::BadNode("rand node has no destinations".to_string()));
                    }
                    cursor.node = dests[self.rng.pick_index(dests.len())].clone();
                }
            }
        }
        Err(Error::TooManyIterations(MAX_INTERNAL_STEPS))
    }
}

fn lookup<'a>(artifact: &'a Artifact, section: &str, node: &str) -> Result<&'a CompiledNode> {
    let table = artifact
        .sections
        .get(section)
        .ok_or_else(|| Error::UnknownSection(section.to_string()))?;
    table.nodes.get(node).ok_or_else(|| Error::UnknownNode {
        section: section.to_string(),
        node: node.to_string(),
    })
}

fn interpolate(line: &CompiledLine, env: &Environment) -> Result<Vec<RenderedFragment>> {
    let mut out = Vec::with_capacity(line.text.len());
    for fragment in &line.text {
        let rendered = match fragment {
            CompiledFragment::Text { tags, text } => RenderedFragment {
                text: text.clone(),
                tags: tags.clone(),
            },
            CompiledFragment::Variable { tags, variable } => RenderedFragment {
                text: env.get(variable)?.to_string(),
                tags: tags.clone(),
            },
        };
        out.push(rendered);
    }
    Ok(out)
}

fn option_enabled(cond: Option<&CompiledExpr>, env: &Environment) -> Result<bool> {
    let cond = match cond {
        Some(cond) => cond,
        None => return Ok(true),
    };
    let value = eval(cond, env)?;
    value
        .as_bool()
        .ok_or_else(|| Error::Eval(format!("guard must be bool, got {}", value.value_type())))
}
