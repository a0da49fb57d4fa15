//! End-to-end tests for the Banter toolchain.
//!
//! Each test drives the whole pipeline the way the CLI does: sources
//! and config in, artifact out, then a VM session over the result.

use banter_artifact::{Artifact, NodeKind, Value};
use banter_compiler::CompileError;
use banter_dsl::Severity;
use banter_runtime::{plain_text, Error, Suspension, Vm, MAX_INTERNAL_STEPS};
use banter_tests::{expect_choice, expect_say, TestProject};

/// A say line followed by a guarded choice: the guard state shows up
/// in the option views, and answering moves to the option's target.
#[test]
fn test_say_then_guarded_choice() {
    let artifact = TestProject::from_source(
        r#"== start ==
guide: "Hi"
* |flag == true| "One" -> @a
* "Two" -> @b
@a
guide: "A"
goto @end
@b
guide: "B"
"#,
    )
    .config(
        r#"
environment:
  variables:
    - name: flag
      type: bool
      default: false
"#,
    )
    .build_clean();

    let mut vm = Vm::new(&artifact);
    vm.enter("start", None).unwrap();

    let (speaker, text) = expect_say(&vm.advance(None).unwrap());
    assert_eq!(speaker, "guide");
    assert_eq!(text, "Hi");

    let options = expect_choice(&vm.advance(None).unwrap());
    assert!(!options[0].enabled);
    assert!(options[1].enabled);

    let (_, text) = expect_say(&vm.advance(Some(1)).unwrap());
    assert_eq!(text, "B");
    assert_eq!(
        vm.advance(None).unwrap().suspension,
        Suspension::Ended
    );
}

/// A run node inside a loop reports its variable on every pass and the
/// assignments accumulate in the environment.
#[test]
fn test_run_node_reports_changes_each_pass() {
    let artifact = TestProject::from_source(
        r#"== loop ==
@line
talker: "Again."
run |x = x + 1|
goto @line
"#,
    )
    .config(
        r#"
environment:
  variables:
    - name: x
      type: int
      default: 0
"#,
    )
    .build_clean();

    let mut vm = Vm::new(&artifact);
    vm.enter("loop", None).unwrap();

    let step = vm.advance(None).unwrap();
    assert!(step.changed_vars.is_empty());

    let step = vm.advance(None).unwrap();
    assert_eq!(step.changed_vars, ["x"]);
    let step = vm.advance(None).unwrap();
    assert_eq!(step.changed_vars, ["x"]);

    assert_eq!(vm.env().get("x").unwrap(), &Value::Int(2));
}

/// An if without an explicit false branch, sitting last in its
/// section, falls through to the end sentinel.
#[test]
fn test_trailing_if_falls_through_to_end() {
    let artifact = TestProject::from_source(
        r#"== tail ==
@top
talker: "Checking."
if |flag| -> @top
"#,
    )
    .config(
        r#"
environment:
  variables:
    - name: flag
      type: bool
      default: false
"#,
    )
    .build_clean();

    let false_dest = artifact.sections["tail"]
        .nodes
        .values()
        .find_map(|node| match &node.kind {
            NodeKind::If { false_dest, .. } => Some(false_dest.clone()),
            _ => None,
        });
    assert_eq!(false_dest.as_deref(), Some("end"));
}

/// Balanced, declared markup lints clean; dropping the closing tag
/// produces exactly one warning.
#[test]
fn test_markup_lints_only_when_unbalanced() {
    let config = r#"
environment:
  markup:
    - name: color
      parameter: "[a-z]+"
"#;

    TestProject::from_source("== scene ==\ntalker: \"[color:red]Hello[/color] world\"\n")
        .config(config)
        .build_clean();

    let output = TestProject::from_source("== scene ==\ntalker: \"[color:red]Hello world\"\n")
        .config(config)
        .build();
    assert_eq!(output.diagnostics.len(), 1);
    assert_eq!(output.diagnostics[0].severity, Severity::Warning);
    assert_eq!(
        output.diagnostics[0].message,
        "Unclosed markup tags: color"
    );
}

/// Sections, speakers, and source records keep command-line input
/// order across files.
#[test]
fn test_multi_file_project_keeps_input_order() {
    let artifact = TestProject::new()
        .file("intro.btr", "== intro ==\nayla: \"First.\"\n")
        .file("outro.btr", "== outro ==\nbrun: \"Last.\"\n")
        .build_clean();

    let sections: Vec<&String> = artifact.sections.keys().collect();
    assert_eq!(sections, ["intro", "outro"]);
    assert_eq!(artifact.speaker_ids, ["ayla", "brun"]);
    assert_eq!(artifact.sources.len(), 2);
    assert_eq!(artifact.sources[0].path, "intro.btr");
    assert_eq!(artifact.sections["outro"].source_file, "outro.btr");
}

/// Sidecar metadata lands on its line; entries matching nothing abort
/// the compile.
#[test]
fn test_metadata_folds_in_and_dangles_fatally() {
    let artifact = TestProject::from_source("== intro ==\nayla: \"First.\" ^l001\n")
        .metadata(r#"{"intro": {"l001": {"status": "final"}}}"#)
        .build_clean();

    let meta = artifact.sections["intro"]
        .nodes
        .values()
        .find_map(|node| match &node.kind {
            NodeKind::Say { line, .. } => line.meta.as_ref(),
            _ => None,
        })
        .expect("line metadata missing");
    assert_eq!(meta.get("status").map(String::as_str), Some("final"));

    let err = TestProject::from_source("== intro ==\nayla: \"First.\" ^l001\n")
        .metadata(r#"{"intro": {"zzz": {"status": "final"}}}"#)
        .try_build()
        .unwrap_err();
    assert!(matches!(
        err,
        CompileError::DanglingMetadata { section, line_id }
            if section == "intro" && line_id == "zzz"
    ));
}

/// The build id tracks script content, not compile runs.
#[test]
fn test_build_id_is_stable_across_recompiles() {
    let source = "== intro ==\nayla: \"First.\"\n";
    let first = TestProject::from_source(source).build_clean();
    let second = TestProject::from_source(source).build_clean();
    assert_eq!(first.build_id, second.build_id);

    let changed = TestProject::from_source("== intro ==\nayla: \"Second.\"\n").build_clean();
    assert_ne!(first.build_id, changed.build_id);
}

/// Runtime faults come back as errors, not panics: bad section names
/// and sections that never suspend.
#[test]
fn test_runtime_faults_surface_as_errors() {
    let artifact = TestProject::from_source("== spin ==\n@again\ngoto @again\n").build_clean();

    let mut vm = Vm::new(&artifact);
    assert!(matches!(
        vm.enter("missing", None),
        Err(Error::UnknownSection(name)) if name == "missing"
    ));

    vm.enter("spin", None).unwrap();
    assert!(matches!(
        vm.advance(None),
        Err(Error::TooManyIterations(MAX_INTERNAL_STEPS))
    ));
}

/// A small quest end to end: interpolation, markup onto fragments,
/// guarded choice, state changes, and an if routing on the result.
#[test]
fn test_quest_walkthrough() {
    let artifact = TestProject::from_source(
        r#"== quest ==
@greet
elder: "Welcome, {name}." ^q001
* |coins >= 10| "Take my [color:gold]offering[/color]." -> @accept
* "I have nothing." -> @refuse
@accept
run |coins = coins - 10|
run |honored = true|
elder: "The village thanks you."
goto @done
@refuse
elder: "Come back richer."
goto @done
@done
if |honored| -> @blessed
goto @end
@blessed
elder: "Go blessed, {name}."
"#,
    )
    .config(
        r#"
speaker_ids:
  - elder
environment:
  variables:
    - name: name
      type: string
      default: "Rook"
    - name: coins
      type: int
      default: 12
    - name: honored
      type: bool
      default: false
  markup:
    - name: color
      parameter: "[a-z]+"
"#,
    )
    .build_clean();

    let mut vm = Vm::new(&artifact);
    vm.enter("quest", None).unwrap();

    let (speaker, text) = expect_say(&vm.advance(None).unwrap());
    assert_eq!(speaker, "elder");
    assert_eq!(text, "Welcome, Rook.");

    let options = expect_choice(&vm.advance(None).unwrap());
    assert!(options[0].enabled);
    let decorated = options[0]
        .text
        .iter()
        .any(|fragment| {
            fragment.tags.iter().any(|tag| {
                tag.name == "color" && tag.parameter.as_deref() == Some("gold")
            })
        });
    assert!(decorated, "markup did not survive to the option view");

    let step = vm.advance(Some(0)).unwrap();
    assert_eq!(step.changed_vars, ["coins", "honored"]);
    let (_, text) = expect_say(&step);
    assert_eq!(text, "The village thanks you.");
    assert_eq!(vm.env().get("coins").unwrap(), &Value::Int(2));

    let (_, text) = expect_say(&vm.advance(None).unwrap());
    assert_eq!(text, "Go blessed, Rook.");
    assert_eq!(vm.advance(None).unwrap().suspension, Suspension::Ended);
}

/// Markup splits a line into fragments whose texts concatenate back
/// to the visible sentence while each span keeps its own tag state.
#[test]
fn test_rendered_fragments_reassemble_the_line() {
    let artifact = TestProject::from_source(
        r#"== scene ==
bard: "A [b]bold [color:red]{name}[/color][/b] appears"
"#,
    )
    .config(
        r#"
environment:
  variables:
    - name: name
      type: string
      default: "fox"
  markup:
    - name: b
    - name: color
      parameter: "[a-z]+"
"#,
    )
    .build_clean();

    let mut vm = Vm::new(&artifact);
    vm.enter("scene", None).unwrap();
    let step = vm.advance(None).unwrap();
    let text = match step.suspension {
        Suspension::Say { text, .. } => text,
        other => panic!("expected a say suspension, got {other:?}"),
    };

    let parts: Vec<&str> = text.iter().map(|f| f.text.as_str()).collect();
    assert_eq!(parts, ["A ", "bold ", "fox", " appears"]);
    assert_eq!(plain_text(&text), "A bold fox appears");

    assert!(text[0].tags.is_empty());
    assert_eq!(text[1].tags.len(), 1);
    assert_eq!(text[1].tags[0].name, "b");
    assert!(text[1].tags[0].parameter.is_none());
    assert_eq!(text[2].tags.len(), 2);
    assert_eq!(text[2].tags[0].name, "b");
    assert_eq!(text[2].tags[1].name, "color");
    assert_eq!(text[2].tags[1].parameter.as_deref(), Some("red"));
    assert!(text[3].tags.is_empty());
}

/// Every expression the analyzer lets through also evaluates without a
/// runtime fault against an environment built from the declarations.
#[test]
fn test_type_checked_expressions_evaluate_without_faults() {
    let guards = [
        "not done and (coins + 2) * 3 - 1 >= cost / 2",
        "title == \"thane\" or title != \"\"",
        "coins == 12 and bonus > 0.5",
        "bonus * 2.0 <= 3.5 or not (coins < 0)",
        "done == false",
    ];
    let mut source = String::new();
    for (i, guard) in guards.iter().enumerate() {
        source.push_str(&format!(
            "== g{i} ==\nif |{guard}| -> @yes else @no\n\
             @yes\nvoice: \"yes\"\ngoto @end\n\
             @no\nvoice: \"no\"\n",
        ));
    }
    source.push_str(
        "== assigns ==\n\
         run |coins = coins + 1|\n\
         run |bonus = bonus * 2.0|\n\
         run |title = \"elder\"|\n\
         run |done = not done|\n\
         voice: \"ok\"\n",
    );

    let artifact = TestProject::new()
        .file("guards.btr", &source)
        .config(
            r#"
environment:
  variables:
    - name: done
      type: bool
      default: false
    - name: coins
      type: int
      default: 12
    - name: cost
      type: int
      default: 4
    - name: bonus
      type: float
      default: 1.5
    - name: title
      type: string
      default: "thane"
"#,
        )
        .build_clean();

    for (i, guard) in guards.iter().enumerate() {
        let mut vm = Vm::new(&artifact);
        vm.enter(&format!("g{i}"), None).unwrap();
        let step = vm.advance(None);
        assert!(step.is_ok(), "guard `{guard}` faulted: {:?}", step.err());
    }

    let mut vm = Vm::new(&artifact);
    vm.enter("assigns", None).unwrap();
    let step = vm.advance(None).unwrap();
    assert_eq!(step.changed_vars, ["coins", "bonus", "title", "done"]);
}

/// The artifact survives its own JSON representation unchanged, the
/// way `play` loads what `compile` wrote.
#[test]
fn test_artifact_round_trips_through_json() {
    let artifact = TestProject::from_source(
        r#"== intro ==
ayla: "Hello, {name}." ^a001
* "Bye." -> @end
"#,
    )
    .config(
        r#"
environment:
  variables:
    - name: name
      type: string
      default: "Sel"
"#,
    )
    .build_clean();

    let json = artifact.to_json().unwrap();
    let reloaded = Artifact::from_json(&json).unwrap();
    assert_eq!(artifact, reloaded);
}
