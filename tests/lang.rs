use std::{fs, str};

use pretty_assertions::assert_eq;
use test_generator::test_resources;

use skiff_common::error::report_err;
use skiff_interpreter::Interpreter;

/// Runs every script under `tests/lang/` and compares what it writes
/// (including rendered diagnostics) against its `// out:` comments.
#[test_resources("tests/lang/**/*.sk")]
fn run_file(path: &str) {
    let source = fs::read_to_string(path).unwrap();

    let mut exp_output = String::new();
    for line in source.lines() {
        const OUT_COMMENT: &str = "// out: ";
        if let Some(idx) = line.find(OUT_COMMENT) {
            exp_output += &line[idx + OUT_COMMENT.len()..];
            exp_output += "\n";
        }
    }

    let mut got_output = Vec::new();
    let errors = {
        let mut interpreter = Interpreter::new(&mut got_output);
        interpreter.run(&source)
    };
    for err in &errors {
        report_err(&mut got_output, &source, err);
    }

    let got_output = str::from_utf8(&got_output).expect("invalid UTF-8 in output");
    assert_eq!(exp_output, got_output);
}
