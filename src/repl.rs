use std::borrow::Cow;
use std::io;

use anyhow::Result;
use reedline as rl;

use skiff_common::error::report_err;
use skiff_interpreter::Interpreter;

/// The interactive shell. Every submitted line runs as a whole program
/// against one persistent interpreter, so globals carry over between
/// lines; a failed line reports its diagnostics and prompts again.
pub fn run() -> Result<()> {
    let mut editor = rl::Reedline::create();
    let mut stdout = io::stdout();
    let mut interpreter = Interpreter::new(&mut stdout);
    loop {
        match editor.read_line(&Prompt)? {
            rl::Signal::Success(line) => {
                let errors = interpreter.run(&line);
                let mut stderr = io::stderr().lock();
                for err in &errors {
                    report_err(&mut stderr, &line, err);
                }
            }
            rl::Signal::CtrlC => continue,
            rl::Signal::CtrlD => {
                println!("Exiting..");
                return Ok(());
            }
        }
    }
}

struct Prompt;

impl rl::Prompt for Prompt {
    fn render_prompt_left(&self) -> Cow<str> {
        Cow::Borrowed(">> ")
    }

    fn render_prompt_right(&self) -> Cow<str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _: rl::PromptEditMode) -> Cow<str> {
        Cow::Borrowed("")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<str> {
        Cow::Borrowed(".. ")
    }

    fn render_prompt_history_search_indicator(&self, _: rl::PromptHistorySearch) -> Cow<str> {
        Cow::Borrowed("")
    }
}
