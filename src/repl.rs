use std::path::PathBuf;

use rustyline::{DefaultEditor, Result as RustylineResult};

const HISTORY_FILE: &str = ".sprig_history";

/// Interactive line editor with history persisted across sessions.
pub struct Repl {
    editor: DefaultEditor,
}

impl Repl {
    pub fn new() -> RustylineResult<Self> {
        let mut editor = DefaultEditor::new()?;
        let _ = editor.load_history(&Self::history_file_path());
        Ok(Repl { editor })
    }

    fn history_file_path() -> PathBuf {
        match std::env::var("HOME") {
            Ok(home) => PathBuf::from(home).join(HISTORY_FILE),
            Err(_) => PathBuf::from(HISTORY_FILE),
        }
    }

    pub fn read_line(&mut self, prompt: &str) -> RustylineResult<String> {
        self.editor.readline(prompt)
    }

    pub fn add_history(&mut self, line: &str) {
        let _ = self.editor.add_history_entry(line);
    }

    /// Save history to disk.
    pub fn finalize(&mut self) {
        let _ = self.editor.save_history(&Self::history_file_path());
    }
}
