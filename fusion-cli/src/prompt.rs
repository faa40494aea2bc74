use fusion::error::{ErrorKind, FusionResult};
use fusion::fusion_error;
use fusion::select::{KeySelector, TableSelector};
use fusion::types::TableName;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::sync::Mutex;

use crate::error::CliResult;

/// Resolves a typed answer against `names`.
///
/// Accepts the 1-based position of a name or the name itself. Returns the index of the
/// chosen name, `None` when the answer matches nothing.
pub fn parse_choice(input: &str, names: &[String]) -> Option<usize> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(position) = input.parse::<usize>() {
        return (1..=names.len()).contains(&position).then(|| position - 1);
    }

    names.iter().position(|name| name == input)
}

/// Console prompt asking the user to pick a table or a key column.
pub struct Prompt {
    editor: Mutex<DefaultEditor>,
}

impl Prompt {
    pub fn new() -> CliResult<Self> {
        Ok(Self {
            editor: Mutex::new(DefaultEditor::new()?),
        })
    }

    fn choose(&self, title: &str, names: &[String]) -> FusionResult<usize> {
        if names.is_empty() {
            return Err(fusion_error!(
                ErrorKind::SelectionFailed,
                "Nothing to choose from",
                format!("No {title} is available")
            ));
        }

        let mut editor = self.editor.lock().map_err(|_| {
            fusion_error!(ErrorKind::SelectionFailed, "Prompt is unavailable")
        })?;

        println!("Choose a {title}:");
        for (index, name) in names.iter().enumerate() {
            println!("  {}. {name}", index + 1);
        }

        loop {
            match editor.readline("> ") {
                Ok(line) => match parse_choice(&line, names) {
                    Some(index) => return Ok(index),
                    None => println!("'{}' is not one of the listed choices", line.trim()),
                },
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => {
                    return Err(fusion_error!(
                        ErrorKind::SelectionFailed,
                        "Selection cancelled",
                        format!("No {title} was chosen")
                    ));
                }
                Err(err) => {
                    return Err(fusion_error!(
                        ErrorKind::SelectionFailed,
                        "Prompt failed",
                        err
                    ));
                }
            }
        }
    }
}

impl KeySelector for Prompt {
    fn select_key(&self, candidates: &[String]) -> FusionResult<String> {
        let index = self.choose("key column", candidates)?;

        Ok(candidates[index].clone())
    }
}

impl TableSelector for Prompt {
    fn select_table(&self, candidates: &[TableName]) -> FusionResult<TableName> {
        let names: Vec<String> = candidates.iter().map(ToString::to_string).collect();
        let index = self.choose("table", &names)?;

        Ok(candidates[index].clone())
    }
}
