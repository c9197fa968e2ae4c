use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
  Step(u32), // step N instants
  Status,
  Continue,
  Quit,
}

/// Line-edited prompt for interactive stepping.
pub struct Shell {
  editor: DefaultEditor,
}

impl Shell {
  pub fn new() -> io::Result<Self> {
    let editor = DefaultEditor::new().map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    Ok(Self { editor })
  }

  pub fn read_command(&mut self) -> io::Result<Command> {
    loop {
      match self.editor.readline("(convcore) ") {
        Ok(line) => {
          let trimmed = line.trim();
          if !trimmed.is_empty() {
            let _ = self.editor.add_history_entry(trimmed);
          }
          match parse_command(trimmed) {
            Ok(cmd) => return Ok(cmd),
            Err(msg) => eprintln!("{}", msg),
          }
        },
        // Ctrl-C / Ctrl-D
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return Ok(Command::Quit),
        Err(err) => return Err(io::Error::new(io::ErrorKind::Other, err)),
      }
    }
  }
}

/// Empty line steps once; `si N` steps N times; `s` prints model status;
/// `c` continues without prompting; `q` quits.
pub fn parse_command(line: &str) -> Result<Command, String> {
  let line = line.trim();
  if line.is_empty() {
    return Ok(Command::Step(1));
  }

  if let Some(rest) = line.strip_prefix("si") {
    let num_str = rest.trim();
    if num_str.is_empty() {
      return Err(String::from("Error: 'si' requires a number, e.g., 'si 100'"));
    }
    return match num_str.parse::<u32>() {
      Ok(n) if n > 0 => Ok(Command::Step(n)),
      Ok(_) => Err(String::from("Error: step count must be greater than 0")),
      Err(e) => Err(format!("Error: invalid number '{}': {}", num_str, e)),
    };
  }

  match line {
    "s" | "status" => Ok(Command::Status),
    "c" => Ok(Command::Continue),
    "q" => Ok(Command::Quit),
    other => Err(format!(
      "Unknown command: '{}'. Use Enter to step, 'si 100' to step N times, 's' for status, 'c' to continue, 'q' to quit",
      other
    )),
  }
}
