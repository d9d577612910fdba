//! Terminal operator for headless runs

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::Operator;

pub struct ConsoleOperator {
    input: Mutex<Box<dyn BufRead + Send>>,
    output: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleOperator {
    pub fn new(input: impl BufRead + Send + 'static, output: impl Write + Send + 'static) -> Self {
        Self {
            input: Mutex::new(Box::new(input)),
            output: Mutex::new(Box::new(output)),
        }
    }

    pub fn stdio() -> Self {
        Self::new(io::BufReader::new(io::stdin()), io::stdout())
    }

    fn ask(&self, question: &str) -> Option<String> {
        {
            let mut out = self.output.lock();
            let _ = write!(out, "{}", question);
            let _ = out.flush();
        }
        let mut line = String::new();
        match self.input.lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }

    fn say(&self, message: &str) {
        let mut out = self.output.lock();
        let _ = writeln!(out, "{}", message);
        let _ = out.flush();
    }
}

/// Accepts a 1-based index or the option text itself
pub fn parse_choice(answer: &str, options: &[String]) -> Option<String> {
    let answer = answer.trim();
    if answer.is_empty() {
        return None;
    }
    if let Ok(index) = answer.parse::<usize>() {
        if (1..=options.len()).contains(&index) {
            return Some(options[index - 1].clone());
        }
    }
    options.iter().find(|o| o.as_str() == answer).cloned()
}

impl Operator for ConsoleOperator {
    fn choose_one(&self, title: &str, prompt: &str, options: &[String]) -> Option<String> {
        if options.is_empty() {
            return None;
        }
        self.say(&format!("== {} ==", title));
        self.say(prompt);
        for (i, option) in options.iter().enumerate() {
            self.say(&format!("  {}. {}", i + 1, option));
        }

        loop {
            let answer = self.ask(&format!("Enter number (1-{}), empty to cancel: ", options.len()))?;
            if answer.is_empty() {
                return None;
            }
            match parse_choice(&answer, options) {
                Some(choice) => return Some(choice),
                None => self.say("Invalid selection"),
            }
        }
    }

    fn choose_folder(&self, prompt: &str, default: &Path) -> Option<PathBuf> {
        self.say(prompt);
        let answer = self.ask(&format!("Folder [{}]: ", default.display()))?;
        if answer.is_empty() {
            Some(default.to_path_buf())
        } else {
            Some(PathBuf::from(answer))
        }
    }

    fn alert(&self, message: &str) {
        eprintln!("ERROR: {}", message);
    }

    fn notify(&self, message: &str) {
        self.say(message);
    }
}
