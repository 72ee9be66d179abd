use std::io::{self, BufRead, Write};

/// Interactive input needed by `auth set` (terminal in production, scripted in tests).
pub trait Prompter {
    /// Read a visible line; an empty answer yields `default` (or an empty string).
    fn line(&mut self, label: &str, default: Option<&str>) -> io::Result<String>;

    /// Read a line without echoing it.
    fn secret(&mut self, label: &str) -> io::Result<String>;
}

pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn line(&mut self, label: &str, default: Option<&str>) -> io::Result<String> {
        let mut stdout = io::stdout();
        match default {
            Some(default) => write!(stdout, "{label} [{default}] ")?,
            None => write!(stdout, "{label} ")?,
        }
        stdout.flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(or_default(answer.trim(), default))
    }

    fn secret(&mut self, label: &str) -> io::Result<String> {
        rpassword::prompt_password(format!("{label} ")).map(|s| s.trim().to_string())
    }
}

fn or_default(answer: &str, default: Option<&str>) -> String {
    if answer.is_empty() {
        default.unwrap_or_default().to_string()
    } else {
        answer.to_string()
    }
}

/// Replays canned answers in order.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: std::collections::VecDeque<String>,
}

#[cfg(test)]
impl ScriptedPrompter {
    pub fn push(&mut self, answer: &str) {
        self.answers.push_back(answer.to_string());
    }

    fn next(&mut self) -> io::Result<String> {
        self.answers
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no scripted answer left"))
    }
}

#[cfg(test)]
impl Prompter for ScriptedPrompter {
    fn line(&mut self, _label: &str, default: Option<&str>) -> io::Result<String> {
        let answer = self.next()?;
        Ok(or_default(answer.trim(), default))
    }

    fn secret(&mut self, _label: &str) -> io::Result<String> {
        self.next()
    }
}
