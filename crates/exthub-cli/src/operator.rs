use std::cell::RefCell;
use std::io::{self, BufRead, StdinLock, Write};

use anyhow::{anyhow, Context, Result};
use exthub_core::{ParamDefinition, ParamType};
use exthub_update::{Operator, SpecChanges, UpdateNotice, UpdateWarning};
use semver::Version;

use crate::render::{TerminalRenderer, TerminalSpinner};
use crate::report::{change_lines, notice_lines};

const MAX_PARAM_ATTEMPTS: usize = 3;

/// Operator backed by the terminal. In non-interactive mode every
/// confirmation is accepted and parameters take their suggested value.
pub struct TerminalOperator<R> {
    renderer: TerminalRenderer,
    interactive: bool,
    input: RefCell<R>,
    spinner: RefCell<Option<TerminalSpinner>>,
}

impl TerminalOperator<StdinLock<'static>> {
    pub fn stdin(renderer: TerminalRenderer, interactive: bool) -> Self {
        Self::new(renderer, interactive, io::stdin().lock())
    }
}

impl<R: BufRead> TerminalOperator<R> {
    pub fn new(renderer: TerminalRenderer, interactive: bool, input: R) -> Self {
        Self {
            renderer,
            interactive,
            input: RefCell::new(input),
            spinner: RefCell::new(None),
        }
    }

    /// Clears a spinner left running by a failed update.
    pub fn finish_pending(&self) {
        if let Some(spinner) = self.spinner.borrow_mut().take() {
            spinner.finish_abandon();
        }
    }

    fn read_answer(&self, prompt: &str) -> Result<String> {
        print!("{prompt}");
        io::stdout().flush().context("failed to flush prompt")?;
        let mut line = String::new();
        let bytes = self
            .input
            .borrow_mut()
            .read_line(&mut line)
            .context("failed to read answer")?;
        if bytes == 0 {
            return Err(anyhow!("input closed while waiting for an answer"));
        }
        Ok(line.trim().to_string())
    }

    fn confirm(&self, question: &str) -> Result<bool> {
        if !self.interactive {
            self.renderer
                .print_status("info", &format!("{question} yes (non-interactive)"));
            return Ok(true);
        }
        let answer = self.read_answer(&format!("{question} (y/N) "))?;
        Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
    }
}

impl<R: BufRead> Operator for TerminalOperator<R> {
    fn notify(&self, notice: &UpdateNotice) {
        if let UpdateNotice::Updated { .. } = notice {
            if let Some(spinner) = self.spinner.borrow_mut().take() {
                spinner.finish_success();
            }
        }
        for (status, line) in notice_lines(notice) {
            self.renderer.print_status(status, &line);
        }
        if let UpdateNotice::Updating { .. } = notice {
            *self.spinner.borrow_mut() = Some(self.renderer.start_spinner("update"));
        }
    }

    fn confirm_warning(&self, warning: &UpdateWarning) -> Result<bool> {
        for paragraph in warning.description.split("\n\n") {
            self.renderer.print_status("warn", paragraph);
        }
        self.confirm("Do you wish to continue?")
    }

    fn confirm_retry(&self, _instance_id: &str, version: &Version) -> Result<bool> {
        self.confirm(&format!("Re-apply version {version} anyway?"))
    }

    fn present_changes(&self, changes: &SpecChanges) {
        self.renderer.print_section("Changes");
        for line in change_lines(changes) {
            self.renderer.print_status("info", &line);
        }
    }

    fn confirm_changes(&self, _changes: &SpecChanges) -> Result<bool> {
        self.renderer.print_status(
            "warn",
            "This update grants the extension access to new APIs or roles.",
        );
        self.confirm("Do you wish to continue?")
    }

    fn prompt_param(
        &self,
        _project_id: &str,
        param: &ParamDefinition,
        suggestion: Option<&str>,
    ) -> Result<String> {
        if !self.interactive {
            return match suggestion {
                Some(value) => Ok(value.to_string()),
                None if !param.required => Ok(String::new()),
                None => Err(anyhow!(
                    "param {} requires a value and has no default; rerun without \
                     --non-interactive to enter one",
                    param.param
                )),
            };
        }

        self.renderer.print_section(&param.label);
        if let Some(description) = &param.description {
            self.renderer.print_status("info", description);
        }
        if matches!(param.kind, ParamType::Select | ParamType::Multiselect) {
            let options = param
                .options
                .iter()
                .map(|option| option.value.as_str())
                .collect::<Vec<_>>();
            self.renderer
                .print_status("info", &format!("options: {}", options.join(", ")));
        }

        let prompt = match suggestion {
            Some(value) if !param.is_secret() => format!("{} [{value}]: ", param.param),
            _ => format!("{}: ", param.param),
        };
        let mut answer = String::new();
        for _ in 0..MAX_PARAM_ATTEMPTS {
            answer = self.read_answer(&prompt)?;
            if answer.is_empty() {
                answer = suggestion.unwrap_or_default().to_string();
            }
            match param.validate_value(&answer) {
                Ok(()) => break,
                Err(err) => self.renderer.print_status("err", &err.to_string()),
            }
        }
        Ok(answer)
    }
}
