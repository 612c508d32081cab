//! Terminal interaction: confirmations and spinners
//!
//! Both degrade quietly when stdin/stderr are not terminals, so scripted
//! runs never block on a prompt or get spinner frames in their logs.

use std::io::IsTerminal;
use std::time::Duration;

use dialoguer::Confirm;
use dialoguer::theme::ColorfulTheme;
use indicatif::{ProgressBar, ProgressStyle};

use colyn_core::ColynError;

/// Whether the user can be asked anything
pub fn is_interactive() -> bool {
    std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
}

/// Ask a yes/no question; returns `default` without asking when not interactive
pub fn confirm(prompt: &str, default: bool) -> Result<bool, ColynError> {
    if !is_interactive() {
        return Ok(default);
    }
    let answer = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(default)
        .interact_opt()
        .map_err(|e| ColynError::Io(std::io::Error::other(e.to_string())))?;
    // Esc/q counts as the default
    Ok(answer.unwrap_or(default))
}

/// Spinner on stderr around a slow step
pub struct Spinner(Option<ProgressBar>);

impl Spinner {
    /// Start a spinner unless `quiet` or stderr is not a terminal
    pub fn start(message: &str, quiet: bool) -> Self {
        if quiet || !std::io::stderr().is_terminal() {
            return Self(None);
        }
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg} [{elapsed}]") {
            pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        Self(Some(pb))
    }

    pub fn finish(self) {
        if let Some(pb) = &self.0 {
            pb.finish_and_clear();
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if let Some(pb) = &self.0 {
            if !pb.is_finished() {
                pb.finish_and_clear();
            }
        }
    }
}
