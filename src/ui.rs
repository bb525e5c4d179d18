//! Terminal interactions: prompts, the authorization launcher, and output

use crate::auth::{HostError, InteractiveAuthHost, KeyPrompt, KeyRequest};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use textwrap::{wrap, Options};
use url::Url;

/// Get user input with a prompt; empty input is allowed
pub fn get_input(prompt: &str) -> io::Result<String> {
    Input::<String>::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()
        .map_err(io::Error::other)
}

/// Read a secret without echoing it
pub fn get_secret(prompt: &str) -> io::Result<String> {
    Password::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .allow_empty_password(true)
        .interact()
        .map_err(io::Error::other)
}

/// Authorization launcher that has the user open the URL and paste the redirect back
pub struct TerminalAuthHost;

#[async_trait]
impl InteractiveAuthHost for TerminalAuthHost {
    async fn launch_web_auth_flow(
        &self,
        url: &Url,
        _interactive: bool,
    ) -> std::result::Result<String, HostError> {
        println!();
        println!("{}", "Open this URL in your browser and approve access:".yellow().bold());
        println!("  {}", url.as_str().cyan());
        println!();

        let redirect = tokio::task::spawn_blocking(|| {
            get_input("Paste the URL your browser was redirected to")
        })
        .await
        .map_err(|e| HostError(e.to_string()))?
        .map_err(|e| HostError(e.to_string()))?;

        let redirect = redirect.trim();
        if redirect.is_empty() {
            return Err(HostError("authorization was cancelled".to_string()));
        }
        Ok(redirect.to_string())
    }
}

/// Key prompt reading from the terminal
pub struct TerminalKeyPrompt;

#[async_trait]
impl KeyPrompt for TerminalKeyPrompt {
    async fn request_key(&self, request: &KeyRequest) -> Result<Option<String>> {
        let message = request.message().trim_end_matches(':').to_string();
        let key = tokio::task::spawn_blocking(move || get_secret(&message))
            .await
            .map_err(|e| AppError::IoError(io::Error::other(e)))??;

        Ok(Some(key).filter(|k| !k.trim().is_empty()))
    }
}

/// Get terminal width for proper text wrapping with margins
fn get_terminal_width() -> usize {
    let full_width = terminal_size::terminal_size()
        .map(|(width, _)| width.0 as usize)
        .unwrap_or(80);

    full_width.saturating_sub(8).max(20)
}

/// Wrap text to fit terminal width with a small left margin
pub fn wrap_text(text: &str) -> String {
    let options = Options::new(get_terminal_width()).break_words(false);

    text.lines()
        .flat_map(|line| {
            if line.trim().is_empty() {
                vec![String::new()]
            } else {
                wrap(line, &options)
                    .into_iter()
                    .map(|l| format!("  {l}"))
                    .collect()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Display a response
pub fn display_response(response: &str) {
    println!();
    println!("{}", "Assistant:".green().bold());
    println!();
    println!("{}", wrap_text(response));
    println!();
}

/// Display an error message
pub fn display_error(error: &AppError) {
    eprintln!("{} {}", "Error:".red().bold(), error.user_message());
}

/// Display a success message
pub fn display_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Display one line of the connection status
pub fn display_status(label: &str, connected: bool) {
    let state = if connected {
        "connected".green()
    } else {
        "not connected".red()
    };
    println!("  {label:<6} {state}");
}

/// Create a spinner for loading states
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
