//! CLI interface and command handling

use clap::{Parser, Subcommand};

/// crm-assist - ask an LLM about your CRM
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short, long, env = "CRM_ASSIST_DEBUG")]
    pub debug: bool,

    /// Never prompt; store placeholder credentials instead
    #[arg(long)]
    pub headless: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authorize access to the CRM
    ConnectCrm,

    /// Store an LLM API key (skipped when one is already stored)
    ConnectLlm,

    /// Show which services are connected
    Status,

    /// Ask a question answered with LLM output and CRM data
    Ask {
        /// The question to send
        message: String,
    },

    /// Forget all stored credentials
    Logout,

    /// Configure the CLI
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,

        /// Set the OAuth client id
        #[arg(long)]
        client_id: Option<String>,

        /// Set the OAuth redirect URI
        #[arg(long)]
        redirect_uri: Option<String>,

        /// Set the LLM model
        #[arg(long)]
        model: Option<String>,

        /// Set base URL for the LLM API
        #[arg(long)]
        base_url: Option<String>,
    },
}
