//! crm-assist - connect a CRM and an LLM provider and query both

pub mod auth;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod crm;
pub mod environment;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod storage;
pub mod ui;

pub use error::{AppError, Result};
