use anyhow::Context;
use clap::Parser;
use crm_assist::auth::{
    AuthHost, CrmOAuthAcquirer, InteractiveAuthHost, KeyStatus, LlmKeyAcquirer,
};
use crm_assist::cli::{Cli, Commands};
use crm_assist::config::{Config, EnvironmentMode};
use crm_assist::credentials::CredentialStore;
use crm_assist::crm::CrmClient;
use crm_assist::environment::HostEnvironment;
use crm_assist::llm::LlmHandle;
use crm_assist::orchestrator::QueryOrchestrator;
use crm_assist::storage::Storage;
use crm_assist::{ui, AppError};
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn init_tracing(debug: bool) {
    let default_level = if debug { "crm_assist=debug" } else { "crm_assist=warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = Config::load().await.context("loading configuration")?;
    if cli.headless {
        config.environment = EnvironmentMode::Headless;
    }
    config.debug |= cli.debug;
    init_tracing(config.debug);

    let environment = HostEnvironment::detect(config.environment);
    let storage_dir = config.storage_dir()?;
    let storage = Storage::for_environment(environment, &storage_dir);
    debug!(%environment, backend = storage.backend_name(), "Starting");
    let store = CredentialStore::new(storage);

    match run(cli.command, config, environment, store).await {
        Ok(()) => Ok(()),
        Err(e) => {
            ui::display_error(&e);
            std::process::exit(1);
        }
    }
}

async fn run(
    command: Commands,
    mut config: Config,
    environment: HostEnvironment,
    store: CredentialStore,
) -> Result<(), AppError> {
    match command {
        Commands::ConnectCrm => {
            let host = AuthHost::for_environment(environment, || {
                Arc::new(ui::TerminalAuthHost) as Arc<dyn InteractiveAuthHost>
            });
            let acquirer = CrmOAuthAcquirer::new(config.crm.clone(), store, host);
            let credentials = acquirer.connect().await?;
            ui::display_success(&format!("Connected to CRM at {}", credentials.instance_url));
        }

        Commands::ConnectLlm => {
            let acquirer = LlmKeyAcquirer::new(store, environment);
            match acquirer.acquire(&ui::TerminalKeyPrompt).await? {
                KeyStatus::AlreadyStored => ui::display_success("LLM API key already stored"),
                KeyStatus::PlaceholderStored => {
                    ui::display_success("Stored a placeholder LLM API key (headless mode)");
                }
                KeyStatus::Stored => ui::display_success("LLM API key stored"),
            }
        }

        Commands::Status => {
            let crm = store.crm_credentials().await?.is_some();
            let llm = store.llm_key().await?.is_some();
            println!("Environment: {environment}");
            ui::display_status("CRM", crm);
            ui::display_status("LLM", llm);
            if store.is_fully_authenticated().await? {
                ui::display_success("Ready");
            }
        }

        Commands::Ask { message } => {
            let llm = Arc::new(LlmHandle::new(config.llm.clone()));
            let crm = CrmClient::new(config.crm.api_version.clone())?;
            let orchestrator = QueryOrchestrator::new(store, llm, crm);

            let spinner = ui::create_spinner("Thinking...");
            let result = orchestrator.process_user_input(&message).await;
            spinner.finish_and_clear();

            ui::display_response(&result?);
        }

        Commands::Logout => {
            store.clear().await?;
            ui::display_success("Stored credentials removed");
        }

        Commands::Config {
            show,
            client_id,
            redirect_uri,
            model,
            base_url,
        } => {
            let changed = client_id.is_some()
                || redirect_uri.is_some()
                || model.is_some()
                || base_url.is_some();

            if let Some(client_id) = client_id {
                config.crm.client_id = client_id;
            }
            if let Some(redirect_uri) = redirect_uri {
                config.crm.redirect_uri = redirect_uri;
            }
            if let Some(model) = model {
                config.llm.model = model;
            }
            if let Some(base_url) = base_url {
                config.llm.base_url = base_url;
            }

            if changed {
                config.save().await?;
                ui::display_success(&format!(
                    "Configuration saved to {}",
                    Config::config_path()?.display()
                ));
            }

            if show || !changed {
                let content = toml::to_string_pretty(&config)
                    .map_err(|e| AppError::ConfigError(e.to_string()))?;
                println!("{content}");
            }
        }
    }

    Ok(())
}
