use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::bail;
use anyhow::Result;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Select;
use tokio_util::sync::CancellationToken;

use super::settings;
use super::terminal;
use super::terminal::TerminalConsole;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::base_url;
use crate::domain::models::BackendHandle;
use crate::domain::models::BackendKind;
use crate::domain::models::ChatSession;
use crate::domain::models::LifecycleError;
use crate::domain::models::ProcessHostBox;
use crate::domain::services::chat_driver;
use crate::domain::services::Discovery;
use crate::domain::services::Supervisor;
use crate::infrastructure::backends::HttpTransport;
use crate::infrastructure::processes::LocalProcessHost;

fn select_backend(installed: &[BackendKind], models: &BTreeMap<BackendKind, Vec<String>>) -> Result<Option<BackendKind>> {
    let configured = Config::get(ConfigKey::Backend);
    if !configured.is_empty() {
        let kind = match BackendKind::parse(&configured) {
            Some(kind) => kind,
            None => bail!(format!("Unknown backend '{configured}'")),
        };
        if !installed.contains(&kind) {
            return Err(LifecycleError::NotInstalled { backend: kind }.into());
        }
        return Ok(Some(kind));
    }

    let options = installed
        .iter()
        .map(|kind| {
            let count = models.get(kind).map(|e| return e.len()).unwrap_or_default();
            return format!("{kind} ({count} models)");
        })
        .collect::<Vec<String>>();

    let idx = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Which backend would you like to use?")
        .default(0)
        .items(&options)
        .interact_opt()?;

    return Ok(idx.map(|idx| return installed[idx]));
}

fn select_model(kind: BackendKind, models: &[String]) -> Result<Option<String>> {
    let configured = Config::get(ConfigKey::Model);
    if !configured.is_empty() {
        return Ok(Some(configured));
    }

    let idx = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Which {kind} model would you like to chat with?"))
        .default(0)
        .items(models)
        .interact_opt()?;

    return Ok(idx.map(|idx| return models[idx].to_string()));
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("Received Ctrl-C");
            token.cancel();
        }
    });

    return cancel;
}

/// Runs one session end to end: pick a backend and model, bring the backend
/// up, chat, and stop the backend again if this session started it.
pub async fn run() -> Result<()> {
    let settings = settings::supervisor_settings()?;
    let host: ProcessHostBox = Arc::new(LocalProcessHost::default());
    let discovery = Discovery::new(settings.models_dir.clone());

    let installed = discovery.installed_backends(host.as_ref()).await;
    if installed.is_empty() {
        terminal::print_warning("No supported backend is installed.");
        terminal::print_notice("Install ollama or run `pip install mlx-lm`, then try again.");
        return Ok(());
    }

    let models = discovery.list_models().await?;
    let kind = match select_backend(&installed, &models)? {
        Some(kind) => kind,
        None => return Ok(()),
    };

    let available = models.get(&kind).cloned().unwrap_or_default();
    if available.is_empty() && Config::get(ConfigKey::Model).is_empty() {
        terminal::print_warning(&format!("No {kind} models found."));
        terminal::print_notice(&format!(
            "Place model directories under {}",
            discovery.root().join(kind.to_string()).display()
        ));
        return Ok(());
    }
    let model = match select_model(kind, &available)? {
        Some(model) => model,
        None => return Ok(()),
    };

    let (params, warnings) = settings::chat_params_from_config();
    for warning in warnings {
        terminal::print_warning(&warning);
    }

    let cancel = cancel_on_ctrl_c();
    let mut supervisor = Supervisor::new(BackendHandle::new(kind, &model), host, settings);

    if supervisor.is_running().is_none() {
        terminal::print_notice(&format!("Starting {kind} with {model}..."));
        supervisor.start(&cancel).await?;
    }
    let port = supervisor.get_port(&cancel).await?;

    println!();
    println!(
        "{}",
        terminal::info_box(&format!(
            "Chat Session: {model}\n{kind} on port {port}\n{}",
            terminal::format_chat_params(&params)
        ))
    );
    terminal::print_notice("Type '/exit' to quit the chat, '/help' for commands.\n");

    let transport = HttpTransport::new(kind, &base_url(port));
    let mut session = ChatSession::new(&model, params);
    let mut console = TerminalConsole::default();

    let res = tokio::select! {
        res = chat_driver::run(&mut session, &transport, &mut console) => res,
        _ = cancel.cancelled() => Ok(()),
    };

    if supervisor.handle().owned_pid.is_some() {
        terminal::print_notice(&format!("Stopping {kind}..."));
    }
    drop(supervisor);
    res?;

    tracing::info!(turns = session.transcript.len(), "Chat session ended");
    terminal::print_notice("Exiting chat. Goodbye!");

    return Ok(());
}
