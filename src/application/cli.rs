#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;

use std::io;
use std::path;
use std::sync::Arc;

use anyhow::bail;
use anyhow::Result;
use clap::builder::PossibleValuesParser;
use clap::value_parser;
use clap::Arg;
use clap::ArgAction;
use clap::Command;
use clap_complete::generate;
use clap_complete::Generator;
use clap_complete::Shell;
use owo_colors::OwoColorize;
use strum::IntoEnumIterator;
use strum::VariantNames;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use super::connect;
use super::settings;
use super::terminal;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::help_text;
use crate::domain::models::BackendHandle;
use crate::domain::models::BackendKind;
use crate::domain::models::ProcessHostBox;
use crate::domain::services::Discovery;
use crate::domain::services::Supervisor;
use crate::infrastructure::processes::LocalProcessHost;

fn print_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

/// Lines describing each backend kind and its defaults.
pub fn format_servers() -> String {
    return BackendKind::iter()
        .map(|kind| {
            let timing = kind.probe_timing();
            return format!(
                "- {kind} (default port {}, health check every {}ms for up to {}s)",
                kind.default_port(),
                timing.interval.as_millis(),
                timing.timeout.as_secs()
            );
        })
        .collect::<Vec<String>>()
        .join("\n");
}

async fn print_list() -> Result<()> {
    let settings = settings::supervisor_settings()?;
    let host: ProcessHostBox = Arc::new(LocalProcessHost::default());
    let discovery = Discovery::new(settings.models_dir);

    let installed = discovery.installed_backends(host.as_ref()).await;
    if installed.is_empty() {
        println!("No supported backend is installed. Install ollama or run `pip install mlx-lm`.");
        return Ok(());
    }

    let models = discovery.list_models().await?;
    for kind in installed {
        terminal::print_header(&kind.to_string());
        let names = models.get(&kind).cloned().unwrap_or_default();
        if names.is_empty() {
            println!(
                "  No models found in {}",
                discovery.root().join(kind.to_string()).display()
            );
            continue;
        }
        for name in names {
            println!("  - {name}");
        }
    }

    return Ok(());
}

async fn print_status() -> Result<()> {
    let settings = settings::supervisor_settings()?.single_check();
    let host: ProcessHostBox = Arc::new(LocalProcessHost::default());
    let cancel = CancellationToken::new();

    for kind in BackendKind::iter() {
        let mut supervisor = Supervisor::new(BackendHandle::new(kind, ""), host.clone(), settings.clone());
        let pid = match supervisor.is_running() {
            Some(pid) => pid,
            None => {
                println!("- {kind}: {}", "stopped".dimmed());
                continue;
            }
        };

        match supervisor.get_port(&cancel).await {
            Ok(port) => println!("- {kind}: {} (pid {pid}, port {port})", "running".green()),
            Err(err) => println!("- {kind}: {} (pid {pid}, {err})", "unreachable".yellow()),
        }
    }

    return Ok(());
}

fn stop_backend() -> Result<()> {
    let configured = Config::get(ConfigKey::Backend);
    let kind = match BackendKind::parse(&configured) {
        Some(kind) => kind,
        None => bail!("Pass the backend to stop with --backend"),
    };

    let host: ProcessHostBox = Arc::new(LocalProcessHost::default());
    let mut supervisor = Supervisor::new(BackendHandle::new(kind, ""), host, settings::supervisor_settings()?);
    supervisor.stop()?;
    terminal::print_success(&format!("Stopped {kind}"));

    return Ok(());
}

async fn create_config_file() -> Result<()> {
    let config_file_path_str = Config::get(ConfigKey::ConfigFile);
    let config_file_path = path::PathBuf::from(&config_file_path_str);
    if config_file_path.exists() {
        bail!(format!(
            "Config file already exists at {config_file_path_str}"
        ));
    }

    if let Some(parent) = config_file_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut file = fs::File::create(&config_file_path).await?;
    file.write_all(Config::serialize_default(build()).as_bytes())
        .await?;

    println!("Created default config file at {config_file_path_str}");
    return Ok(());
}

fn subcommand_completions() -> Command {
    return Command::new("completions")
        .about("Generates shell completions.")
        .arg(
            clap::Arg::new("shell")
                .short('s')
                .long("shell")
                .help("Which shell to generate completions for.")
                .action(ArgAction::Set)
                .value_parser(value_parser!(Shell))
                .required(true),
        );
}

fn subcommand_config() -> Command {
    return Command::new("config")
        .about("Configuration file options.")
        .subcommand(
            Command::new("create").about("Saves the default config file to the configuration file path. This command will fail if the file exists already.")
        )
        .subcommand(
            Command::new("default").about("Outputs the default configuration file to stdout.")
        )
        .subcommand(
            Command::new("path").about("Returns the path of the configuration file.")
        );
}

fn arg_config(key: ConfigKey, env: &'static str, help: String) -> Arg {
    return Arg::new(key.to_string())
        .long(key.to_string())
        .env(env)
        .num_args(1)
        .help(help)
        .global(true);
}

fn with_default(help: &str, key: ConfigKey) -> String {
    let default = Config::default(key);
    if default.is_empty() {
        return help.to_string();
    }

    return format!("{help} [default: {default}]");
}

pub fn build() -> Command {
    let commands_text = help_text()
        .split('\n')
        .map(|line| {
            if line.starts_with('-') {
                return format!("  {line}");
            }
            if line.starts_with("COMMANDS:") {
                return format!("CHAT {line}").underline().bold().to_string();
            }
            return line.to_string();
        })
        .collect::<Vec<String>>()
        .join("\n");

    let about = format!(
        "{}\n\nVersion: {}",
        env!("CARGO_PKG_DESCRIPTION"),
        env!("CARGO_PKG_VERSION"),
    );

    return Command::new("lmdeck")
        .about(about)
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .after_help(commands_text)
        .arg_required_else_help(true)
        .subcommand(Command::new("list").about("List installed backends and the models available to each."))
        .subcommand(Command::new("servers").about("List the supported backend servers."))
        .subcommand(
            Command::new("connect")
                .visible_alias("chat")
                .about("Start a backend if needed and chat with one of its models.")
        )
        .subcommand(Command::new("status").about("Show which backends are running and on which port."))
        .subcommand(Command::new("stop").about("Force-stop the running backend given with --backend."))
        .subcommand(subcommand_config())
        .subcommand(subcommand_completions())
        .arg(
            arg_config(
                ConfigKey::Backend,
                "LMDECK_BACKEND",
                "The backend to use. Prompts for one when not set.".to_string(),
            )
            .short('b')
            .value_parser(PossibleValuesParser::new(BackendKind::VARIANTS)),
        )
        .arg(
            arg_config(
                ConfigKey::Model,
                "LMDECK_MODEL",
                "The model to chat with. Prompts for one when not set.".to_string(),
            )
            .short('m'),
        )
        .arg(arg_config(
            ConfigKey::ModelsDir,
            "LMDECK_MODELS_DIR",
            with_default("Directory holding one folder of models per backend.", ConfigKey::ModelsDir),
        ))
        .arg(arg_config(
            ConfigKey::LogDir,
            "LMDECK_SERVER_LOG_DIR",
            with_default("Directory backend servers write their logs to.", ConfigKey::LogDir),
        ))
        .arg(
            arg_config(
                ConfigKey::Port,
                "LMDECK_PORT",
                "Port to start the backend on. Defaults to the backend's usual port.".to_string(),
            )
            .short('p'),
        )
        .arg(arg_config(
            ConfigKey::HealthCheckInterval,
            "LMDECK_HEALTH_CHECK_INTERVAL",
            "Milliseconds between health checks while a backend starts. Defaults per backend.".to_string(),
        ))
        .arg(arg_config(
            ConfigKey::HealthCheckTimeout,
            "LMDECK_HEALTH_CHECK_TIMEOUT",
            "Milliseconds to wait for a starting backend before giving up. Defaults per backend.".to_string(),
        ))
        .arg(arg_config(
            ConfigKey::Temperature,
            "LMDECK_TEMPERATURE",
            with_default("Sampling temperature between 0.0 and 2.0.", ConfigKey::Temperature),
        ))
        .arg(arg_config(
            ConfigKey::MaxTokens,
            "LMDECK_MAX_TOKENS",
            with_default("Maximum number of tokens per reply.", ConfigKey::MaxTokens),
        ))
        .arg(
            arg_config(
                ConfigKey::Stream,
                "LMDECK_STREAM",
                with_default("Ask the backend to stream its replies.", ConfigKey::Stream),
            )
            .value_parser(PossibleValuesParser::new(["true", "false"])),
        )
        .arg(
            arg_config(
                ConfigKey::ConfigFile,
                "LMDECK_CONFIG_FILE",
                with_default("Path to configuration file", ConfigKey::ConfigFile),
            )
            .short('c'),
        );
}

pub async fn parse() -> Result<()> {
    let matches = build().get_matches();

    match matches.subcommand() {
        Some(("completions", subcmd_matches)) => {
            if let Some(completions) = subcmd_matches.get_one::<Shell>("shell").copied() {
                let mut app = build();
                print_completions(completions, &mut app);
            }
        }
        Some(("config", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            match subcmd_matches.subcommand() {
                Some(("create", _)) => {
                    create_config_file().await?;
                }
                Some(("default", _)) => {
                    println!("{}", Config::serialize_default(build()));
                }
                Some(("path", _)) => {
                    println!("{}", Config::get(ConfigKey::ConfigFile));
                }
                _ => {
                    subcommand_config().print_long_help()?;
                }
            }
        }
        Some(("servers", _)) => {
            println!("{}", format_servers());
        }
        Some((name, subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            match name {
                "list" => print_list().await?,
                "status" => print_status().await?,
                "stop" => stop_backend()?,
                _ => connect::run().await?,
            }
        }
        None => {
            build().print_long_help()?;
        }
    }

    return Ok(());
}
