//! Command-line client for the messages endpoint.
//!
//! # Responsibility
//! - Build one `MessageClient` from flags, environment or a config file.
//! - Expose the connection operations for quick manual checks.

use clap::{Parser, Subcommand};
use log::error;
use msgboard_core::config::DEFAULT_REQUEST_TIMEOUT_MS;
use msgboard_core::{
    core_version, default_log_level, init_logging, ConfigError, ListQuery, Message,
    MessageClient, ServiceConfig,
};
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "msgboard", version, about = "Message board REST client")]
struct Cli {
    /// Service root; the client talks to `{url}/api/messages`.
    #[arg(long, env = "MSGBOARD_SERVICE_BASE_URL", global = true)]
    service_base_url: Option<String>,

    #[arg(
        long,
        env = "MSGBOARD_HTTP_TIMEOUT_MS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_MS,
        global = true
    )]
    timeout_ms: u64,

    /// JSON config file; replaces the URL and timeout flags.
    #[arg(long, env = "MSGBOARD_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Enables file logging into this directory.
    #[arg(long, env = "MSGBOARD_LOG_DIR", global = true)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Prints the core library version.
    Version,
    /// Prints the resolved messages endpoint.
    Url,
    /// Lists messages matching every `key=value` filter.
    List {
        #[arg(value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    /// Fetches one message.
    Get { id: String },
    /// Creates a message.
    Post { name: String, body: String },
    /// Deletes one message.
    Delete { id: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Some(log_dir) = cli.log_dir.as_deref() {
        if let Err(err) = init_logging(default_log_level(), log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    match run(&cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            error!("event=cli_command module=cli status=error error={message}");
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<String, String> {
    match &cli.command {
        Command::Version => Ok(format!("msgboard_core version={}", core_version())),
        Command::Url => Ok(service_config(cli)
            .map_err(|err| err.to_string())?
            .messages_url()),
        Command::List { params } => {
            let list = connect(cli)?
                .get_list(&to_query(params))
                .map_err(|err| err.to_string())?;
            to_json(&list)
        }
        Command::Get { id } => {
            let message = connect(cli)?
                .get(&parse_id(id))
                .map_err(|err| err.to_string())?;
            to_json(&message)
        }
        Command::Post { name, body } => {
            let mut message = Message::with_fields(name.as_str(), body.as_str());
            connect(cli)?
                .create(&mut message)
                .map_err(|err| err.to_string())?;
            to_json(&message)
        }
        Command::Delete { id } => {
            let mut message = Message::new();
            message.id = Some(parse_id(id));
            connect(cli)?
                .destroy(&message)
                .map_err(|err| err.to_string())?;
            Ok(format!("deleted {id}"))
        }
    }
}

fn connect(cli: &Cli) -> Result<MessageClient, String> {
    let config = service_config(cli).map_err(|err| err.to_string())?;
    MessageClient::connect(&config).map_err(|err| err.to_string())
}

fn service_config(cli: &Cli) -> Result<ServiceConfig, ConfigError> {
    if let Some(path) = &cli.config {
        return ServiceConfig::from_file(path);
    }
    let base = cli
        .service_base_url
        .as_deref()
        .map(str::trim)
        .filter(|base| !base.is_empty())
        .ok_or(ConfigError::MissingVar("MSGBOARD_SERVICE_BASE_URL"))?;
    let mut config = ServiceConfig::new(base);
    config.request_timeout_ms = cli.timeout_ms;
    config.validate()?;
    Ok(config)
}

/// Numeric ids are sent as numbers, everything else as strings.
fn parse_id(raw: &str) -> Value {
    raw.parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))
}

fn to_query(params: &[(String, String)]) -> ListQuery {
    params
        .iter()
        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
        .collect()
}

fn to_json(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::{parse_id, parse_param, run, service_config, to_query, Cli, Command};
    use clap::{CommandFactory, Parser};
    use serde_json::json;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_id_prefers_numbers() {
        assert_eq!(parse_id("42"), json!(42));
        assert_eq!(parse_id("abc-1"), json!("abc-1"));
    }

    #[test]
    fn list_params_become_a_query() {
        let cli = Cli::try_parse_from(["msgboard", "list", "room=lobby", "name=ann"]).unwrap();
        let Command::List { params } = cli.command else {
            panic!("expected list, got {:?}", cli.command);
        };
        let query = to_query(&params);
        assert_eq!(query.get("room"), Some(&json!("lobby")));
        assert_eq!(query.get("name"), Some(&json!("ann")));

        assert!(parse_param("oops").is_err());
        assert!(Cli::try_parse_from(["msgboard", "list", "oops"]).is_err());
    }

    #[test]
    fn subcommands_take_their_positionals() {
        assert!(Cli::try_parse_from(["msgboard"]).is_err());
        assert!(Cli::try_parse_from(["msgboard", "get"]).is_err());
        assert!(Cli::try_parse_from(["msgboard", "post", "ann"]).is_err());

        let cli = Cli::try_parse_from(["msgboard", "post", "ann", "hello"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Post { ref name, ref body } if name == "ann" && body == "hello"
        ));
    }

    #[test]
    fn url_comes_from_the_base_url_flag() {
        let cli = Cli::try_parse_from([
            "msgboard",
            "url",
            "--service-base-url",
            "http://localhost:8080/",
            "--timeout-ms",
            "500",
        ])
        .unwrap();

        assert_eq!(service_config(&cli).unwrap().request_timeout_ms, 500);
        assert_eq!(run(&cli).unwrap(), "http://localhost:8080/api/messages");
    }

    #[test]
    fn version_needs_no_service() {
        let cli = Cli::try_parse_from(["msgboard", "version"]).unwrap();
        assert!(run(&cli).unwrap().contains("version="));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let cli =
            Cli::try_parse_from(["msgboard", "url", "--service-base-url", "ftp://x"]).unwrap();
        assert!(run(&cli).is_err());
    }
}
