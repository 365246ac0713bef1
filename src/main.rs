use clap::Parser;
use collection_runner::cli::tracing_init::init_tracing;
use collection_runner::cli::{Cli, Commands, ConfigCommands};
use collection_runner::collection::{walk_requests, CollectionLoader, JsonFileLoader};
use collection_runner::config::ConfigManager;
use collection_runner::constants::DEFAULT_ENVIRONMENT;
use collection_runner::context::{ExecutionContext, Scope};
use collection_runner::error::Error;
use collection_runner::executor::{Executor, ExecutorOptions};
use collection_runner::fs::OsFileSystem;
use std::path::PathBuf;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let json_errors = cli.json_errors;

    if let Err(e) = run_command(cli).await {
        print_error(&e, json_errors);
        std::process::exit(1);
    }
}

async fn run_command(cli: Cli) -> Result<(), Error> {
    match cli.command {
        Commands::Run {
            collection_file,
            environment,
            parallel,
            max_parallelism,
            stop_on_error,
            strict_variables,
            strict_hooks,
            timeout_ms,
            folder,
            json,
        } => {
            run_collection(
                &collection_file,
                environment.as_deref(),
                parallel,
                max_parallelism,
                stop_on_error,
                strict_variables,
                strict_hooks,
                timeout_ms,
                folder.as_deref(),
                json,
            )
            .await
        }
        Commands::Validate { collection_file } => validate_collection(&collection_file),
        Commands::Config { command } => run_config_command(command),
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_collection(
    collection_file: &str,
    environment: Option<&str>,
    parallel: bool,
    max_parallelism: usize,
    stop_on_error: bool,
    strict_variables: bool,
    strict_hooks: bool,
    timeout_ms: u64,
    folder: Option<&str>,
    json_output: bool,
) -> Result<(), Error> {
    let loader = JsonFileLoader::new(OsFileSystem);
    let collection = loader.load(std::path::Path::new(collection_file))?;

    let environment = environment.unwrap_or(DEFAULT_ENVIRONMENT);
    let manager = ConfigManager::new()?;
    let collection_name = collection_name_for(collection_file);
    let base_url = manager.get_url(&collection_name, environment)?;

    let mut ctx = ExecutionContext::new();
    ctx.seed(
        Scope::Collection,
        collection
            .variables
            .iter()
            .map(|v| (v.key.clone(), v.value.clone())),
    );
    if let Some(url) = base_url {
        ctx.set(Scope::Environment, "baseUrl", url);
    }

    let options = ExecutorOptions {
        timeout_ms,
        parallel,
        max_parallelism,
        stop_on_error,
        strict_variables,
        strict_hooks,
        ..ExecutorOptions::default()
    };
    let secrets = manager.resolve_secrets(environment)?;
    let secret_ctx = collection_runner::logging::SecretContext::from_values(secrets);
    let executor = Executor::new(options)?.with_secret_context(secret_ctx);

    let result = if let Some(folder_name) = folder {
        executor.execute_folder(&collection, folder_name, &mut ctx).await?
    } else {
        executor.execute_collection(&collection, &mut ctx).await?
    };

    if json_output {
        let rendered = serde_json::to_string_pretty(&result)
            .map_err(|e| Error::config(format!("failed to serialize result: {e}")))?;
        println!("{rendered}");
    } else {
        println!(
            "{}/{} requests succeeded in {}ms{}",
            result.successful,
            result.total_requests,
            result.total_time_ms,
            if result.stopped_early == Some(true) {
                " (stopped early)"
            } else {
                ""
            }
        );
        for r in &result.results {
            let status = if r.success { "ok" } else { "FAILED" };
            let detail = r.response.as_ref().map_or_else(
                || r.error.clone().unwrap_or_default(),
                |resp| resp.status_code.to_string(),
            );
            println!(
                "  [{status}] {} ({}ms) {}",
                r.request_ref.name, r.duration_ms, detail
            );
        }
    }

    if result.failed > 0 {
        return Err(Error::config(format!(
            "{} of {} requests failed",
            result.failed, result.total_requests
        )));
    }
    Ok(())
}

fn validate_collection(collection_file: &str) -> Result<(), Error> {
    let loader = JsonFileLoader::new(OsFileSystem);
    let collection = loader.load(std::path::Path::new(collection_file))?;
    let request_count = walk_requests(&collection).len();
    println!(
        "'{}' is valid: {} request(s)",
        collection.info.name, request_count
    );
    Ok(())
}

fn run_config_command(command: ConfigCommands) -> Result<(), Error> {
    let manager = ConfigManager::new()?;
    match command {
        ConfigCommands::SetUrl {
            collection_name,
            environment,
            url,
        } => {
            manager.set_url(&collection_name, &environment, &url)?;
            println!(
                "Set base URL for '{collection_name}' in environment '{environment}': {url}"
            );
        }
        ConfigCommands::GetUrl {
            collection_name,
            environment,
        } => match manager.get_url(&collection_name, &environment)? {
            Some(url) => println!("{url}"),
            None => println!(
                "(no URL configured for '{collection_name}' in environment '{environment}')"
            ),
        },
    }
    Ok(())
}

fn collection_name_for(path: &str) -> String {
    PathBuf::from(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

fn print_error(error: &Error, json_format: bool) {
    if json_format {
        if let Ok(rendered) = serde_json::to_string_pretty(&error.to_json()) {
            eprintln!("{rendered}");
            return;
        }
    }
    match error {
        Error::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound => {
                eprintln!(
                    "File not found\n{io_err}\n\nHint: check that the collection path is correct."
                );
            }
            std::io::ErrorKind::PermissionDenied => {
                eprintln!("Permission denied\n{io_err}\n\nHint: check file permissions.");
            }
            _ => eprintln!("File system error\n{io_err}"),
        },
        Error::Network(req_err) => eprintln!("Network error\n{req_err}"),
        Error::Yaml(e) => eprintln!("YAML parsing error\n{e}"),
        Error::Json(e) => {
            eprintln!("JSON parsing error\n{e}\n\nHint: check that the collection file is valid JSON.");
        }
        Error::Toml(e) => {
            eprintln!("TOML parsing error\n{e}\n\nHint: check that config.toml is valid TOML.");
        }
        Error::Anyhow(e) => eprintln!("Unexpected error\n{e}"),
        Error::Internal {
            kind,
            message,
            context,
        } => {
            eprintln!("{kind}\n{message}");
            if let Some(suggestion) = context.as_ref().and_then(|c| c.suggestion.as_ref()) {
                eprintln!("\nHint: {suggestion}");
            }
        }
    }
}
