use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ecspress::aws::client::{load_sdk_config, Cloud};
use ecspress::aws::ecr::AwsEcr;
use ecspress::aws::error::format_aws_error;
use ecspress::config::{Config, Overrides};
use ecspress::docker::{self, PushRequest};
use ecspress::reconcile::{self, task, Plan};
use ecspress::retry::RetryPolicy;
use ecspress::settings::Settings;
use ecspress::VERSION;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Deployment helper for AWS ECS
#[derive(Parser, Debug)]
#[command(name = "ecspress", version, about, long_about = None)]
struct Args {
    /// Log level (RUST_LOG overrides it)
    #[arg(long, value_enum, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// AWS region to use
    #[arg(long, global = true)]
    region: Option<String>,

    /// AWS shared-config profile to use
    #[arg(long, global = true)]
    profile: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register task definitions and reconcile services, scaling, metrics and alarms
    Deploy {
        /// Image URL set on every container definition
        #[arg(long)]
        image_url: Option<String>,

        /// Services to deploy. All services are deployed when omitted
        #[arg(long, num_args = 1..)]
        service_names: Vec<String>,

        /// Directory of service and task definitions
        #[arg(long)]
        path: Option<PathBuf>,

        /// Container environment as a JSON list of {"name": ..., "value": ...}
        #[arg(long)]
        environment: Option<String>,

        /// Delete log groups, scaling policies and alarms that are no longer defined
        #[arg(long)]
        clean_stale: bool,
    },

    /// Clean stale entities on AWS
    Clean {
        /// Deregister task definitions no service uses
        #[arg(long)]
        stale_tasks: bool,

        /// Delete log streams of failed container instances
        #[arg(long)]
        stale_log_streams: bool,

        /// Minimum age in days of a log stream to delete
        #[arg(long, required_if_eq("stale_log_streams", "true"))]
        days_ago: Option<u32>,

        /// Directory of service and task definitions
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Register one task definition
    Register {
        /// Family of the task definition to register
        #[arg(long)]
        task_definition: String,

        /// Directory of service and task definitions
        #[arg(long)]
        path: Option<PathBuf>,

        /// Image URL set on every container definition
        #[arg(long)]
        image_url: Option<String>,

        /// Container entrypoint override
        #[arg(long, num_args = 1..)]
        entrypoint: Vec<String>,

        /// Container command override
        #[arg(long, num_args = 1..)]
        command: Vec<String>,
    },

    /// Build (optionally) and push a docker image to ECR
    Push {
        /// Remote image reference, e.g. <account>.dkr.ecr.<region>.amazonaws.com/app:1.2
        #[arg(long)]
        image_url: String,

        /// Local image tag to push
        #[arg(long)]
        local_tag: String,

        /// Build context. The image is not built when omitted
        #[arg(long)]
        build_path: Option<PathBuf>,

        #[arg(long, requires = "build_path")]
        dockerfile: Option<PathBuf>,

        /// KEY=VALUE build argument, repeatable
        #[arg(long = "build-arg", requires = "build_path")]
        build_args: Vec<String>,
    },

    /// Show the stored defaults, changing the given ones first
    Settings {
        /// Default AWS region
        #[arg(long)]
        set_region: Option<String>,

        /// Default AWS shared-config profile
        #[arg(long)]
        set_profile: Option<String>,

        /// Default directory of service and task definitions
        #[arg(long)]
        set_path: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(
    level: LogLevel,
    log_file: Option<&Path>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from(tracing_level).into())
        .from_env_lossy();

    let (writer, guard) = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(log_file.is_none())
        .with_target(log_file.is_some())
        .with_file(log_file.is_some())
        .with_line_number(log_file.is_some())
        .init();

    tracing::debug!("ecspress {} started with log level: {:?}", VERSION, level);
    if let Some(path) = log_file {
        tracing::debug!("Log file: {:?}", path);
    }

    Ok(Some(guard))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Errors must still reach the terminal when logs do not
    let echo_errors = args.log_file.is_some() || matches!(args.log_level, LogLevel::Off);

    let _log_guard = match setup_logging(args.log_level, args.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Error: failed to set up logging: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let message = format_aws_error(&err);
            tracing::error!("{}", message);
            if echo_errors {
                eprintln!("Error: {message}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let settings = Settings::load();
    let region = settings.effective_region(args.region.as_deref());
    let profile = settings.effective_profile(args.profile.as_deref());

    match args.command {
        Command::Deploy {
            image_url,
            service_names,
            path,
            environment,
            clean_stale,
        } => {
            let path = settings.effective_config_path(path.as_deref());
            let overrides =
                Overrides::image(image_url.clone()).with_environment_json(environment.as_deref())?;
            let config = Config::load(&path, &overrides)?;
            let plan = Plan::for_services(&config, &service_names, clean_stale)?;

            if let Some(image) = &image_url {
                tracing::info!("Deploying image '{}'", image);
            }

            let cloud = Cloud::connect(region.as_deref(), profile.as_deref()).await;
            reconcile::deploy(&cloud, &plan).await
        }

        Command::Clean {
            stale_tasks,
            stale_log_streams,
            days_ago,
            path,
        } => {
            if !stale_tasks && !stale_log_streams {
                tracing::warn!("Nothing to clean. Pass --stale-tasks and/or --stale-log-streams");
                return Ok(());
            }

            // Load definitions before touching AWS so a bad config fails fast
            let config = if stale_log_streams {
                let path = settings.effective_config_path(path.as_deref());
                Some(Config::load(&path, &Overrides::default())?)
            } else {
                None
            };

            let cloud = Cloud::connect(region.as_deref(), profile.as_deref()).await;

            if stale_tasks {
                tracing::info!("Cleaning stale tasks...");
                task::clean_stale(&cloud, &RetryPolicy::deregistration()).await?;
            }

            if let Some(config) = &config {
                let days_ago = days_ago.context("--days-ago is required with --stale-log-streams")?;
                tracing::info!(
                    "Cleaning stale log streams from starting {} day(s) ago...",
                    days_ago
                );
                reconcile::log::clean_stale_streams(&cloud, config, days_ago, chrono::Utc::now())
                    .await?;
            }
            Ok(())
        }

        Command::Register {
            task_definition,
            path,
            image_url,
            entrypoint,
            command,
        } => {
            let path = settings.effective_config_path(path.as_deref());
            let overrides = Overrides {
                image: image_url,
                entry_point: entrypoint,
                command,
                environment: None,
            };
            let config = Config::load(&path, &overrides)?;
            let plan = Plan::for_task(&config, &task_definition)?;

            tracing::info!(
                "Registering task definition '{}' from path: {}",
                task_definition,
                path.display()
            );
            let cloud = Cloud::connect(region.as_deref(), profile.as_deref()).await;
            task::register(&cloud, &plan).await?;
            Ok(())
        }

        Command::Push {
            image_url,
            local_tag,
            build_path,
            dockerfile,
            build_args,
        } => {
            let sdk_config = load_sdk_config(region.as_deref(), profile.as_deref()).await;
            let registry = AwsEcr::new(&sdk_config);
            let request = PushRequest {
                image_url,
                local_tag,
                build_path,
                dockerfile,
                build_args,
            };
            docker::push(&registry, &request).await
        }

        Command::Settings {
            set_region,
            set_profile,
            set_path,
        } => {
            let mut settings = settings;
            if settings.update(set_region, set_profile, set_path) {
                settings.save()?;
            }
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_deploy() {
        let args = Args::parse_from([
            "ecspress",
            "--log-level",
            "debug",
            "deploy",
            "--image-url",
            "repo/web:42",
            "--service-names",
            "web",
            "worker",
            "--path",
            "ecs",
            "--clean-stale",
        ]);

        assert!(matches!(args.log_level, LogLevel::Debug));
        match args.command {
            Command::Deploy {
                image_url,
                service_names,
                clean_stale,
                ..
            } => {
                assert_eq!(image_url.as_deref(), Some("repo/web:42"));
                assert_eq!(service_names, vec!["web", "worker"]);
                assert!(clean_stale);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_days_ago_required_for_log_streams() {
        let result = Args::try_parse_from(["ecspress", "clean", "--stale-log-streams"]);
        assert!(result.is_err());

        let args = Args::try_parse_from([
            "ecspress",
            "clean",
            "--stale-log-streams",
            "--days-ago",
            "3",
        ])
        .unwrap();
        assert!(matches!(args.command, Command::Clean { days_ago: Some(3), .. }));
    }

    #[test]
    fn test_parse_settings() {
        let args = Args::try_parse_from([
            "ecspress",
            "settings",
            "--set-region",
            "eu-west-1",
            "--set-path",
            "deploy/ecs",
        ])
        .unwrap();

        match args.command {
            Command::Settings {
                set_region,
                set_profile,
                set_path,
            } => {
                assert_eq!(set_region.as_deref(), Some("eu-west-1"));
                assert!(set_profile.is_none());
                assert_eq!(set_path, Some(PathBuf::from("deploy/ecs")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_register_overrides() {
        let args = Args::try_parse_from([
            "ecspress",
            "register",
            "--task-definition",
            "web",
            "--entrypoint",
            "/docker-entrypoint.sh",
            "web",
            "--command",
            "migrate",
        ])
        .unwrap();

        match args.command {
            Command::Register {
                entrypoint,
                command,
                ..
            } => {
                assert_eq!(entrypoint, vec!["/docker-entrypoint.sh", "web"]);
                assert_eq!(command, vec!["migrate"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
