mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "alchemist",
    version,
    about = "Datacube batch transform orchestrator"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the transform over every dataset matching the search expressions
    RunMany {
        /// Path to the job settings YAML file
        config_file: PathBuf,
        /// Search expressions, e.g. `product=ls8_level1_scene` or `time in [2020-01, 2020-06]`
        expressions: Vec<String>,
        /// Name of the datacube environment to connect to
        #[arg(short = 'E', long)]
        environment: Option<String>,
        /// For testing, cap the number of tasks generated
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Run the transform on a single dataset, given its id or location
    RunOne {
        /// Path to the job settings YAML file
        config_file: PathBuf,
        /// Dataset UUID, URI, or local path
        input_dataset: String,
        /// Name of the datacube environment to connect to
        #[arg(short = 'E', long)]
        environment: Option<String>,
    },
    /// Generate tasks and push them to the message queue
    AddToQueue {
        /// Path to the job settings YAML file
        config_file: PathBuf,
        /// Search expressions narrowing the datasets to queue
        expressions: Vec<String>,
        /// Queue name (overrides `queue.name` from the settings file)
        #[arg(short = 'M', long)]
        message_queue: Option<String>,
        /// Name of the datacube environment to connect to
        #[arg(short = 'E', long)]
        environment: Option<String>,
        /// For testing, cap the number of tasks pushed
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Pull one task from the queue, execute it, and upload the results
    PullFromQueue {
        /// Path to the job settings YAML file
        config_file: PathBuf,
        /// Queue name (overrides `queue.name` from the settings file)
        #[arg(short = 'M', long)]
        message_queue: Option<String>,
        /// SQS message visibility timeout in seconds
        #[arg(short = 'S', long)]
        sqs_timeout: Option<i32>,
        /// Upload results with a public-read ACL
        #[arg(long)]
        make_public: bool,
    },
    /// Move messages from one queue to another (e.g. dead-letter redrive)
    RedriveToQueue {
        /// Queue to drain
        #[arg(short = 'F', long)]
        from_queue: String,
        /// Queue to fill
        #[arg(short = 'T', long)]
        to_queue: String,
        /// Stop after moving this many messages
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Validate settings and probe index, transform, and queue connectivity
    Check {
        /// Path to the job settings YAML file
        config_file: PathBuf,
        /// Name of the datacube environment to connect to
        #[arg(short = 'E', long)]
        environment: Option<String>,
    },
    /// List registered transforms
    Transforms,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::RunMany {
            config_file,
            expressions,
            environment,
            limit,
        } => commands::run_many::execute(&config_file, &expressions, environment.as_deref(), limit)
            .await,
        Commands::RunOne {
            config_file,
            input_dataset,
            environment,
        } => commands::run_one::execute(&config_file, &input_dataset, environment.as_deref()).await,
        Commands::AddToQueue {
            config_file,
            expressions,
            message_queue,
            environment,
            limit,
        } => {
            commands::add_to_queue::execute(
                &config_file,
                &expressions,
                message_queue.as_deref(),
                environment.as_deref(),
                limit,
            )
            .await
        }
        Commands::PullFromQueue {
            config_file,
            message_queue,
            sqs_timeout,
            make_public,
        } => {
            commands::pull_from_queue::execute(
                &config_file,
                message_queue.as_deref(),
                sqs_timeout,
                make_public,
            )
            .await
        }
        Commands::RedriveToQueue {
            from_queue,
            to_queue,
            limit,
        } => commands::redrive::execute(&from_queue, &to_queue, limit).await,
        Commands::Check {
            config_file,
            environment,
        } => commands::check::execute(&config_file, environment.as_deref()).await,
        Commands::Transforms => commands::transforms::execute(),
    }
}
