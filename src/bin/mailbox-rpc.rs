#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! Mailbox RPC worker and command-line caller

use clap::{Parser, Subcommand};
use mailbox_rpc::backend::{ImapBackend, MailBackend, SmtpSender};
use mailbox_rpc::broker::AmqpConnection;
use mailbox_rpc::jobs::{JobManager, JobRegistry};
use mailbox_rpc::{Arguments, Dispatcher, ImapConfig, Operations, RpcClient, WorkerConfig};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mailbox-rpc")]
#[command(about = "Mailbox operations over an AMQP request/reply queue")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// AMQP broker URL (default: $AMQP_URL)
    #[arg(long, global = true)]
    amqp_url: Option<String>,

    /// Request queue (default: $RPC_QUEUE)
    #[arg(long, global = true)]
    queue: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Consume requests and answer them
    Serve {
        /// Number of consumer channels (default: $RPC_WORKERS)
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Send one request and print the reply
    Call {
        /// Operation name, e.g. `get_email_list`
        operation: String,

        /// Argument as key=value; values that parse as JSON are sent as JSON
        #[arg(long = "arg", value_parser = parse_key_value)]
        args: Vec<(String, Value)>,

        /// Arguments as one JSON object, merged under the --arg values
        #[arg(long)]
        json_args: Option<String>,

        /// Seconds to wait for the reply
        #[arg(long, default_value = "30")]
        timeout: u64,
    },
}

fn parse_key_value(s: &str) -> Result<(String, Value), String> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid argument '{s}': expected key=value"))?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = WorkerConfig::from_env()?;
    if let Some(url) = &args.amqp_url {
        config.amqp_url.clone_from(url);
    }
    if let Some(queue) = &args.queue {
        config.queue.clone_from(queue);
    }

    match args.command {
        Command::Serve { workers } => {
            if let Some(workers) = workers {
                anyhow::ensure!(workers > 0, "--workers must be at least 1");
                config.workers = workers;
            }
            cmd_serve(&config).await
        }
        Command::Call {
            operation,
            args,
            json_args,
            timeout,
        } => {
            let arguments = build_arguments(args, json_args.as_deref())?;
            cmd_call(&config, &operation, arguments, Duration::from_secs(timeout)).await
        }
    }
}

fn build_arguments(pairs: Vec<(String, Value)>, json: Option<&str>) -> anyhow::Result<Arguments> {
    let mut arguments = match json {
        Some(raw) => serde_json::from_str::<Arguments>(raw)
            .map_err(|e| anyhow::anyhow!("--json-args must be a JSON object: {e}"))?,
        None => Arguments::new(),
    };
    for (key, value) in pairs {
        arguments.insert(key, value);
    }
    Ok(arguments)
}

async fn cmd_serve(config: &WorkerConfig) -> anyhow::Result<()> {
    let default_imap = match ImapConfig::from_env() {
        Ok(imap) => {
            info!(host = %imap.host, user = %imap.username, "Default IMAP account configured");
            Some(imap)
        }
        Err(e) => {
            info!("No default IMAP account: {e}");
            None
        }
    };

    let backend: Arc<dyn MailBackend> = Arc::new(ImapBackend);
    let jobs = JobManager::new(JobRegistry::new(), Arc::clone(&backend));
    let registry = Operations::new(backend, Arc::new(SmtpSender), jobs)
        .with_default_imap(default_imap)
        .into_registry();
    info!(operations = registry.len(), "Operations registered");
    let dispatcher = Dispatcher::new(Arc::new(registry));

    let connection = AmqpConnection::connect(&config.amqp_url).await?;
    let mut consumers = JoinSet::new();
    for worker in 0..config.workers {
        let channel = connection.channel().await?;
        let dispatcher = dispatcher.clone();
        let queue = config.queue.clone();
        consumers.spawn(async move {
            let result = dispatcher.consume_loop(&channel, &queue).await;
            (worker, result)
        });
    }
    info!(queue = %config.queue, workers = config.workers, "Worker started");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut lost = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutting down");
                consumers.shutdown().await;
                if let Err(e) = connection.close().await {
                    warn!("Connection close failed: {e}");
                }
                return Ok(());
            }
            joined = consumers.join_next() => match joined {
                None => break,
                Some(Ok((worker, Ok(())))) => info!(worker, "Consumer cancelled by broker"),
                Some(Ok((worker, Err(e)))) => {
                    error!(worker, "Consumer stopped: {e}");
                    lost += 1;
                }
                Some(Err(e)) => {
                    error!("Consumer task failed: {e}");
                    lost += 1;
                }
            },
        }
    }

    anyhow::ensure!(lost == 0, "{lost} of {} consumers lost the broker", config.workers);
    Ok(())
}

async fn cmd_call(
    config: &WorkerConfig,
    operation: &str,
    arguments: Arguments,
    timeout: Duration,
) -> anyhow::Result<()> {
    let connection = AmqpConnection::connect(&config.amqp_url).await?;
    let channel = Arc::new(connection.channel().await?);
    let client = RpcClient::connect(channel, config.queue.clone()).await?;

    let response = client.call(operation, arguments, timeout).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    if let Err(e) = connection.close().await {
        warn!("Connection close failed: {e}");
    }

    anyhow::ensure!(response.success, "{operation} failed");
    Ok(())
}
