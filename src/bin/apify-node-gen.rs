use std::{fs, path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};
use apify_actor_node::{
    emit_properties, map_schema, ActorRunner, Authentication, Client, Config, Credentials,
    ExecutionConfig, NodeConfig, OutputMode, DEFAULT_PLATFORM,
};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "apify-node-gen")]
#[command(version, about = "Generate and run workflow nodes for Apify actors", long_about = None)]
struct Cli {
    /// Apify API token
    #[arg(long, env = "APIFY_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    /// OAuth2 access token, used instead of the API token
    #[arg(long, env = "APIFY_OAUTH_TOKEN", global = true, hide_env_values = true)]
    oauth_token: Option<String>,

    /// API base URL
    #[arg(long, env = "APIFY_API_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Value of the integration platform header
    #[arg(long, global = true, default_value = DEFAULT_PLATFORM)]
    platform: String,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Map an actor's input schema into node properties
    Generate {
        /// Actor id or `username/name`
        actor: String,

        /// Directory receiving properties.json and node.json
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Run an actor once per input item and print the output items
    Run {
        /// Actor id or `username/name`
        actor: String,

        /// JSON file holding one input object or an array of them
        #[arg(long)]
        input: PathBuf,

        /// Reduce every dataset item to this field
        #[arg(long)]
        reduce_to: Option<String>,

        /// Record failed items and keep going
        #[arg(long)]
        continue_on_fail: bool,

        /// Give up waiting for a run after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let (credentials, authentication) = match (&cli.oauth_token, &cli.token) {
        (Some(oauth), _) => (Credentials::oauth(oauth)?, Authentication::OAuth2),
        (None, Some(token)) => (Credentials::api_token(token)?, Authentication::ApiKey),
        (None, None) => bail!("an API token is required (--token or APIFY_TOKEN)"),
    };

    match cli.command {
        Commands::Generate { actor, out_dir } => {
            let client = Client::new(Config {
                base_url: cli.base_url,
                credentials,
                authentication,
                platform: Some(cli.platform.clone()),
                ..Default::default()
            })?;
            generate(&client, &actor, &cli.platform, out_dir).await
        }
        Commands::Run {
            actor,
            input,
            reduce_to,
            continue_on_fail,
            timeout_secs,
        } => {
            let client = Client::new(Config {
                base_url: cli.base_url,
                credentials,
                authentication,
                platform: Some(cli.platform),
                ..Default::default()
            })?;
            let mut config = ExecutionConfig::new(actor).with_continue_on_fail(continue_on_fail);
            if let Some(field) = reduce_to {
                config = config.with_output_mode(OutputMode::Reduced { field });
            }
            if let Some(secs) = timeout_secs {
                config = config.with_execution_timeout(Duration::from_secs(secs));
            }
            run(client, config, input).await
        }
    }
}

async fn generate(client: &Client, actor_id: &str, platform: &str, out_dir: PathBuf) -> Result<()> {
    let actor = client
        .actors()
        .get(actor_id)
        .await
        .with_context(|| format!("failed to fetch actor {actor_id}"))?;
    let build_id = actor.default_build_id()?;
    let build = client
        .actors()
        .get_build(build_id)
        .await
        .with_context(|| format!("failed to fetch build {build_id}"))?;
    let schema = build
        .input_schema()
        .with_context(|| format!("build {build_id} of actor {actor_id} has no input schema"))?;

    let mapped = map_schema(schema);
    for warning in &mapped.warnings {
        warn!("{warning}");
    }

    fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let properties_path = out_dir.join("properties.json");
    let file = fs::File::create(&properties_path)
        .with_context(|| format!("failed to create {}", properties_path.display()))?;
    emit_properties(&mapped.fields, file)?;

    let node = NodeConfig::from_actor(&actor, platform);
    let node_path = out_dir.join("node.json");
    fs::write(&node_path, serde_json::to_string_pretty(&node)? + "\n")
        .with_context(|| format!("failed to write {}", node_path.display()))?;

    info!(
        class_name = %node.class_name,
        fields = mapped.fields.len(),
        "wrote {} and {}",
        properties_path.display(),
        node_path.display()
    );
    Ok(())
}

async fn run(client: Client, config: ExecutionConfig, input: PathBuf) -> Result<()> {
    let raw = fs::read_to_string(&input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let parsed: Value = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", input.display()))?;
    let items: Vec<Map<String, Value>> = match parsed {
        Value::Object(item) => vec![item],
        Value::Array(values) => values
            .into_iter()
            .map(|value| match value {
                Value::Object(item) => Ok(item),
                other => bail!("input items must be objects, got {other}"),
            })
            .collect::<Result<_>>()?,
        other => bail!("input must be an object or an array of objects, got {other}"),
    };

    let output = ActorRunner::new(client, config).execute(&items).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
