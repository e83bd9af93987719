use anyhow::{Context, Result, bail};
use berth::cli::{Args, ConfigDiscovery, CreateRequest, EngineOverrides, ExecutionMode};
use berth::{ContainerMeta, Engine, EngineConfig, OpContext};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mode = match args.mode() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };
    let overrides = args.overrides();

    if let ExecutionMode::ShowConfig { init } = mode {
        return show_config(&overrides, init);
    }

    let config = ConfigDiscovery::resolve(&overrides)?;
    init_tracing(&config, overrides.verbose);

    let engine = Engine::new(config).await?;
    let ctx = interruptible_context();

    match mode {
        ExecutionMode::Create(request) => run_create(&engine, &ctx, request).await,
        ExecutionMode::Inspect { tokens } => run_inspect(&engine, &ctx, &tokens).await,
        ExecutionMode::List { quiet } => run_list(&engine, &ctx, quiet).await,
        ExecutionMode::Remove { tokens } => run_remove(&engine, &ctx, &tokens).await,
        ExecutionMode::Rename { token, new_name } => {
            let meta = engine.manager().rename(&ctx, &token, &new_name).await?;
            info!("Renamed {} to {}", meta.short_id(), meta.name);
            Ok(())
        }
        ExecutionMode::ShowConfig { .. } => Ok(()),
    }
}

/// `RUST_LOG` wins over the configured filter; logs go to stderr.
fn init_tracing(config: &EngineConfig, verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("berth=debug")
        } else {
            EnvFilter::new(&config.log_filter)
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Operation context cancelled on Ctrl-C.
fn interruptible_context() -> OpContext {
    let token = CancellationToken::new();
    let on_signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });
    OpContext::with_token(token)
}

fn show_config(overrides: &EngineOverrides, init: bool) -> Result<()> {
    if init {
        let path = ConfigDiscovery::create_default_user_config()?;
        println!("User configuration: {:?}", path);
        println!();
    }

    ConfigDiscovery::show_discovery_info();

    let config = ConfigDiscovery::resolve(overrides)?;
    println!();
    println!("Effective configuration:");
    println!("{}", config.to_toml_string()?);
    Ok(())
}

async fn run_create(engine: &Engine, ctx: &OpContext, request: CreateRequest) -> Result<()> {
    let spec = request.resolve_spec()?;
    let meta = engine.manager().create(ctx, &spec).await?;
    println!("{}", meta.id);
    Ok(())
}

async fn run_inspect(engine: &Engine, ctx: &OpContext, tokens: &[String]) -> Result<()> {
    let mut found = Vec::with_capacity(tokens.len());
    for token in tokens {
        found.push(engine.manager().get(ctx, token).await?);
    }

    let records: Vec<&ContainerMeta> = found.iter().map(|meta| meta.as_ref()).collect();
    let json = serde_json::to_string_pretty(&records).context("Failed to encode metadata")?;
    println!("{}", json);
    Ok(())
}

async fn run_list(engine: &Engine, ctx: &OpContext, quiet: bool) -> Result<()> {
    let containers = engine.manager().list(ctx).await?;

    if quiet {
        for meta in &containers {
            println!("{}", meta.short_id());
        }
        return Ok(());
    }

    println!(
        "{:<12}  {:<24}  {:<24}  {:<10}  CREATED",
        "CONTAINER ID", "NAME", "IMAGE", "STATUS"
    );
    for meta in &containers {
        println!(
            "{:<12}  {:<24}  {:<24}  {:<10}  {}",
            meta.short_id(),
            meta.name,
            meta.image(),
            meta.state.status.to_string(),
            meta.created.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

/// Removes what it can; fails if any token could not be removed.
async fn run_remove(engine: &Engine, ctx: &OpContext, tokens: &[String]) -> Result<()> {
    let mut failed = 0usize;
    for token in tokens {
        match engine.manager().remove(ctx, token).await {
            Ok(meta) => println!("{}", meta.name),
            Err(e) => {
                eprintln!("Error: failed to remove {}: {} ({})", token, e, e.kind());
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} containers could not be removed", failed, tokens.len());
    }
    Ok(())
}
