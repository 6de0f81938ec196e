#![doc = include_str!("../README.md")]

mod config;
mod telemetry;

use std::{
    io::{self, BufWriter, Write},
    sync::Arc,
};

use anyhow::Context;
use clap::Parser;
use config::{Action, CliArgs, CliConfig, MachineSource};
use segflake::{
    IdConverter, IdGenerator, InMemoryCoordinator, InMemorySegmentRepository, InstanceId,
    MachineIdDistributor, MonotonicClock, SegmentChainIdGenerator, SnowflakeIdGenerator,
};
use telemetry::init_telemetry;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = CliConfig::try_from(args)?;

    init_telemetry()?;
    if cfg!(debug_assertions) {
        tracing::debug!("Running with full config: {:#?}", config);
    }

    match config.kind {
        segflake::GeneratorKind::SegmentChain => {
            let repository = Arc::new(InMemorySegmentRepository::new());
            let generator = SegmentChainIdGenerator::new(repository, config.segment.clone())?;
            run(&generator, &config).await
        }
        segflake::GeneratorKind::Snowflake => run_snowflake(&config).await,
    }
}

async fn run_snowflake(config: &CliConfig) -> anyhow::Result<()> {
    let layout = config.snowflake.layout()?;
    let policy = config.snowflake.policy()?;

    match &config.machine {
        MachineSource::Static(machine_id) => {
            let generator =
                SnowflakeIdGenerator::new(layout, *machine_id, policy, MonotonicClock::default())?;
            run(&generator, config).await
        }
        MachineSource::Leased(distributor_config) => {
            let coordinator = Arc::new(InMemoryCoordinator::new());
            let distributor = MachineIdDistributor::new(coordinator, distributor_config.clone())?;
            let lease = distributor.start(InstanceId::generate()).await?;
            tracing::info!(
                machine_id = lease.machine_id(),
                namespace = %distributor_config.namespace,
                "leased machine id"
            );

            let generator =
                SnowflakeIdGenerator::with_lease(layout, &lease, policy, MonotonicClock::default())?;
            let result = run(&generator, config).await;

            // Release even when generation failed.
            if let Err(e) = lease.shutdown().await {
                tracing::error!("Error releasing machine id: {e}");
            }
            result
        }
    }
}

async fn run<G: IdGenerator>(generator: &G, config: &CliConfig) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    match &config.action {
        Action::Generate { count } => {
            for _ in 0..*count {
                let id = generator.generate(None).await?;
                match &config.converter {
                    Some(converter) => writeln!(out, "{}", converter.encode(id))?,
                    None => writeln!(out, "{id}")?,
                }
            }
        }
        Action::Parse { id, json } => {
            let id = decode(id, config.converter.as_ref())?;
            let breakdown = generator.parse(id)?;
            if *json {
                serde_json::to_writer_pretty(&mut out, &breakdown)?;
                writeln!(out)?;
            } else {
                writeln!(out, "{breakdown}")?;
            }
        }
    }

    out.flush()?;
    Ok(())
}

fn decode(id: &str, converter: Option<&IdConverter>) -> anyhow::Result<u64> {
    match converter {
        Some(converter) => Ok(converter.decode(id)?),
        None => id
            .parse()
            .with_context(|| format!("`{id}` is not an integer id; pass --format to decode it")),
    }
}
