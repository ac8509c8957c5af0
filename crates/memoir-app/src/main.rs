//! Memoir application binary - composition root.
//!
//! Ties the crates together into a single executable:
//! 1. Load configuration from TOML
//! 2. Build the ingestion pipeline over the model-free synthetic backend
//! 3. Ingest clip directories into graph snapshots, resumably
//! 4. Answer questions against snapshots, refresh equivalences, print stats
//!
//! Exit codes: 0 answered / succeeded, 1 error, 2 question unanswerable.

mod backend;
mod cli;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use memoir_core::config::MemoirConfig;
use memoir_core::error::Result;
use memoir_extract::clip::DirectoryClipSource;
use memoir_extract::embedder::MockTextEmbedder;
use memoir_extract::retry::RetryPolicy;
use memoir_graph::MemoryGraph;
use memoir_ingest::IngestPipeline;
use memoir_resolve::refresh_equivalences;
use memoir_retrieval::{
    AggregationMode, MockQueryExpander, MockSynthesizer, RetrievalEngine, RetrievalOutcome,
    RetrieveOptions,
};

use backend::{SyntheticCaptionGenerator, SyntheticFaceExtractor, SyntheticVoiceExtractor};
use cli::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = MemoirConfig::load_or_default(&cli.resolve_config_path());

    let level = cli.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();

    match run(cli, config).await {
        Ok(code) => code,
        Err(err) => {
            error!("{}", err);
            eprintln!("error: {}", err);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli, config: MemoirConfig) -> Result<ExitCode> {
    match cli.command {
        Command::Ingest {
            clips,
            graph,
            clip_duration,
        } => {
            let mut memory = load_or_new(&graph)?;
            let pipeline = IngestPipeline::new(
                SyntheticFaceExtractor,
                SyntheticVoiceExtractor,
                SyntheticCaptionGenerator,
                MockTextEmbedder::new(),
                &config,
            );
            let source = DirectoryClipSource::new(clips, clip_duration);
            let report = pipeline.ingest_video(&mut memory, &source).await?;
            memory.save(&graph)?;

            println!(
                "ingested {} clip(s), skipped {}, failed {}",
                report.ingested.len(),
                report.skipped.len(),
                report.failed.len()
            );
            for (clip_id, reason) in &report.failed {
                println!("  failed {}: {}", clip_id, reason);
            }
            println!(
                "graph now holds {} episodic node(s), {} identitie(s)",
                memory.episodic_count(),
                memory.identity_count()
            );
            Ok(ExitCode::SUCCESS)
        }

        Command::Ask {
            graph,
            question,
            query_num,
            topk,
            mode,
            trace,
        } => {
            let memory = MemoryGraph::load(&graph)?;
            let mut options = RetrieveOptions::from_config(&config.retrieval)?;
            if let Some(n) = query_num {
                options.query_num = n;
            }
            if let Some(k) = topk {
                options.topk = k;
            }
            if let Some(ref name) = mode {
                options.mode = AggregationMode::from_name(name).ok_or_else(|| {
                    memoir_core::error::MemoirError::Config(format!(
                        "unknown aggregation mode '{}'",
                        name
                    ))
                })?;
            }
            options.validate()?;

            let engine = RetrievalEngine::new(
                MockTextEmbedder::new(),
                MockQueryExpander::new(),
                MockSynthesizer::new(),
                RetryPolicy::from_config(&config.ingest.retry),
            );

            let outcome = engine
                .answer_with_retrieval(&memory, &question, &options)
                .await?;
            if trace {
                println!("{}", serde_json::to_string_pretty(outcome.session())?);
            }
            match outcome {
                RetrievalOutcome::Answered { answer, session } => {
                    println!("{}", answer);
                    if !trace {
                        println!();
                        println!("evidence ({} item(s), timeline order):", session.evidence.len());
                        for item in &session.evidence {
                            match item.clip_id {
                                Some(clip) => println!("  [{}] {}", clip, item.text),
                                None => println!("  [profile] {}", item.text),
                            }
                        }
                    }
                    Ok(ExitCode::SUCCESS)
                }
                RetrievalOutcome::Unanswerable { .. } => {
                    println!("unanswerable: no relevant memories for this question");
                    Ok(ExitCode::from(2))
                }
            }
        }

        Command::Refresh { graph } => {
            let mut memory = MemoryGraph::load(&graph)?;
            let report = refresh_equivalences(&mut memory, &config.resolver)?;
            memory.save(&graph)?;
            println!(
                "refresh merged {} identitie(s) across {} component(s); {} live identitie(s) remain",
                report.merges,
                report.components,
                memory.live_identity_nodes().count()
            );
            Ok(ExitCode::SUCCESS)
        }

        Command::Stats { graph } => {
            let memory = MemoryGraph::load(&graph)?;
            let statements: usize = memory
                .all_episodic_nodes()
                .map(|n| n.statements.len())
                .sum();
            println!("graph {}", memory.graph_id());
            println!("  episodic nodes: {}", memory.episodic_count());
            println!("  statements:     {}", statements);
            println!(
                "  identities:     {} ({} live)",
                memory.identity_count(),
                memory.live_identity_nodes().count()
            );
            println!("  aliases:        {}", memory.alias_count());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_or_new(path: &Path) -> Result<MemoryGraph> {
    if path.exists() {
        MemoryGraph::load(path)
    } else {
        Ok(MemoryGraph::new())
    }
}
