//! CLI tool for XMI documents.
//!
//! Provides commands for:
//! - Summarizing documents against a type system schema
//! - Round-tripping documents while keeping IDs and unknown content
//! - Listing the types of a schema

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;
use cas_pool::CasPool;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let (ts, config) = commands::load_environment(&cli.options)?;

    match cli.command {
        Commands::Inspect { files, json } => {
            let pool = CasPool::new(ts, rayon::current_num_threads(), config)?;
            let mut failed = false;
            for result in commands::inspect(&pool, &cli.options, &files) {
                match result {
                    Ok(summary) if json => println!("{}", serde_json::to_string(&summary)?),
                    Ok(summary) => {
                        println!("{}", summary.file.display());
                        println!(
                            "  {} feature structures, {} indexed, {} annotations",
                            summary.feature_structures, summary.indexed, summary.annotations
                        );
                        if let Some(len) = summary.text_length {
                            println!("  text: {} bytes", len);
                        }
                        for (name, count) in &summary.types {
                            println!("  {:>8}  {}", count, name);
                        }
                        if summary.out_of_type_system_elements > 0 {
                            println!(
                                "  {} elements outside the type system",
                                summary.out_of_type_system_elements
                            );
                        }
                    }
                    Err(e) => {
                        tracing::error!("{:#}", e);
                        failed = true;
                    }
                }
            }
            Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
        }
        Commands::Roundtrip { input, output } => {
            let summary = commands::roundtrip(ts, config, &cli.options, &input, &output)?;
            println!(
                "{} -> {}: {} feature structures, max xmi:id {}",
                input.display(),
                output.display(),
                summary.feature_structures,
                summary.max_xmi_id
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Types { all } => {
            for line in commands::list_types(&ts, all) {
                println!("{}", line);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
