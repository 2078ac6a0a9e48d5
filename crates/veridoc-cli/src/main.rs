//! VeriDoc CLI - 命令行工具

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use veridoc_core::Config;
use veridoc_server::docverify::Decision;
use veridoc_server::AppState;

#[derive(Parser)]
#[command(name = "veridoc")]
#[command(about = "VeriDoc - document verification pipeline and multi-agent RAG", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST API server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Ask the multi-agent system a single question
    Query {
        /// The question to ask
        question: String,
    },
    /// Run the document verification pipeline on an image
    Verify {
        /// Path to the certificate image (png/jpeg)
        image: PathBuf,
    },
    /// Embed knowledge directory files into the vector store
    Embed {
        /// Re-embed files even when unchanged
        #[arg(long)]
        force: bool,
    },
    /// Interactive question answering loop
    Interactive,
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn log_title(title: &str) {
    println!("\n{}", "=".repeat(60));
    println!("{:^60}", title);
    println!("{}", "=".repeat(60));
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load().context("failed to load configuration")?;
    init_tracing(&config.server.log_level);
    config.validate().context("invalid configuration")?;

    match cli.command {
        Commands::Serve { host, port } => {
            let mut config = config;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            log_title("VERIDOC SERVER STARTUP");
            tracing::info!("Reasoning model: {}", config.ai.reasoning_model);
            tracing::info!("Vision model: {}", config.ai.vision_model);
            tracing::info!("Vector backend: {:?}", config.vector.backend);
            tracing::info!("Knowledge directory: {}", config.knowledge.dir.display());

            let state = AppState::build(config)?;
            veridoc_server::serve(state).await?;
        }
        Commands::Query { question } => {
            let state = AppState::build(config)?;
            let result = state.supervisor.process(&question).await?;

            println!("\n🤖 Response:\n{}", result.answer);
            println!("\nRoute: {:?}", result.route);
            if !result.sources.is_empty() {
                println!("Sources:");
                for source in result.sources {
                    println!("  - {}", source);
                }
            }
        }
        Commands::Verify { image } => {
            let bytes = std::fs::read(&image)
                .with_context(|| format!("cannot read image {}", image.display()))?;
            let media_type = match image.extension().and_then(|e| e.to_str()) {
                Some("jpg") | Some("jpeg") => "image/jpeg",
                _ => "image/png",
            };

            let state = AppState::build(config)?;
            let outcome = state.pipeline.run(&bytes, media_type).await?;

            log_title("BIRTH CERTIFICATE EXTRACTION");
            if let Some(text) = outcome.transcript.get(1).and_then(|m| m.text_content()) {
                println!("{}", text);
            }

            log_title("HOSPITAL VERIFICATION RESULTS");
            println!("{}", serde_json::to_string_pretty(&outcome.report)?);

            log_title("FINAL VERIFICATION ASSESSMENT");
            println!("{}", outcome.assessment);

            match outcome.decision {
                Decision::AutomaticApproval => {
                    log_title("✅ AUTOMATIC APPROVAL");
                    println!("Birth certificate verification passed automated checks");
                }
                Decision::HumanReview => {
                    log_title("👤 HUMAN REVIEW REQUIRED");
                    println!("Birth certificate requires manual verification");
                }
            }
        }
        Commands::Embed { force } => {
            let state = AppState::build(config)?;
            log_title("KNOWLEDGE EMBEDDING");
            let summary = state.knowledge.embed_knowledge(force).await?;
            println!(
                "Embedded {}/{} files ({} unchanged, skipped)",
                summary.embedded_files, summary.total_files, summary.skipped_files
            );
            for path in summary.processed {
                println!("  + {}", path);
            }
        }
        Commands::Interactive => {
            let state = AppState::build(config)?;
            run_interactive(&state).await?;
        }
    }

    Ok(())
}

async fn run_interactive(state: &AppState) -> Result<()> {
    log_title("INTERACTIVE MODE");
    println!("🤖 Multi-Agent RAG System Ready!");
    println!("Ask questions and I'll use my specialized agents to help you.");
    println!("Type 'exit', 'quit', or press Ctrl+C to exit.\n");

    let stdin = std::io::stdin();
    loop {
        print!("❓ Your question: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!("\nInput stream closed. Exiting...");
            break;
        }

        let question = line.trim();
        if matches!(question.to_lowercase().as_str(), "exit" | "quit" | "bye") {
            println!("\n👋 Goodbye!");
            break;
        }
        if question.is_empty() {
            println!("Please enter a question or type 'exit' to quit.");
            continue;
        }

        println!("\n🔄 Processing your request...");
        match state.supervisor.process(question).await {
            Ok(result) => {
                let answer = if result.answer.trim().is_empty() {
                    "Agent completed processing but returned empty response.".to_string()
                } else {
                    result.answer
                };
                println!("\n🤖 Response:\n{}", answer);
            }
            Err(e) => {
                println!("\n❌ Error: {}", e);
                tracing::error!("查询处理失败: {}", e);
            }
        }

        println!("\n{}\n", "=".repeat(60));
    }

    Ok(())
}
