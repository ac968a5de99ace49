//! promptcad: command line access to the interpretation pipeline

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use promptcad::{
    extract_modifiers, load_model, prompt, validate, ChatConfig, HttpChatClient, MeshConfig,
    RefineConfig, Refiner,
};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "promptcad")]
#[command(about = "Turn design requests into validated 3D model specifications")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a structured document against the model schema
    Validate {
        /// JSON document with a top-level `model`
        file: PathBuf,
    },

    /// Print the instruction that would be sent for a request
    Prompt { text: String },

    /// Print the color/size cues found in a request
    Modifiers { text: String },

    /// Write the merged ASCII STL for a model
    Export {
        /// Model JSON (full document or bare model)
        #[arg(short, long)]
        input: PathBuf,

        /// Output STL file
        #[arg(short, long)]
        output: PathBuf,

        /// Segment count for curved primitives
        #[arg(long, default_value = "32")]
        segments: usize,
    },

    /// Run one interpretation against a live chat endpoint
    Interpret {
        #[arg(long, env = "PROMPTCAD_CHAT_URL", default_value = "http://localhost:3000/api/chat")]
        chat_url: String,

        /// Request timeout in seconds
        #[arg(long, default_value = "60")]
        timeout: u64,

        text: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Validate { file } => {
            let text = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read input file: {:?}", file))?;
            let document: Value = serde_json::from_str(&text)
                .with_context(|| format!("{:?} is not JSON", file))?;
            if validate(&document) {
                println!("valid");
            } else {
                println!("invalid");
                std::process::exit(1);
            }
        }
        Command::Prompt { text } => {
            println!("{}", prompt::compose(&text).context("Failed to compose instruction")?);
        }
        Command::Modifiers { text } => {
            let modifiers = extract_modifiers(&text);
            println!(
                "{}",
                json!({
                    "color": modifiers.color.as_ref().map(|c| c.as_str()),
                    "size": modifiers.size,
                })
            );
        }
        Command::Export {
            input,
            output,
            segments,
        } => {
            let text = fs::read_to_string(&input)
                .with_context(|| format!("Failed to read input file: {:?}", input))?;
            let model = load_model(&text).context("Input is not a valid model")?;
            let name = output
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("exported")
                .to_string();
            let config = MeshConfig {
                circular_segments: segments,
            };

            let Some(stl) = promptcad::export::model_to_stl(&model, &name, &config) else {
                eprintln!("Model has no geometry, nothing written");
                return Ok(());
            };
            fs::write(&output, stl)
                .with_context(|| format!("Failed to write output file: {:?}", output))?;
            eprintln!("Wrote STL: {:?}", output);
        }
        Command::Interpret {
            chat_url,
            timeout,
            text,
        } => {
            let client = HttpChatClient::new(&ChatConfig {
                endpoint: chat_url,
                timeout: Duration::from_secs(timeout),
            })
            .context("Failed to build chat client")?;
            let refiner = Refiner::new(Arc::new(client), RefineConfig::default());

            let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
            let interpretation = runtime
                .block_on(refiner.interpret(&text, None, &[]))
                .context("Interpretation failed")?;
            println!("{}", serde_json::to_string_pretty(&interpretation)?);
        }
    }

    Ok(())
}
