//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod model_list;
pub mod run;
pub mod settings;
pub mod tool_list;


use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cli::model_list::list_models;
use crate::cli::run::{run_chat, run_extract, run_ocr, RunContext};
use crate::cli::settings::{set_setting, unset_setting};
use crate::cli::tool_list::{list_templates, list_tools};

#[derive(Parser)]
#[command(name = "aihub")]
#[command(about = "Local AI tools backed by an Ollama daemon")]
#[command(
    long_about = "aihub runs small AI tools (image OCR, markdown-to-JSON extraction, chat) \
against a locally running Ollama daemon and streams the reply to your terminal.\n\n\
Configuration:\n\
  aihub set ollama-url <url>           Point at a non-default Ollama address\n\
  aihub set default-model <tool> <m>   Pick the model a tool uses\n\n\
Environment Variables:\n\
  AIHUB_OLLAMA_URL  Override the Ollama base URL for one run\n\
  AIHUB_LOG         Diagnostic log filter (e.g. debug, aihub=trace)\n\n\
Press Ctrl+C while a reply is streaming to cancel it."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Model to use instead of the tool's default
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Ollama base URL for this run (overrides config)
    #[arg(long, global = true, value_name = "URL")]
    pub ollama_url: Option<String>,

    /// Append prompts and replies to this file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract text from an image (JPG, PNG or WebP)
    Ocr {
        /// Image file to read
        image: PathBuf,
        /// Instruction sent with the image
        #[arg(long)]
        prompt: Option<String>,
    },
    /// Extract structured JSON from a markdown document
    Extract {
        /// Markdown file, or '-' for stdin
        input: PathBuf,
        /// Template id (see `aihub templates`)
        #[arg(short = 't', long, default_value = "mutual-fund")]
        template: String,
        /// Re-print the reply as pretty JSON once it validates
        #[arg(long)]
        pretty: bool,
    },
    /// Send a single prompt and stream the reply
    Chat {
        /// Prompt text
        #[arg(required = true, trailing_var_arg = true)]
        prompt: Vec<String>,
        /// Optional system message
        #[arg(long)]
        system: Option<String>,
    },
    /// List models installed in the Ollama daemon
    Models,
    /// List available tools
    Tools,
    /// List JSON extraction templates
    Templates,
    /// Set configuration values
    Set {
        /// Configuration key to set
        key: String,
        /// Value(s) for the key
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
        /// Tool id, for default-model
        value: Option<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("AIHUB_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    tokio::runtime::Runtime::new()?.block_on(async_main(Args::parse()))
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    let Args {
        command,
        model,
        ollama_url,
        log,
    } = args;

    match command {
        Commands::Ocr { image, prompt } => {
            let ctx = RunContext::new(model, ollama_url, log)?;
            run_ocr(&ctx, &image, prompt).await
        }
        Commands::Extract {
            input,
            template,
            pretty,
        } => {
            let ctx = RunContext::new(model, ollama_url, log)?;
            run_extract(&ctx, &input, &template, pretty).await
        }
        Commands::Chat { prompt, system } => {
            let ctx = RunContext::new(model, ollama_url, log)?;
            run_chat(&ctx, prompt.join(" "), system).await
        }
        Commands::Models => list_models(ollama_url).await,
        Commands::Tools => {
            list_tools();
            Ok(())
        }
        Commands::Templates => {
            list_templates();
            Ok(())
        }
        Commands::Set { key, value } => {
            println!("✅ {}", set_setting(&key, &value)?);
            Ok(())
        }
        Commands::Unset { key, value } => {
            println!("✅ {}", unset_setting(&key, value.as_deref())?);
            Ok(())
        }
    }
}
