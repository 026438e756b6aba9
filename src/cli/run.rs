//! One-shot tool runs that stream the reply to stdout.

use std::error::Error;
use std::future::Future;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::api::ChatMessage;
use crate::core::config::Config;
use crate::core::generation::{EndpointSource, GenerationController, GenerationState};
use crate::core::templates::{build_extraction_messages, extract_json};
use crate::core::tools::{
    find_tool, ToolDefinition, CHAT_TOOL_ID, MARKDOWN_TO_JSON_TOOL_ID, OCR_PROMPT, OCR_TOOL_ID,
};
use crate::utils::image::load_image;
use crate::utils::logging::LoggingState;
use crate::utils::url::normalize_base_url;

pub struct RunContext {
    pub model: Option<String>,
    pub endpoint: EndpointSource,
    pub config: Config,
    pub logging: LoggingState,
    pub client: reqwest::Client,
}

impl RunContext {
    pub fn new(
        model: Option<String>,
        ollama_url: Option<String>,
        log: Option<PathBuf>,
    ) -> Result<Self, Box<dyn Error>> {
        let endpoint = match ollama_url {
            Some(url) => EndpointSource::Fixed(normalize_base_url(url.trim())),
            None => EndpointSource::Settings,
        };
        Ok(Self {
            model,
            endpoint,
            config: Config::load_test_safe()?,
            logging: LoggingState::new(log)?,
            client: reqwest::Client::new(),
        })
    }

    fn controller_for(&self, tool: &ToolDefinition) -> GenerationController {
        let model = tool.resolve_model(self.model.as_deref(), &self.config);
        GenerationController::new(self.client.clone(), model, self.endpoint.clone())
    }
}

/// Outcome of a streamed run as seen by the terminal.
struct StreamedRun {
    state: GenerationState,
    cancelled: bool,
}

fn print_new_text(state: &GenerationState, printed: &mut usize) -> io::Result<()> {
    if state.result.len() < *printed {
        *printed = 0;
    }
    let fresh = &state.result[*printed..];
    if !fresh.is_empty() {
        let mut stdout = io::stdout().lock();
        stdout.write_all(fresh.as_bytes())?;
        stdout.flush()?;
    }
    *printed = state.result.len();
    Ok(())
}

/// Drive one generation, echoing text as it arrives. Ctrl+C aborts the
/// request and keeps whatever was already printed.
async fn stream_to_stdout(
    controller: &GenerationController,
    messages: Vec<ChatMessage>,
) -> io::Result<StreamedRun> {
    stream_until(controller, messages, tokio::signal::ctrl_c()).await
}

async fn stream_until<I>(
    controller: &GenerationController,
    messages: Vec<ChatMessage>,
    interrupt: I,
) -> io::Result<StreamedRun>
where
    I: Future,
{
    let mut updates = controller.subscribe();
    let generation = controller.generate(messages);
    tokio::pin!(generation);
    tokio::pin!(interrupt);

    let mut printed = 0usize;
    let mut cancelled = false;
    loop {
        tokio::select! {
            _ = &mut generation => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                print_new_text(&state, &mut printed)?;
            }
            _ = &mut interrupt, if !cancelled => {
                cancelled = true;
                controller.abort();
            }
        }
    }

    let state = controller.state();
    print_new_text(&state, &mut printed)?;
    if printed > 0 && !state.result.ends_with('\n') {
        println!();
    }
    Ok(StreamedRun { state, cancelled })
}

fn finish(
    ctx: &RunContext,
    tool_id: &str,
    prompt: &str,
    run: &StreamedRun,
) -> Result<(), Box<dyn Error>> {
    if run.cancelled {
        eprintln!("⏹  Cancelled");
    }
    if !run.state.result.is_empty() {
        if let Err(err) = ctx.logging.log_exchange(tool_id, prompt, &run.state.result) {
            warn!(error = %err, "failed to write transcript");
        }
    }
    match &run.state.error {
        Some(error) => Err(error.clone().into()),
        None => Ok(()),
    }
}

pub async fn run_ocr(
    ctx: &RunContext,
    image: &Path,
    prompt: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let tool = find_tool(OCR_TOOL_ID).ok_or("OCR tool is not registered")?;
    let encoded = load_image(image)?;
    let prompt = prompt.unwrap_or_else(|| OCR_PROMPT.to_string());

    let controller = ctx.controller_for(tool);
    eprintln!("🔍 {} with {}", tool.name, controller.model());

    let messages = vec![ChatMessage::user(prompt.clone()).with_images(vec![encoded.base64])];
    let run = stream_to_stdout(&controller, messages).await?;
    finish(ctx, tool.id, &format!("{prompt} [{}]", image.display()), &run)
}

pub async fn run_extract(
    ctx: &RunContext,
    input: &Path,
    template_id: &str,
    pretty: bool,
) -> Result<(), Box<dyn Error>> {
    let tool = find_tool(MARKDOWN_TO_JSON_TOOL_ID).ok_or("markdown-to-json tool is not registered")?;
    let markdown = if input == Path::new("-") {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(input)?
    };
    let messages = build_extraction_messages(template_id, &markdown)?;

    let controller = ctx.controller_for(tool);
    eprintln!("🧾 {} ({template_id}) with {}", tool.name, controller.model());

    let run = stream_to_stdout(&controller, messages).await?;
    if run.state.error.is_none() && !run.cancelled {
        match extract_json(&run.state.result) {
            Ok(value) if pretty => println!("{}", serde_json::to_string_pretty(&value)?),
            Ok(_) => {}
            Err(err) => eprintln!("⚠️  Reply is not valid JSON: {err}"),
        }
    }
    finish(ctx, tool.id, &markdown, &run)
}

pub async fn run_chat(
    ctx: &RunContext,
    prompt: String,
    system: Option<String>,
) -> Result<(), Box<dyn Error>> {
    if prompt.trim().is_empty() {
        return Err("Usage: aihub chat <prompt>".into());
    }

    let tool = find_tool(CHAT_TOOL_ID).ok_or("chat tool is not registered")?;
    let controller = ctx.controller_for(tool);

    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system {
        messages.push(ChatMessage::system(system));
    }
    messages.push(ChatMessage::user(prompt.clone()));

    let run = stream_to_stdout(&controller, messages).await?;
    finish(ctx, tool.id, &prompt, &run)
}
