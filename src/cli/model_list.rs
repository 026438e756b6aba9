//! Model listing functionality
//!
//! Lists the models installed in the Ollama daemon via `/api/tags`.

use std::error::Error;

use crate::api::models::{fetch_models, sort_models};
use crate::core::config::Config;
use crate::core::generation::classify_error;
use crate::utils::url::normalize_base_url;

pub async fn list_models(ollama_url: Option<String>) -> Result<(), Box<dyn Error>> {
    let base_url = ollama_url
        .map(|url| normalize_base_url(url.trim()))
        .unwrap_or_else(Config::resolve_ollama_url);
    let client = reqwest::Client::new();

    let mut models = fetch_models(&client, &base_url)
        .await
        .map_err(|err| classify_error(&err, &base_url))?;
    sort_models(&mut models);

    println!("🤖 Available Models at {base_url}");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if models.is_empty() {
        println!("No models installed. Try `ollama pull llama3.2`.");
        return Ok(());
    }

    for model in &models {
        match model.size {
            Some(size) => println!("  • {} ({:.1} GB)", model.name, size as f64 / 1e9),
            None => println!("  • {}", model.name),
        }
    }
    Ok(())
}
