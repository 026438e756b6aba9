use tracing::debug;

use crate::api::{ModelTag, TagsResponse};
use crate::core::chat_stream::StreamError;
use crate::utils::url::construct_api_url;

pub async fn fetch_models(
    client: &reqwest::Client,
    base_url: &str,
) -> Result<Vec<ModelTag>, StreamError> {
    let tags_url = construct_api_url(base_url, "api/tags");
    debug!(url = %tags_url, "fetching model list");

    let response = client
        .get(tags_url)
        .send()
        .await
        .map_err(StreamError::from_reqwest)?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(StreamError::ListModels {
            status: status.as_u16(),
            body: error_text,
        });
    }

    let tags = response
        .json::<TagsResponse>()
        .await
        .map_err(StreamError::from_reqwest)?;
    Ok(tags.models)
}

pub fn sort_models(models: &mut [ModelTag]) {
    models.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
}
