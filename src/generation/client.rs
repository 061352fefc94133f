use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use yonkoma_schema::{
    Content, GeminiErrorBody, GeminiGenerateContentRequest, GeminiResponseBody, GenerationConfig,
    InlineData, Part, SafetySetting,
};

use super::Generator;
use super::media::{inline_from_bytes, mime_for_path, parse_image_data_url, to_data_url};
use super::prompts::{self, COMIC_ASPECT_RATIO, ComicRequest, ProjectInfo};
use super::story::{CharacterBrief, CharacterProfile, Story, StoryContext};
use crate::config::GenerationConfig as GenerationSettings;
use crate::db::settings::{GEMINI_API_KEY, non_blank};
use crate::db::{ModelPreferences, Store};
use crate::error::{GenerationError, IsRetryable};
use crate::utils::logging::with_pretty_json_debug;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini `generateContent` client reading its key and models from the store.
pub struct GenerationClient {
    client: reqwest::Client,
    store: Store,
    config: GenerationSettings,
    retry_policy: ExponentialBuilder,
}

impl GenerationClient {
    pub fn new(store: Store, config: GenerationSettings) -> Result<Self, GenerationError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs));

        if let Some(proxy_url) = config.proxy.as_ref() {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
        }

        let retry_policy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(500))
            .with_max_delay(Duration::from_secs(5))
            .with_max_times(config.retry_max_times)
            .with_jitter();

        Ok(Self {
            client: builder.build()?,
            store,
            config,
            retry_policy,
        })
    }

    async fn api_key(&self) -> Result<String, GenerationError> {
        non_blank(self.store.get_setting(GEMINI_API_KEY).await?)
            .ok_or(GenerationError::MissingApiKey)
    }

    async fn models(&self) -> Result<ModelPreferences, GenerationError> {
        Ok(ModelPreferences::load(&self.store).await?)
    }

    fn endpoint(&self, model: &str) -> Result<Url, GenerationError> {
        let base = self.config.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!(
            "{base}/v1beta/models/{model}:generateContent"
        ))?)
    }

    /// POST one request, retrying transport errors, 429 and 5xx.
    async fn generate(
        &self,
        model: &str,
        request: &GeminiGenerateContentRequest,
    ) -> Result<GeminiResponseBody, GenerationError> {
        let api_key = self.api_key().await?;
        let url = self.endpoint(model)?;

        with_pretty_json_debug(request, |body| {
            debug!(model, body, "Gemini request");
        });

        let op = || async {
            let resp = self
                .client
                .post(url.clone())
                .header(API_KEY_HEADER, api_key.as_str())
                .json(request)
                .send()
                .await?;

            let status = resp.status();
            let bytes = resp.bytes().await?;
            if !status.is_success() {
                if let Ok(body) = serde_json::from_slice::<GeminiErrorBody>(&bytes) {
                    return Err(GenerationError::UpstreamMapped { status, body });
                }
                return Err(GenerationError::UpstreamStatus {
                    status,
                    body: String::from_utf8_lossy(&bytes).into_owned(),
                });
            }

            Ok::<_, GenerationError>(serde_json::from_slice::<GeminiResponseBody>(&bytes)?)
        };

        op.retry(self.retry_policy)
            .when(GenerationError::is_retryable)
            .notify(|err, dur: Duration| {
                warn!(model, error = %err, "Gemini call failed, retrying in {:?}", dur);
            })
            .await
    }

    async fn generate_text(
        &self,
        request: &GeminiGenerateContentRequest,
    ) -> Result<String, GenerationError> {
        let model = self.models().await?.text_model;
        let response = self.generate(&model, request).await?;
        response
            .text()
            .ok_or_else(|| GenerationError::InvalidResponse("response carried no text".into()))
    }

    async fn generate_image(
        &self,
        request: &GeminiGenerateContentRequest,
    ) -> Result<String, GenerationError> {
        let model = self.models().await?.image_model;
        let response = self.generate(&model, request).await?;
        let image = response.first_inline_data().ok_or(GenerationError::NoImage)?;
        info!(model, mime_type = %image.mime_type, "Image generated");
        Ok(to_data_url(image))
    }

    /// Read a layout template; a missing file only degrades the prompt.
    async fn load_template(&self, path: Option<&Path>) -> Option<InlineData> {
        let path = path?;
        match tokio::fs::read(path).await {
            Ok(bytes) => Some(inline_from_bytes(mime_for_path(path), &bytes)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Layout template unavailable");
                None
            }
        }
    }

    /// Expand a short description into a full character profile.
    pub async fn generate_character_profile(
        &self,
        description: &str,
    ) -> Result<CharacterProfile, GenerationError> {
        let request = text_request(prompts::character_profile_prompt(description), None);
        let text = self.generate_text(&request).await?;
        super::story::parse_character_profile(&text)
    }
}

#[async_trait]
impl Generator for GenerationClient {
    async fn generate_episode_story(
        &self,
        topic: &str,
        context: &StoryContext,
    ) -> Result<Story, GenerationError> {
        let request = text_request(
            prompts::story_prompt(topic, context),
            Some(prompts::STORY_SYSTEM_INSTRUCTION),
        );
        let text = self.generate_text(&request).await?;
        Ok(super::story::parse_story(topic, &text))
    }

    async fn generate_character_image(
        &self,
        character: &CharacterBrief,
        project: &ProjectInfo,
        reference_images: &[String],
    ) -> Result<String, GenerationError> {
        let template = self
            .load_template(self.config.character_sheet_template.as_deref())
            .await;

        let mut parts = Vec::new();
        let has_template = template.is_some();
        parts.extend(template.map(Part::inline));
        parts.push(Part::text(prompts::character_sheet_prompt(
            character,
            project,
            has_template,
        )));
        parts.extend(image_parts(reference_images.iter().map(String::as_str)));

        self.generate_image(&image_request(parts, false)).await
    }

    async fn generate_full_comic(&self, request: &ComicRequest) -> Result<String, GenerationError> {
        let template = self
            .load_template(self.config.comic_layout_template.as_deref())
            .await;

        let mut parts = vec![Part::text(prompts::comic_prompt(
            request,
            template.is_some(),
        ))];
        parts.extend(template.map(Part::inline));
        parts.extend(image_parts(
            request
                .characters
                .iter()
                .filter_map(|c| c.image_preview_url.as_deref()),
        ));

        self.generate_image(&image_request(parts, true)).await
    }

    async fn edit_comic_image(
        &self,
        existing_image: &str,
        instructions: &str,
        character_images: &[String],
    ) -> Result<String, GenerationError> {
        let mut parts = vec![Part::text(prompts::edit_prompt(instructions))];
        parts.extend(image_parts(std::iter::once(existing_image)));
        parts.extend(image_parts(character_images.iter().map(String::as_str)));

        self.generate_image(&image_request(parts, true)).await
    }
}

fn text_request(prompt: String, system: Option<&str>) -> GeminiGenerateContentRequest {
    GeminiGenerateContentRequest {
        contents: vec![Content::user(vec![Part::text(prompt)])],
        system_instruction: system.map(Content::system),
        safety_settings: if system.is_some() {
            SafetySetting::block_only_high()
        } else {
            Vec::new()
        },
        ..Default::default()
    }
}

fn image_request(parts: Vec<Part>, page_layout: bool) -> GeminiGenerateContentRequest {
    let generation_config = page_layout.then(|| GenerationConfig {
        response_modalities: vec!["IMAGE".to_string()],
        image_config: Some(serde_json::json!({ "aspectRatio": COMIC_ASPECT_RATIO })),
        ..Default::default()
    });
    GeminiGenerateContentRequest {
        contents: vec![Content::user(parts)],
        generation_config,
        ..Default::default()
    }
}

/// Inline parts for every usable `data:` image reference.
fn image_parts<'a>(urls: impl Iterator<Item = &'a str>) -> impl Iterator<Item = Part> {
    urls.filter_map(parse_image_data_url).map(Part::inline)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_parts_skip_remote_references() {
        let urls = [
            "data:image/png;base64,AAAA",
            "https://example.com/x.png",
            "data:image/jpeg;base64,BBBB",
        ];
        let parts: Vec<Part> = image_parts(urls.into_iter()).collect();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1].inline_data.as_ref().unwrap().data, "BBBB");
    }

    #[test]
    fn comic_requests_ask_for_portrait_images() {
        let request = image_request(vec![Part::text("x")], true);
        let config = request.generation_config.unwrap();
        assert_eq!(config.response_modalities, vec!["IMAGE"]);
        assert_eq!(
            config.image_config.unwrap()["aspectRatio"],
            serde_json::json!("9:16")
        );
        assert!(image_request(Vec::new(), false).generation_config.is_none());
    }

    #[test]
    fn story_requests_carry_system_instruction_and_safety() {
        let request = text_request("p".to_string(), Some("sys"));
        assert!(request.system_instruction.is_some());
        assert_eq!(request.safety_settings.len(), 4);
        assert!(text_request("p".to_string(), None).safety_settings.is_empty());
    }
}
