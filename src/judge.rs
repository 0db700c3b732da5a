use crate::config::JudgeConfig;
use crate::models::{Evaluation, EvaluationRequest, ScoreSet};
use crate::rubric::Rubric;
use crate::scoring::extract_scores;
use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse,
    },
};
use backoff::ExponentialBackoffBuilder;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Prefix of the feedback recorded when the judge call fails
pub const EVALUATION_ERROR_PREFIX: &str = "Error during evaluation: ";

/// Text-completion service that turns a prompt into a reply
pub trait CompletionBackend {
    fn complete(
        &self,
        model: &str,
        prompt: &str,
        temperature: Option<f64>,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// Backend speaking the OpenAI chat completions protocol
pub struct OpenAiCompatibleBackend {
    client: Client<OpenAIConfig>,
}

impl OpenAiCompatibleBackend {
    /// Each request is attempted once. Rate-limit replies are returned as errors
    /// instead of being retried by the client.
    pub fn new(api_base: &str, api_key: &str) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);

        let single_attempt = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();

        Self {
            client: Client::with_config(openai_config).with_backoff(single_attempt),
        }
    }

    /// Create the backend from the judge settings, reading the API key from the environment
    pub fn from_config(config: &JudgeConfig) -> Result<Self> {
        let api_key = std::env::var(&config.env_var_api_key)
            .with_context(|| format!("Environment variable {} not found", config.env_var_api_key))?;

        Ok(Self::new(&config.api_endpoint, &api_key))
    }

    /// Build the chat completion request carrying the prompt as a single user message
    fn build_request(
        model: &str,
        prompt: &str,
        temperature: Option<f64>,
    ) -> Result<CreateChatCompletionRequest> {
        let user_message: ChatCompletionRequestMessage =
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.to_string())
                .build()
                .context("Failed to build user message")?
                .into();

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(model).messages([user_message]);
        if let Some(temperature) = temperature {
            args.temperature(temperature as f32);
        }

        args.build().context("Failed to build chat completion request")
    }

    /// Pull the reply text out of the first choice
    fn extract_content(response: CreateChatCompletionResponse) -> Result<String> {
        match response.choices.into_iter().next() {
            Some(choice) => match choice.message.content {
                Some(content) if !content.is_empty() => Ok(content),
                _ => anyhow::bail!("Backend returned an empty message"),
            },
            None => anyhow::bail!("Backend returned no choices"),
        }
    }
}

impl CompletionBackend for OpenAiCompatibleBackend {
    async fn complete(
        &self,
        model: &str,
        prompt: &str,
        temperature: Option<f64>,
    ) -> Result<String> {
        let request = Self::build_request(model, prompt, temperature)?;
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .context("Chat completion request failed")?;

        Self::extract_content(response)
    }
}

/// Grades answers against a rubric using a judge model
pub struct Judge<B> {
    backend: B,
    rubric: Rubric,
}

impl<B: CompletionBackend> Judge<B> {
    pub fn new(backend: B, rubric: Rubric) -> Self {
        Self { backend, rubric }
    }

    pub fn rubric(&self) -> &Rubric {
        &self.rubric
    }

    #[cfg(test)]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Ask the judge to grade one answer.
    ///
    /// Never fails: a backend error is recorded as feedback starting with
    /// [`EVALUATION_ERROR_PREFIX`] and every score is left absent.
    pub async fn evaluate(&self, request: &EvaluationRequest) -> Evaluation {
        let prompt = self.rubric.build_prompt(&request.question, &request.answer);
        debug!(model = %request.model_name, prompt_len = prompt.len(), "Sending evaluation prompt");

        match self
            .backend
            .complete(&request.model_name, &prompt, request.temperature)
            .await
        {
            Ok(feedback) => {
                let scores = extract_scores(&feedback, &self.rubric);
                debug!(total = ?scores.total, "Extracted scores");
                Evaluation {
                    feedback,
                    prompt,
                    scores,
                    failed: false,
                }
            }
            Err(err) => {
                warn!(
                    model = %request.model_name,
                    error = %format!("{err:#}"),
                    "Judge call failed"
                );
                Evaluation {
                    feedback: format!("{}{:#}", EVALUATION_ERROR_PREFIX, err),
                    prompt,
                    scores: ScoreSet::absent(&self.rubric),
                    failed: true,
                }
            }
        }
    }

    /// Generate text for a prompt without any rubric.
    ///
    /// Errors are returned as text starting with `Error:` instead of failing.
    pub async fn generate(
        &self,
        prompt: &str,
        provider: &str,
        model: &str,
        temperature: f64,
    ) -> String {
        if !provider.eq_ignore_ascii_case("gemini") {
            return format!("Error: Unsupported provider '{}'", provider);
        }

        match self.backend.complete(model, prompt, Some(temperature)).await {
            Ok(text) => text,
            Err(err) => {
                warn!(model = %model, error = %format!("{err:#}"), "Generation failed");
                format!("Error: {:#}", err)
            }
        }
    }
}
