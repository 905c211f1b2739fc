use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::{response_key, CacheContext, ResponseCache};
use crate::extract;
use crate::gemini::{
    GeminiClient, GeminiError, ModelClient, ModelRequest, TEXT_MODEL, VISION_MODEL,
};
use crate::models::{GenerationResult, Message, UserPreferences};
use crate::normalize::{self, StructuredPayload};
use crate::prompt::PromptBuilder;

/// Stand-in prose when the model returned no text at all.
const EMPTY_RESPONSE_TEXT: &str = "I'm having trouble connecting to the kitchen.";
/// Shown when the whole response was a JSON block with no prose around it.
const PAYLOAD_ONLY_ACK: &str = "Here is the result you asked for:";

/// Pure backoff policy: delay doubles per attempt, no jitter.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * self.multiplier.pow(attempt)
    }
}

/// Orchestrates one conversation turn: cache lookup, prompt assembly, the
/// model call with bounded retries, payload extraction, and cache store.
///
/// Explicitly constructed and owns its cache; dropped (or [`reset`]) on
/// logout rather than living as an ambient singleton.
///
/// [`reset`]: ChatGateway::reset
pub struct ChatGateway {
    client: Arc<dyn ModelClient>,
    cache: ResponseCache<GenerationResult>,
    retry: RetryPolicy,
}

impl ChatGateway {
    pub fn from_env() -> Result<Self, GeminiError> {
        Ok(Self::new(
            Arc::new(GeminiClient::from_env()?),
            RetryPolicy::default(),
        ))
    }

    pub fn new(client: Arc<dyn ModelClient>, retry: RetryPolicy) -> Self {
        Self {
            client,
            cache: ResponseCache::new(),
            retry,
        }
    }

    /// Drop all cached responses. Called on logout.
    pub fn reset(&self) {
        let dropped = self.cache.len();
        self.cache.clear();
        info!("🧹 Cleared {} cached responses", dropped);
    }

    pub async fn generate(
        &self,
        history: &[Message],
        prompt_text: &str,
        preferences: Option<&UserPreferences>,
        image: Option<Bytes>,
        zen_mode: bool,
    ) -> Result<GenerationResult, GeminiError> {
        // Image turns skip the cache: payloads are large and effectively unique.
        let cache_key = if image.is_none() {
            let key = response_key(
                prompt_text,
                &CacheContext {
                    history_last_id: history.last().map(|m| m.id.as_str()),
                    zen: zen_mode,
                    prefs: preferences,
                },
            );
            if let Some(cached) = self.cache.get(&key) {
                debug!("Returning cached response for: {}", prompt_text);
                return Ok(cached);
            }
            Some(key)
        } else {
            None
        };

        let builder = PromptBuilder::new(preferences, zen_mode);
        let request = ModelRequest {
            model: if image.is_some() {
                VISION_MODEL
            } else {
                TEXT_MODEL
            },
            system_instruction: builder.system_instruction(),
            turns: builder.turns(history, prompt_text, image),
        };

        let raw = self.call_with_retries(&request).await?;
        let result = assemble_result(&raw);

        // Cached whether or not a structured payload was present.
        if let Some(key) = cache_key {
            self.cache.set(&key, result.clone());
        }
        Ok(result)
    }

    async fn call_with_retries(&self, request: &ModelRequest) -> Result<String, GeminiError> {
        let mut last_error = None;
        for attempt in 0..self.retry.max_attempts {
            match self.client.generate(request).await {
                Ok(raw) => return Ok(raw),
                Err(e) => {
                    warn!("Model call attempt {} failed: {}", attempt + 1, e);
                    last_error = Some(e);
                    if attempt + 1 < self.retry.max_attempts {
                        tokio::time::sleep(self.retry.delay_for(attempt)).await;
                    }
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| GeminiError::Http("model call never attempted".to_string())))
    }
}

/// Turn raw model text into the per-turn result. Extraction and
/// normalization never error and never trigger a retry; a malformed payload
/// degrades to a prose-only result.
fn assemble_result(raw: &str) -> GenerationResult {
    let raw = if raw.is_empty() {
        EMPTY_RESPONSE_TEXT
    } else {
        raw
    };

    let payload = extract::extract_json(raw).and_then(normalize::normalize);
    let clean = extract::strip_json_fences(raw);

    let (recipe, meal_plan) = match payload {
        Some(StructuredPayload::Recipe(r)) => (Some(r), None),
        Some(StructuredPayload::MealPlan(m)) => (None, Some(m)),
        None => (None, None),
    };

    let text = if !clean.is_empty() {
        clean
    } else if recipe.is_some() || meal_plan.is_some() {
        PAYLOAD_ONLY_ACK.to_string()
    } else {
        raw.to_string()
    };

    GenerationResult {
        text,
        recipe,
        meal_plan,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Plays back a scripted sequence of model outcomes.
    struct ScriptedClient {
        responses: Mutex<VecDeque<Result<String, GeminiError>>>,
        calls: AtomicUsize,
        last_request: Mutex<Option<ModelRequest>>,
    }

    impl ScriptedClient {
        fn new(responses: Vec<Result<String, GeminiError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedClient {
        async fn generate(&self, request: &ModelRequest) -> Result<String, GeminiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock() = Some(request.clone());
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(GeminiError::Http("script exhausted".to_string())))
        }
    }

    fn gateway(client: Arc<ScriptedClient>) -> ChatGateway {
        ChatGateway::new(client, RetryPolicy::default())
    }

    fn user_message(id: &str, text: &str) -> Message {
        Message {
            id: id.to_string(),
            role: crate::models::UserRole::User,
            text: text.to_string(),
            image: None,
            timestamp: Utc::now(),
            recipe_data: None,
            meal_plan_data: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_with_exponential_backoff_then_succeeds() {
        let client = ScriptedClient::new(vec![
            Err(GeminiError::Http("connection reset".to_string())),
            Err(GeminiError::Http("connection reset".to_string())),
            Ok("All good now!".to_string()),
        ]);
        let gateway = gateway(client.clone());

        let start = tokio::time::Instant::now();
        let result = gateway
            .generate(&[], "plan my week", None, None, false)
            .await
            .unwrap();

        assert_eq!(result.text, "All good now!");
        assert_eq!(client.calls(), 3);
        // two waits: 1s then 2s
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(4), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_surface_the_last_error() {
        let client = ScriptedClient::new(vec![
            Err(GeminiError::Http("first".to_string())),
            Err(GeminiError::Http("second".to_string())),
            Err(GeminiError::Api {
                status: 503,
                body: "overloaded".to_string(),
            }),
        ]);
        let gateway = gateway(client.clone());

        let err = gateway
            .generate(&[], "plan my week", None, None, false)
            .await
            .unwrap_err();

        assert_eq!(client.calls(), 3);
        assert!(matches!(err, GeminiError::Api { status: 503, .. }));
    }

    #[tokio::test]
    async fn identical_turn_is_served_from_cache() {
        let client = ScriptedClient::new(vec![Ok("Hello!".to_string())]);
        let gateway = gateway(client.clone());
        let history = vec![user_message("m1", "hi")];

        let first = gateway
            .generate(&history, "hi", None, None, false)
            .await
            .unwrap();
        let second = gateway
            .generate(&history, "hi", None, None, false)
            .await
            .unwrap();

        assert_eq!(client.calls(), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn changed_context_misses_the_cache() {
        let client = ScriptedClient::new(vec![Ok("a".to_string()), Ok("b".to_string())]);
        let gateway = gateway(client.clone());

        gateway.generate(&[], "hi", None, None, false).await.unwrap();
        gateway.generate(&[], "hi", None, None, true).await.unwrap();

        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn reset_clears_cached_turns() {
        let client = ScriptedClient::new(vec![Ok("a".to_string()), Ok("b".to_string())]);
        let gateway = gateway(client.clone());

        gateway.generate(&[], "hi", None, None, false).await.unwrap();
        gateway.reset();
        gateway.generate(&[], "hi", None, None, false).await.unwrap();

        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn image_turns_bypass_the_cache_and_use_the_vision_model() {
        let client = ScriptedClient::new(vec![Ok("a".to_string()), Ok("b".to_string())]);
        let gateway = gateway(client.clone());
        let image = Bytes::from_static(b"jpeg");

        gateway
            .generate(&[], "what is this?", None, Some(image.clone()), false)
            .await
            .unwrap();
        gateway
            .generate(&[], "what is this?", None, Some(image), false)
            .await
            .unwrap();

        assert_eq!(client.calls(), 2);
        let request = client.last_request.lock().clone().unwrap();
        assert_eq!(request.model, VISION_MODEL);
    }

    #[tokio::test]
    async fn text_turns_use_the_text_model() {
        let client = ScriptedClient::new(vec![Ok("a".to_string())]);
        let gateway = gateway(client.clone());

        gateway.generate(&[], "hi", None, None, false).await.unwrap();

        let request = client.last_request.lock().clone().unwrap();
        assert_eq!(request.model, TEXT_MODEL);
    }

    #[tokio::test]
    async fn recipe_payload_is_extracted_and_fence_stripped() {
        let raw = "Try this one!\n```json\n{\"type\":\"recipe\",\"title\":\"Masala Oats\",\"steps\":[{\"instruction\":\"Boil\"}]}\n```";
        let client = ScriptedClient::new(vec![Ok(raw.to_string())]);
        let gateway = gateway(client);

        let result = gateway.generate(&[], "dinner?", None, None, false).await.unwrap();

        assert_eq!(result.text, "Try this one!");
        assert_eq!(result.recipe.as_ref().unwrap().title, "Masala Oats");
        assert_eq!(result.meal_plan, None);
    }

    #[test]
    fn payload_only_response_gets_a_generic_acknowledgement() {
        let raw = "```json\n{\"type\":\"meal_plan\",\"days\":[]}\n```";
        let result = assemble_result(raw);

        assert_eq!(result.text, PAYLOAD_ONLY_ACK);
        assert!(result.meal_plan.is_some());
    }

    #[test]
    fn prose_only_response_passes_through() {
        let result = assemble_result("Just a friendly chat reply.");
        assert_eq!(result.text, "Just a friendly chat reply.");
        assert_eq!(result.recipe, None);
        assert_eq!(result.meal_plan, None);
    }

    #[test]
    fn empty_model_text_substitutes_the_default_line() {
        let result = assemble_result("");
        assert_eq!(result.text, EMPTY_RESPONSE_TEXT);
    }

    #[test]
    fn unparseable_fenced_block_falls_back_to_raw_text() {
        let raw = "```json\n{broken\n```";
        let result = assemble_result(raw);

        assert_eq!(result.recipe, None);
        assert_eq!(result.meal_plan, None);
        assert_eq!(result.text, raw); // last resort: show what we got
    }

    #[test]
    fn backoff_delays_double_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }
}
