//! Conversation engine: retrieval followed by grounded generation.

use crate::embeddings::Embedder;
use crate::memory::{ConversationMemory, Turn};
use crate::rag::types::{AskOutcome, SourceRef};
use crate::vector_index::VectorIndex;
use electro_core::config::{GenerationConfig, RetrievalConfig};
use electro_core::{AppConfig, AppError, AppResult};
use electro_llm::{LlmClient, LlmRequest};
use electro_prompt::{
    build_condense_prompt, build_prompt, AnswerInput, CondenseInput, ContextBlock, HistoryEntry,
    PromptDefinition,
};
use std::sync::Arc;
use tracing::instrument;

/// Upper bound on tokens for a condensed question.
const CONDENSE_MAX_TOKENS: u32 = 200;

/// Answers questions against an index using an LLM.
pub struct ConversationEngine {
    llm: Arc<dyn LlmClient>,
    model: String,
    prompt: PromptDefinition,
    retrieval: RetrievalConfig,
    generation: GenerationConfig,
}

impl ConversationEngine {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        prompt: PromptDefinition,
        retrieval: RetrievalConfig,
        generation: GenerationConfig,
    ) -> Self {
        Self {
            llm,
            model: model.into(),
            prompt,
            retrieval,
            generation,
        }
    }

    /// Build the engine described by `config`: LLM client, model and prompt.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let llm = electro_llm::create_client(config)?;
        let prompt = electro_prompt::resolve_prompt(config.prompt_file.as_deref())?;

        Ok(Self::new(
            llm,
            electro_llm::model_name(config),
            prompt,
            config.retrieval.clone(),
            config.generation.clone(),
        ))
    }

    /// Answer `question` from `index`, returning the answer and a copy of
    /// `memory` extended with the exchange.
    ///
    /// `memory` itself is never modified, so a failure leaves the caller's
    /// conversation as it was.
    #[instrument(skip_all, fields(provider = self.llm.provider_name(), k = self.retrieval.k))]
    pub async fn answer(
        &self,
        index: &dyn VectorIndex,
        embedder: &mut Embedder,
        question: &str,
        memory: &ConversationMemory,
    ) -> AppResult<AskOutcome> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::InvalidInput(
                "Please enter a question.".to_string(),
            ));
        }

        let active = embedder.fingerprint();
        if index.fingerprint() != &active {
            return Err(AppError::EmbedderMismatch {
                indexed: index.fingerprint().to_string(),
                active: active.to_string(),
            });
        }

        let history = memory.window(self.retrieval.memory_window);

        let retrieval_question = if self.retrieval.condense_question && !memory.is_empty() {
            self.condense(question, history).await?
        } else {
            question.to_string()
        };

        let query = embedder.embed_query(&retrieval_question).await?;
        let mut hits = index.query(&query, self.retrieval.k)?;
        if let Some(min_score) = self.retrieval.min_score {
            hits.retain(|(_, score)| *score >= min_score);
        }

        tracing::debug!(
            hits = hits.len(),
            top_score = hits.first().map(|(_, s)| *s).unwrap_or(0.0),
            "Retrieved chunks"
        );

        let input = AnswerInput {
            question: question.to_string(),
            context: hits
                .iter()
                .enumerate()
                .map(|(i, (chunk, _))| ContextBlock {
                    label: format!("Document {}", i + 1),
                    document: chunk.document_id.clone(),
                    text: chunk.text.trim().to_string(),
                })
                .collect(),
            history: history_entries(history),
        };
        let built = build_prompt(&self.prompt, &input)?;

        let mut request = LlmRequest::new(built.user, &self.model)
            .with_temperature(self.generation.temperature)
            .with_max_tokens(self.generation.max_tokens);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }

        let response = self.llm.complete(&request).await?;
        let answer = response.content.trim().to_string();

        tracing::info!(
            sources = hits.len(),
            completion_tokens = response.usage.completion_tokens,
            "Answered question"
        );

        let mut memory = memory.clone();
        memory.push_exchange(question, answer.clone());

        Ok(AskOutcome {
            answer,
            sources: hits
                .iter()
                .map(|(chunk, score)| SourceRef::from_hit(chunk, *score))
                .collect(),
            retrieval_question,
            memory,
        })
    }

    /// Rewrite a follow-up question into a standalone one.
    ///
    /// Falls back to the original question when the model returns nothing.
    async fn condense(&self, question: &str, history: &[Turn]) -> AppResult<String> {
        let prompt = build_condense_prompt(
            &self.prompt,
            &CondenseInput {
                question: question.to_string(),
                history: history_entries(history),
            },
        )?;

        let request = LlmRequest::new(prompt, &self.model)
            .with_temperature(0.0)
            .with_max_tokens(CONDENSE_MAX_TOKENS);
        let response = self.llm.complete(&request).await?;

        let condensed = response.content.trim();
        if condensed.is_empty() {
            return Ok(question.to_string());
        }

        tracing::debug!(condensed, "Condensed follow-up question");
        Ok(condensed.to_string())
    }
}

fn history_entries(turns: &[Turn]) -> Vec<HistoryEntry> {
    turns
        .iter()
        .map(|turn| HistoryEntry {
            speaker: turn.role.label().to_string(),
            content: turn.text.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker;
    use crate::embeddings::providers::LocalEmbeddingProvider;
    use crate::memory::Role;
    use crate::vector_index::FlatIndex;
    use electro_core::config::{ChunkingConfig, EmbeddingBatchConfig};
    use electro_core::{FailureKind, RetryPolicy};
    use electro_llm::{LlmResponse, LlmUsage};
    use std::sync::Mutex;

    /// Replies to condense prompts with a fixed rewrite and to answer
    /// prompts by echoing the first context line mentioning a percentage.
    struct ScriptedLlm {
        requests: Mutex<Vec<LlmRequest>>,
        rewrite: String,
        fail: Option<FailureKind>,
    }

    impl ScriptedLlm {
        fn new() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                rewrite: "What is the tolerance of resistor X?".to_string(),
                fail: None,
            }
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedLlm {
        fn provider_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(kind) = self.fail {
                return Err(AppError::LlmInvocation {
                    kind,
                    message: "scripted failure".to_string(),
                });
            }

            let content = if request.prompt.contains("Standalone question:") {
                self.rewrite.clone()
            } else {
                request
                    .prompt
                    .lines()
                    .find(|line| line.contains('%'))
                    .map(|line| format!("According to the datasheet: {}", line.trim()))
                    .unwrap_or_else(|| "I could not find it in the provided datasheets.".to_string())
            };

            Ok(LlmResponse {
                content,
                model: request.model.clone(),
                usage: LlmUsage::new(10, 5),
            })
        }
    }

    fn engine(llm: Arc<ScriptedLlm>) -> ConversationEngine {
        ConversationEngine::new(
            llm,
            "scripted-model",
            electro_prompt::default_prompt().unwrap(),
            RetrievalConfig::default(),
            GenerationConfig::default(),
        )
    }

    fn local_embedder() -> Embedder {
        Embedder::new(
            Arc::new(LocalEmbeddingProvider::new(384)),
            EmbeddingBatchConfig::default(),
            RetryPolicy::default(),
        )
    }

    async fn resistor_index(embedder: &mut Embedder) -> FlatIndex {
        let docs = [
            ("resistor-x.pdf", "Resistor X rated 10kΩ, tolerance 5%."),
            ("regulator.pdf", "The LM7805 regulator outputs a fixed 5V at up to 1.5A."),
            ("capacitor.pdf", "Capacitor Y is an electrolytic part for 16V rails."),
        ];
        let chunks: Vec<_> = docs
            .iter()
            .flat_map(|(id, text)| chunker::split(id, text, &ChunkingConfig::default()))
            .collect();
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_passages(&texts).await.unwrap();

        FlatIndex::build(embedder.fingerprint(), vectors.into_iter().zip(chunks).collect()).unwrap()
    }

    #[tokio::test]
    async fn test_resistor_question_retrieves_and_answers() {
        let llm = Arc::new(ScriptedLlm::new());
        let engine = engine(llm.clone());
        let mut embedder = local_embedder();
        let index = resistor_index(&mut embedder).await;
        let memory = ConversationMemory::new();

        let outcome = engine
            .answer(&index, &mut embedder, "What is the tolerance of resistor X?", &memory)
            .await
            .unwrap();

        assert_eq!(outcome.sources[0].document, "resistor-x.pdf");
        assert!(outcome.answer.contains("5%"));
        assert_eq!(outcome.memory.len(), 2);
        assert_eq!(outcome.memory.turns()[0].role, Role::User);
        assert!(memory.is_empty());

        // No history, so no condense call.
        let requests = llm.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].system.is_some());
        assert!(requests[0].prompt.contains("[Document 1] (resistor-x.pdf)"));
    }

    #[tokio::test]
    async fn test_follow_up_is_condensed_for_retrieval() {
        let llm = Arc::new(ScriptedLlm::new());
        let engine = engine(llm.clone());
        let mut embedder = local_embedder();
        let index = resistor_index(&mut embedder).await;

        let mut memory = ConversationMemory::new();
        memory.push_exchange("Tell me about resistor X", "It is rated 10kΩ.");

        let outcome = engine
            .answer(&index, &mut embedder, "and its tolerance?", &memory)
            .await
            .unwrap();

        assert_eq!(outcome.retrieval_question, "What is the tolerance of resistor X?");
        assert_eq!(outcome.sources[0].document, "resistor-x.pdf");
        assert_eq!(outcome.memory.len(), 4);
        assert_eq!(outcome.memory.turns()[2].text, "and its tolerance?");

        let requests = llm.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].prompt.contains("Follow Up Input: and its tolerance?"));
        assert!(requests[1].prompt.contains("User: Tell me about resistor X"));
        assert!(requests[1].prompt.ends_with("Question: and its tolerance?"));
    }

    fn five_exchanges() -> ConversationMemory {
        let mut memory = ConversationMemory::new();
        for i in 0..5 {
            memory.push_exchange(format!("ask-{i} about resistor X"), format!("reply-{i}"));
        }
        memory
    }

    #[tokio::test]
    async fn test_turns_outside_memory_window_are_left_out() {
        let llm = Arc::new(ScriptedLlm::new());
        let mut engine = engine(llm.clone());
        engine.retrieval.memory_window = 6;
        let mut embedder = local_embedder();
        let index = resistor_index(&mut embedder).await;

        engine
            .answer(&index, &mut embedder, "and its tolerance?", &five_exchanges())
            .await
            .unwrap();

        let requests = llm.requests.lock().unwrap();
        let prompt = &requests[1].prompt;
        assert!(!prompt.contains("ask-0"));
        assert!(!prompt.contains("reply-1"));
        assert!(prompt.contains("User: ask-2 about resistor X"));
        assert!(prompt.contains("Assistant: reply-4"));
        assert!(!requests[0].prompt.contains("ask-1"));
    }

    #[tokio::test]
    async fn test_odd_memory_window_keeps_whole_exchanges() {
        let llm = Arc::new(ScriptedLlm::new());
        let mut engine = engine(llm.clone());
        engine.retrieval.memory_window = 3;
        let mut embedder = local_embedder();
        let index = resistor_index(&mut embedder).await;

        engine
            .answer(&index, &mut embedder, "and its tolerance?", &five_exchanges())
            .await
            .unwrap();

        let requests = llm.requests.lock().unwrap();
        let prompt = &requests[1].prompt;
        assert!(!prompt.contains("reply-3"));
        assert!(prompt.contains("User: ask-4 about resistor X"));
        assert!(prompt.contains("Assistant: reply-4"));
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let llm = Arc::new(ScriptedLlm::new());
        let engine = engine(llm.clone());
        let mut embedder = local_embedder();
        let index = resistor_index(&mut embedder).await;

        let err = engine
            .answer(&index, &mut embedder, "   ", &ConversationMemory::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(llm.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_llm_failure_leaves_memory_untouched() {
        let llm = Arc::new(ScriptedLlm {
            fail: Some(FailureKind::Permanent),
            ..ScriptedLlm::new()
        });
        let engine = engine(llm);
        let mut embedder = local_embedder();
        let index = resistor_index(&mut embedder).await;
        let memory = ConversationMemory::new();

        let err = engine
            .answer(&index, &mut embedder, "What is the tolerance?", &memory)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::LlmInvocation { .. }));
        assert!(memory.is_empty());
    }

    #[tokio::test]
    async fn test_min_score_drops_weak_chunks() {
        let llm = Arc::new(ScriptedLlm::new());
        let mut engine = engine(llm);
        engine.retrieval.min_score = Some(0.99);
        let mut embedder = local_embedder();
        let index = resistor_index(&mut embedder).await;

        let outcome = engine
            .answer(&index, &mut embedder, "What is the tolerance of resistor X?", &ConversationMemory::new())
            .await
            .unwrap();

        assert!(outcome.sources.is_empty());
        assert!(outcome.answer.contains("could not find"));
    }

    #[tokio::test]
    async fn test_same_question_same_retrieval() {
        let llm = Arc::new(ScriptedLlm::new());
        let engine = engine(llm);
        let mut embedder = local_embedder();
        let index = resistor_index(&mut embedder).await;
        let memory = ConversationMemory::new();

        let first = engine
            .answer(&index, &mut embedder, "Which regulator outputs 5V?", &memory)
            .await
            .unwrap();
        let second = engine
            .answer(&index, &mut embedder, "Which regulator outputs 5V?", &memory)
            .await
            .unwrap();

        assert_eq!(first.sources, second.sources);
    }
}
