//! Answer generation: turns a question plus retrieved context into a
//! grounded response from the configured chat model.
//!
//! The [`AnswerClient`] trait keeps the model call swappable, so batch
//! evaluation can run offline against a canned generator.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{AnswerConfig, Config};
use crate::context::format_context;
use crate::embedder::create_client;
use crate::index::VectorIndex;
use crate::metadata::Mission;
use crate::search;

/// Domain framing for the chat model. The missions named here are the ones
/// the corpus actually covers.
pub const SYSTEM_PROMPT: &str = r#"You are a NASA mission expert and historian with deep knowledge of space exploration,
particularly the Apollo program and Space Shuttle missions. You have extensive expertise in:

- Apollo 11: The first Moon landing mission (July 1969)
- Apollo 13: The famous "successful failure" mission with the oxygen tank explosion (April 1970)
- Space Shuttle Challenger: The tragic disaster during launch (January 1986)

When answering questions:
1. Base your responses primarily on the provided context from NASA documents
2. Cite specific sources when available (e.g., "According to the technical transcript...")
3. If the context doesn't contain enough information, acknowledge this clearly
4. Provide accurate technical details while making them accessible
5. When discussing tragedies, maintain a respectful and factual tone
6. If you're unsure about something, say so rather than making up information

You have access to mission transcripts, technical documents, and official NASA records.
Always prioritize accuracy and cite your sources from the provided context."#;

/// One turn in a chat exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// A chat-completion backend.
#[async_trait]
pub trait AnswerClient: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Chat client for the OpenAI chat-completions API.
pub struct OpenAiChat {
    model: String,
    temperature: f32,
    max_tokens: u32,
    api_base: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiChat {
    pub fn new(config: &AnswerConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[async_trait]
impl AnswerClient for OpenAiChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Chat API error {}: {}", status, body_text);
        }

        let parsed: ChatResponse = response.json().await?;
        match parsed.choices.into_iter().next() {
            Some(choice) => Ok(choice.message.content),
            None => bail!("Chat response contained no choices"),
        }
    }
}

/// Assemble the message list: system prompt, the trailing window of
/// conversation history, then the context-wrapped question.
pub fn build_messages(
    question: &str,
    context: &str,
    history: &[ChatMessage],
    history_limit: usize,
) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage {
        role: "system".to_string(),
        content: SYSTEM_PROMPT.to_string(),
    }];

    let start = history.len().saturating_sub(history_limit);
    messages.extend(history[start..].iter().cloned());

    let content = if context.is_empty() {
        format!(
            "Question: {}\n\n\
             Note: No specific NASA documents were retrieved for this query. \
             Please answer based on your general knowledge, but clearly indicate \
             when you're not referencing specific mission documents.",
            question
        )
    } else {
        format!(
            "Based on the following NASA mission documents, please answer my question.\n\n\
             {}\n\n\
             Question: {}\n\n\
             Please provide a detailed answer based on the context above. If the \
             context doesn't contain relevant information, say so clearly.",
            context, question
        )
    };
    messages.push(ChatMessage::user(content));

    messages
}

/// Generate one answer for a question with pre-assembled context.
pub async fn answer_question(
    client: &dyn AnswerClient,
    config: &AnswerConfig,
    question: &str,
    context: &str,
    history: &[ChatMessage],
) -> Result<String> {
    let messages = build_messages(question, context, history, config.history_limit);
    client.complete(&messages).await
}

/// CLI entry point for `apg ask`.
pub async fn run_ask(
    config: &Config,
    question: &str,
    mission_raw: Option<&str>,
    no_context: bool,
    show_context: bool,
) -> Result<()> {
    let mission = mission_raw.and_then(Mission::parse_filter);

    let context = if no_context {
        String::new()
    } else {
        let index = VectorIndex::open(config).await?;
        let embed_client = create_client(&config.embedding)?;
        let results = search::retrieve(
            &index,
            embed_client.as_ref(),
            question,
            mission,
            config.retrieval.top_k,
        )
        .await?;
        index.close().await;
        format_context(&results, config.retrieval.max_context_chars)
    };

    if show_context && !context.is_empty() {
        println!("{}", context);
        println!();
    }

    let chat = OpenAiChat::new(&config.answer)?;
    let answer = answer_question(&chat, &config.answer, question, &context, &[]).await?;
    println!("{}", answer);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_start_with_system_and_end_with_question() {
        let messages = build_messages("What happened to Apollo 13?", "", &[], 20);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("Apollo 13"));
        assert_eq!(messages[1].role, "user");
        assert!(messages[1].content.contains("What happened to Apollo 13?"));
    }

    #[test]
    fn test_context_selects_grounded_template() {
        let with = build_messages("q", "=== DOCS ===", &[], 20);
        assert!(with[1].content.contains("Based on the following NASA mission documents"));
        assert!(with[1].content.contains("=== DOCS ==="));

        let without = build_messages("q", "", &[], 20);
        assert!(without[1]
            .content
            .contains("No specific NASA documents were retrieved"));
    }

    #[test]
    fn test_history_keeps_only_trailing_window() {
        let history: Vec<ChatMessage> = (0..25)
            .map(|i| {
                if i % 2 == 0 {
                    ChatMessage::user(format!("q{}", i))
                } else {
                    ChatMessage::assistant(format!("a{}", i))
                }
            })
            .collect();

        let messages = build_messages("latest", "", &history, 20);
        // system + 20 history + 1 user
        assert_eq!(messages.len(), 22);
        assert_eq!(messages[1].content, "a5");
        assert_eq!(messages[20].content, "q24");
        assert_eq!(messages[21].content, "latest");
    }
}
