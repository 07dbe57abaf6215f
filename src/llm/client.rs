use super::error::BackendError;
use super::types::{LLMRequest, LLMResponse};
use async_trait::async_trait;

/// A reasoning service that answers chat requests.
///
/// Implementations need not enforce a deadline; the arbiter wraps every
/// call in its own timeout and treats an elapsed deadline like a transient
/// [`BackendError::TimeoutError`].
#[async_trait]
pub trait LLMClient: Send + Sync {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError>;

    /// Short provider label used in logs.
    fn name(&self) -> &str;

    fn model_info(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;
    use std::sync::Arc;
    use std::time::Duration;

    /// Answers with the last user message.
    struct EchoClient;

    #[async_trait]
    impl LLMClient for EchoClient {
        async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError> {
            let last = request.messages.last().ok_or_else(|| BackendError::Other {
                message: "empty conversation".to_string(),
            })?;
            Ok(LLMResponse::text(last.content.clone(), Duration::from_millis(1)))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_trait_object_dispatch() {
        let client: Arc<dyn LLMClient> = Arc::new(EchoClient);
        assert_eq!(client.name(), "echo");
        assert!(client.model_info().is_none());

        let request = LLMRequest::new(vec![
            ChatMessage::system("Pick the data store"),
            ChatMessage::user("shortlist: postgresql, mysql"),
        ]);
        let response = client.chat(request).await.unwrap();
        assert_eq!(response.content, "shortlist: postgresql, mysql");

        assert!(client.chat(LLMRequest::new(vec![])).await.is_err());
    }
}
