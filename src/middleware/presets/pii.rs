//! PII redaction

use async_trait::async_trait;
use regex::Regex;

use crate::error::LlmError;
use crate::middleware::{Middleware, MiddlewareContext};
use crate::types::{ChatResponse, ContentPart, MessageContent};

lazy_static::lazy_static! {
    // Longer digit patterns first so a card number is not half-masked as a phone.
    static ref PII_PATTERNS: Vec<(Regex, &'static str)> = [
        (r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}", "[EMAIL]"),
        (r"\b\d{3}-\d{2}-\d{4}\b", "[SSN]"),
        (r"\b(?:\d[ -]?){12,15}\d\b", "[CARD]"),
        (r"(?:\+\d{1,3}[\s.-]?)?\(?\b\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4}\b", "[PHONE]"),
    ]
    .into_iter()
    .filter_map(|(pattern, label)| Regex::new(pattern).ok().map(|re| (re, label)))
    .collect();
}

/// Replace e-mail addresses, SSNs, card numbers and phone numbers with
/// placeholders.
pub fn mask_pii(text: &str) -> String {
    let mut masked = text.to_string();
    for (pattern, label) in PII_PATTERNS.iter() {
        if pattern.is_match(&masked) {
            masked = pattern.replace_all(&masked, *label).into_owned();
        }
    }
    masked
}

fn mask_content(content: &mut MessageContent) {
    match content {
        MessageContent::Text(text) => *text = mask_pii(text),
        MessageContent::MultiModal(parts) => {
            for part in parts.iter_mut() {
                if let ContentPart::Text { text } = part {
                    *text = mask_pii(text);
                }
            }
        }
    }
}

/// Masks PII in outgoing messages and in response content.
#[derive(Debug, Clone, Copy, Default)]
pub struct PiiMaskingMiddleware {
    mask_responses: bool,
}

impl PiiMaskingMiddleware {
    pub const fn new() -> Self {
        Self {
            mask_responses: true,
        }
    }

    /// Only redact outgoing messages.
    pub const fn requests_only() -> Self {
        Self {
            mask_responses: false,
        }
    }
}

#[async_trait]
impl Middleware for PiiMaskingMiddleware {
    fn name(&self) -> &str {
        "pii-masking"
    }

    async fn on_request(&self, ctx: &mut MiddlewareContext) -> Result<(), LlmError> {
        for message in ctx.messages.iter_mut() {
            mask_content(&mut message.content);
        }
        Ok(())
    }

    async fn on_response(
        &self,
        _ctx: &MiddlewareContext,
        mut response: ChatResponse,
    ) -> Result<ChatResponse, LlmError> {
        if self.mask_responses {
            response.content = mask_pii(&response.content);
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;

    #[test]
    fn masks_common_identifiers() {
        assert_eq!(
            mask_pii("mail jane.doe@example.com now"),
            "mail [EMAIL] now"
        );
        assert_eq!(mask_pii("ssn 123-45-6789"), "ssn [SSN]");
        assert_eq!(mask_pii("card 4111 1111 1111 1111"), "card [CARD]");
        assert_eq!(mask_pii("call 555-123-4567 today"), "call [PHONE] today");
        assert_eq!(mask_pii("nothing to hide"), "nothing to hide");
    }

    #[tokio::test]
    async fn masks_outgoing_copies_and_response() {
        let mw = PiiMaskingMiddleware::new();
        let mut ctx = MiddlewareContext::new(
            "r",
            "mock",
            "m",
            vec![ChatMessage::user("I am bob@example.org").build()],
        );
        mw.on_request(&mut ctx).await.unwrap();
        assert_eq!(ctx.messages[0].content_text(), Some("I am [EMAIL]"));

        let out = mw
            .on_response(&ctx, ChatResponse::new("reach me at 555.123.4567"))
            .await
            .unwrap();
        assert_eq!(out.content, "reach me at [PHONE]");
    }

    #[tokio::test]
    async fn requests_only_leaves_response_alone() {
        let mw = PiiMaskingMiddleware::requests_only();
        let ctx = MiddlewareContext::new("r", "mock", "m", vec![]);
        let out = mw
            .on_response(&ctx, ChatResponse::new("bob@example.org"))
            .await
            .unwrap();
        assert_eq!(out.content, "bob@example.org");
    }
}
