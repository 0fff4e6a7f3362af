//! Interactive input gate for templates containing `${input}`.

use async_trait::async_trait;
use ebus_core::{CommandTemplate, SessionConfig};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::infrastructure::network::session::cancelled;

/// Prompt shown when asking for the `${input}` value.
pub const INPUT_PROMPT: &str = "Value for ${input}";

/// Supplies free-text input on request.
///
/// `None` means the user dismissed the request.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InputProvider: Send + Sync {
    /// Asks for one value, showing `prompt`.
    async fn request_input(&self, prompt: &str) -> Option<String>;
}

/// Result of passing through the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Format every line with this input value.
    Proceed(String),
    /// The user gave no value; nothing is sent.
    Dismissed,
    /// The cancellation token fired while waiting.
    Cancelled,
}

/// Decides the `${input}` value for one batch.
///
/// The provider is consulted only when `template` uses `${input}` and
/// `config.interactive` is set; otherwise the pre-supplied input (or the empty
/// string) is used.
pub async fn resolve_input(
    template: &CommandTemplate<'_>,
    config: &SessionConfig,
    provider: Option<&dyn InputProvider>,
    cancel: Option<&CancellationToken>,
) -> GateDecision {
    let preset = config.input.clone().unwrap_or_default();
    if !config.interactive || !template.needs_input() {
        return GateDecision::Proceed(preset);
    }
    let Some(provider) = provider else {
        warn!("interactive input requested but no input provider is available");
        return GateDecision::Dismissed;
    };

    tokio::select! {
        biased;
        _ = cancelled(cancel) => GateDecision::Cancelled,
        value = provider.request_input(INPUT_PROMPT) => match value {
            Some(value) => GateDecision::Proceed(value),
            None => {
                debug!("input request dismissed");
                GateDecision::Dismissed
            }
        },
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use ebus_core::Mode;

    fn interactive() -> SessionConfig {
        SessionConfig {
            interactive: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_non_interactive_uses_preset_input() {
        // Arrange
        let mut provider = MockInputProvider::new();
        provider.expect_request_input().never();
        let config = SessionConfig {
            input: Some("preset".into()),
            ..Default::default()
        };
        let mode = Mode::Query;

        // Act
        let decision =
            resolve_input(&CommandTemplate::for_mode(&mode), &config, Some(&provider), None).await;

        // Assert
        assert_eq!(decision, GateDecision::Proceed("preset".into()));
    }

    #[tokio::test]
    async fn test_template_without_input_skips_prompt() {
        let mut provider = MockInputProvider::new();
        provider.expect_request_input().never();
        let mode = Mode::Upload;

        let decision = resolve_input(
            &CommandTemplate::for_mode(&mode),
            &interactive(),
            Some(&provider),
            None,
        )
        .await;

        assert_eq!(decision, GateDecision::Proceed(String::new()));
    }

    #[tokio::test]
    async fn test_interactive_value_is_used_even_when_empty() {
        let mut provider = MockInputProvider::new();
        provider
            .expect_request_input()
            .withf(|prompt| prompt.contains("${input}"))
            .times(1)
            .returning(|_| Some(String::new()));
        let mode = Mode::Query;

        let decision = resolve_input(
            &CommandTemplate::for_mode(&mode),
            &interactive(),
            Some(&provider),
            None,
        )
        .await;

        assert_eq!(decision, GateDecision::Proceed(String::new()));
    }

    #[tokio::test]
    async fn test_dismissed_prompt() {
        let mut provider = MockInputProvider::new();
        provider.expect_request_input().times(1).returning(|_| None);
        let mode = Mode::CustomFormat("read ${input} ${line}".into());

        let decision = resolve_input(
            &CommandTemplate::for_mode(&mode),
            &interactive(),
            Some(&provider),
            None,
        )
        .await;

        assert_eq!(decision, GateDecision::Dismissed);
    }

    #[tokio::test]
    async fn test_missing_provider_counts_as_dismissed() {
        let mode = Mode::Query;
        let decision =
            resolve_input(&CommandTemplate::for_mode(&mode), &interactive(), None, None).await;
        assert_eq!(decision, GateDecision::Dismissed);
    }

    struct NeverAnswers;

    #[async_trait]
    impl InputProvider for NeverAnswers {
        async fn request_input(&self, _prompt: &str) -> Option<String> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_for_input() {
        let token = CancellationToken::new();
        token.cancel();
        let mode = Mode::Query;

        let decision = resolve_input(
            &CommandTemplate::for_mode(&mode),
            &interactive(),
            Some(&NeverAnswers),
            Some(&token),
        )
        .await;

        assert_eq!(decision, GateDecision::Cancelled);
    }
}
