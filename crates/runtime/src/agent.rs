//! The conversation driver.

use std::sync::Arc;

use mcp::Connector;
use tracing::{Instrument, debug, info_span, warn};

use crate::model::{Backend, Message, ModelGateway, ModelTurn};
use crate::session::ToolSession;
use crate::{Error, Result};

/// Tool-call rounds allowed in one turn unless configured otherwise.
pub const DEFAULT_MAX_ROUNDS: usize = 10;

/// Alternates between model queries and tool dispatch until the model
/// answers.
pub struct Orchestrator<B, C: Connector> {
    gateway: ModelGateway<B>,
    session: Arc<ToolSession<C>>,
    max_rounds: usize,
}

impl<B: Backend, C: Connector> Orchestrator<B, C> {
    pub fn new(gateway: ModelGateway<B>, session: Arc<ToolSession<C>>) -> Self {
        Self {
            gateway,
            session,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn gateway(&self) -> &ModelGateway<B> {
        &self.gateway
    }

    pub fn session(&self) -> &Arc<ToolSession<C>> {
        &self.session
    }

    /// Run one turn: append the user's text, then query and dispatch until
    /// the model gives a final answer, which is returned.
    ///
    /// Tool-level errors are recorded in `history` and the loop continues.
    /// Every other failure ends the turn with the history holding whatever
    /// complete messages were appended before it.
    pub async fn run_turn(&self, history: &mut Vec<Message>, user_text: &str) -> Result<String> {
        let span = info_span!("turn", prior_messages = history.len());
        self.drive(history, user_text).instrument(span).await
    }

    async fn drive(&self, history: &mut Vec<Message>, user_text: &str) -> Result<String> {
        history.push(Message::user(user_text));
        let mut rounds = 0;

        loop {
            let catalog = self.session.connect().await?;

            let (commentary, requests) = match self.gateway.query(history, &catalog).await? {
                ModelTurn::FinalAnswer { text } => {
                    history.push(Message::assistant(text.clone()));
                    return Ok(text);
                }
                ModelTurn::ToolCalls { requests, .. } if requests.is_empty() => {
                    history.push(Message::assistant(""));
                    return Ok(String::new());
                }
                ModelTurn::ToolCalls {
                    commentary,
                    requests,
                } => (commentary, requests),
            };

            if rounds == self.max_rounds {
                warn!(rounds, "model still requesting tools at the round limit");
                return Err(Error::TurnLimitExceeded { rounds });
            }
            rounds += 1;
            debug!(round = rounds, calls = requests.len(), "model requested tools");

            history.push(Message::tool_call_record(
                commentary.unwrap_or_default(),
                requests.clone(),
            ));

            for request in &requests {
                let result = self.session.dispatch(request).await?;
                history.push(Message::tool_result(&result));
            }
        }
    }
}

/// Settings for an [`Agent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentConfig {
    pub max_rounds: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }
}

/// A conversation: an orchestrator plus the history it owns.
///
/// `submit` takes `&mut self`, so turns on one agent cannot overlap.
pub struct Agent<B, C: Connector> {
    orchestrator: Orchestrator<B, C>,
    history: Vec<Message>,
}

impl<B: Backend, C: Connector> Agent<B, C> {
    /// Start a conversation. The session connects on the first turn.
    pub fn start(
        gateway: ModelGateway<B>,
        session: Arc<ToolSession<C>>,
        config: AgentConfig,
    ) -> Self {
        Self {
            orchestrator: Orchestrator::new(gateway, session).with_max_rounds(config.max_rounds),
            history: Vec::new(),
        }
    }

    /// Run one turn and return the model's final answer.
    pub async fn submit(&mut self, text: &str) -> Result<String> {
        self.orchestrator.run_turn(&mut self.history, text).await
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Forget the conversation. The session stays connected.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn session(&self) -> &Arc<ToolSession<C>> {
        self.orchestrator.session()
    }

    /// End the conversation and disconnect the session.
    pub async fn shutdown(self) -> Vec<Message> {
        self.orchestrator.session().disconnect().await;
        self.history
    }
}
