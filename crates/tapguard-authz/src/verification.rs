//! Step-up verification
//!
//! Before a privileged action the user re-affirms their identity, either by
//! re-entering their password or by confirming a code sent through the
//! federated identity provider. The result is a short-lived [`VerifyToken`]
//! bound to one [`TargetAction`].
//!
//! A [`VerificationSession`] is an explicit state machine driven through
//! `submit`, `resend` and `cancel`. Its state is published on a watch
//! channel. [`StepUpGate::verify`] runs a whole session against a
//! [`VerificationPrompt`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use tapguard_core::{TargetAction, VerifyToken};

use crate::error::{AuthzError, Result};
use crate::identity::{Account, AuthMode, IdentityServer};

/// Failure message for a blank password
pub const EMPTY_PASSWORD_MESSAGE: &str = "Password cannot be empty";

/// Where a verification session stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationState {
    Init,
    /// Password prompt shown
    AwaitingPassword,
    /// Password sent to the server
    Verifying,
    /// Challenge requested from the federated provider
    RequestingToken,
    /// Confirmation-code prompt shown for the account's email
    AwaitingCode { email: String },
    /// Code sent to the server
    VerifyingCode,
    Done(VerifyToken),
    Failed(String),
    Cancelled,
}

impl VerificationState {
    /// Done, failed or cancelled
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            VerificationState::Done(_) | VerificationState::Failed(_) | VerificationState::Cancelled
        )
    }

    /// Waiting on the user
    pub fn is_interactive(&self) -> bool {
        matches!(
            self,
            VerificationState::AwaitingPassword | VerificationState::AwaitingCode { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            VerificationState::Init => "init",
            VerificationState::AwaitingPassword => "awaiting password",
            VerificationState::Verifying => "verifying",
            VerificationState::RequestingToken => "requesting token",
            VerificationState::AwaitingCode { .. } => "awaiting code",
            VerificationState::VerifyingCode => "verifying code",
            VerificationState::Done(_) => "done",
            VerificationState::Failed(_) => "failed",
            VerificationState::Cancelled => "cancelled",
        }
    }
}

fn invalid(operation: &'static str, state: &VerificationState) -> AuthzError {
    AuthzError::InvalidState {
        operation,
        state: state.name(),
    }
}

/// One step-up attempt for one target action
///
/// Final states are sticky: every further call fails with
/// [`AuthzError::InvalidState`]. Start a new session to try again.
pub struct VerificationSession {
    identity: Arc<dyn IdentityServer>,
    account: Account,
    target: TargetAction,
    state: watch::Sender<VerificationState>,
}

impl VerificationSession {
    fn new(identity: Arc<dyn IdentityServer>, account: Account, target: TargetAction) -> Self {
        let (state, _) = watch::channel(VerificationState::Init);
        Self {
            identity,
            account,
            target,
            state,
        }
    }

    pub fn target(&self) -> TargetAction {
        self.target
    }

    pub fn mode(&self) -> AuthMode {
        self.account.auth_mode
    }

    /// Current state
    pub fn state(&self) -> VerificationState {
        self.state.borrow().clone()
    }

    /// Observe state changes
    pub fn subscribe(&self) -> watch::Receiver<VerificationState> {
        self.state.subscribe()
    }

    /// Token, once the session is done
    pub fn token(&self) -> Option<VerifyToken> {
        match &*self.state.borrow() {
            VerificationState::Done(token) => Some(token.clone()),
            _ => None,
        }
    }

    fn transition(&self, next: VerificationState) {
        debug!(
            "Verification for {}: {} -> {}",
            self.target,
            self.state.borrow().name(),
            next.name()
        );
        self.state.send_replace(next);
    }

    /// Leave `Init` according to the account's mode
    async fn start(&mut self) {
        match self.account.auth_mode {
            AuthMode::Password => self.transition(VerificationState::AwaitingPassword),
            AuthMode::Federated => {
                self.transition(VerificationState::RequestingToken);
                match self.identity.request_federated_challenge(self.target).await {
                    Ok(()) => self.transition(VerificationState::AwaitingCode {
                        email: self.account.email.clone(),
                    }),
                    Err(e) => self.transition(VerificationState::Failed(e.message_or_unknown())),
                }
            }
        }
    }

    /// Submit the password or confirmation code
    ///
    /// The outcome is also reflected in the session state.
    pub async fn submit(&mut self, input: &str) -> Result<VerifyToken> {
        let outcome = match self.state() {
            VerificationState::AwaitingPassword => {
                if input.trim().is_empty() {
                    Err(EMPTY_PASSWORD_MESSAGE.to_string())
                } else {
                    self.transition(VerificationState::Verifying);
                    self.identity
                        .verify_password(self.target, input)
                        .await
                        .map_err(|e| e.message_or_unknown())
                }
            }
            VerificationState::AwaitingCode { .. } => {
                self.transition(VerificationState::VerifyingCode);
                self.identity
                    .verify_federated_code(self.target, input)
                    .await
                    .map_err(|e| e.message_or_unknown())
            }
            other => return Err(invalid("submit", &other)),
        };

        match outcome {
            Ok(token) => {
                info!("Step-up verification for {} succeeded", self.target);
                self.transition(VerificationState::Done(token.clone()));
                Ok(token)
            }
            Err(message) => {
                self.transition(VerificationState::Failed(message.clone()));
                Err(AuthzError::Verification(message))
            }
        }
    }

    /// Ask the provider to send another confirmation code
    ///
    /// The session stays in `AwaitingCode` whether or not this succeeds.
    pub async fn resend(&mut self) -> Result<()> {
        let current = self.state();
        if !matches!(current, VerificationState::AwaitingCode { .. }) {
            return Err(invalid("resend", &current));
        }

        self.identity
            .request_federated_challenge(self.target)
            .await
            .map_err(|e| {
                let message = e.message_or_unknown();
                warn!("Resending code for {} failed: {}", self.target, message);
                AuthzError::Verification(message)
            })
    }

    /// End the session without a token
    pub fn cancel(&mut self) -> Result<()> {
        let current = self.state();
        if !current.is_interactive() {
            return Err(invalid("cancel", &current));
        }
        self.transition(VerificationState::Cancelled);
        Ok(())
    }
}

impl fmt::Debug for VerificationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationSession")
            .field("target", &self.target)
            .field("mode", &self.account.auth_mode)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

/// What the UI is asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptRequest {
    Password { target: TargetAction },
    ConfirmationCode { target: TargetAction, email: String },
}

/// What the UI answers
pub enum PromptInput {
    Submit(Zeroizing<String>),
    Resend,
    Cancel,
}

impl PromptInput {
    pub fn submit(text: impl Into<String>) -> Self {
        PromptInput::Submit(Zeroizing::new(text.into()))
    }
}

impl fmt::Debug for PromptInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptInput::Submit(_) => f.write_str("Submit(..)"),
            PromptInput::Resend => f.write_str("Resend"),
            PromptInput::Cancel => f.write_str("Cancel"),
        }
    }
}

/// UI side of a verification session
#[async_trait]
pub trait VerificationPrompt: Send + Sync {
    /// Show the prompt and wait for the user's answer
    async fn ask(&self, request: PromptRequest) -> PromptInput;

    fn on_state_changed(&self, _state: &VerificationState) {}

    /// A resend failed; the code prompt stays open
    fn on_resend_failed(&self, _error: &AuthzError) {}
}

/// Issues verification sessions against one identity server
#[derive(Clone)]
pub struct StepUpGate {
    identity: Arc<dyn IdentityServer>,
}

impl StepUpGate {
    pub fn new(identity: Arc<dyn IdentityServer>) -> Self {
        Self { identity }
    }

    /// Start a session; federated accounts request their first code here
    pub async fn begin(&self, account: &Account, target: TargetAction) -> VerificationSession {
        let mut session =
            VerificationSession::new(Arc::clone(&self.identity), account.clone(), target);
        session.start().await;
        session
    }

    /// Run a whole session through `prompt`
    pub async fn verify<P>(
        &self,
        account: &Account,
        target: TargetAction,
        prompt: &P,
    ) -> Result<VerifyToken>
    where
        P: VerificationPrompt + ?Sized,
    {
        let mut session = self.begin(account, target).await;
        let mut last_seen: Option<VerificationState> = None;

        loop {
            let state = session.state();
            if last_seen.as_ref() != Some(&state) {
                prompt.on_state_changed(&state);
                last_seen = Some(state.clone());
            }

            let request = match state {
                VerificationState::AwaitingPassword => PromptRequest::Password { target },
                VerificationState::AwaitingCode { email } => {
                    PromptRequest::ConfirmationCode { target, email }
                }
                VerificationState::Done(token) => return Ok(token),
                VerificationState::Failed(message) => {
                    return Err(AuthzError::Verification(message))
                }
                VerificationState::Cancelled => return Err(AuthzError::Cancelled),
                other => return Err(invalid("prompt", &other)),
            };

            match prompt.ask(request).await {
                PromptInput::Submit(input) => {
                    if let Err(e) = session.submit(&input).await {
                        debug!("Verification for {} ended: {}", target, e);
                    }
                }
                PromptInput::Resend => {
                    if let Err(e) = session.resend().await {
                        prompt.on_resend_failed(&e);
                    }
                }
                PromptInput::Cancel => session.cancel()?,
            }
        }
    }
}
