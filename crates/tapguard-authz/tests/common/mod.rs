//! Fakes shared by the authorization integration tests

#![allow(dead_code)]

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use tapguard_authz::{
    AuthorizationBundle, AuthzError, IdentityServer, PolicyServer, PrivilegedAction,
    PromptInput, PromptRequest, VerificationPrompt, VerificationState,
};
use tapguard_core::{RemoteError, TargetAction, VerifyToken};

pub const PASSWORD: &str = "correct horse";
pub const CODE: &str = "424242";
pub const EMAIL: &str = "owner@example.com";

/// Identity server with one valid password and one valid code
#[derive(Default)]
pub struct FakeIdentity {
    pub challenges: Mutex<Vec<TargetAction>>,
    pub password_checks: Mutex<Vec<String>>,
    pub code_checks: Mutex<Vec<String>>,
    /// Results for challenge requests, in order; success once empty
    pub challenge_failures: Mutex<VecDeque<Option<String>>>,
    /// Message returned for a wrong password or code
    pub rejection: String,
}

impl FakeIdentity {
    pub fn new() -> Self {
        Self {
            rejection: "Incorrect password".to_string(),
            ..Self::default()
        }
    }

    pub fn failing_challenges(failures: impl IntoIterator<Item = Option<&'static str>>) -> Self {
        let identity = Self::new();
        *identity.challenge_failures.lock() = failures
            .into_iter()
            .map(|f| f.map(str::to_string))
            .collect();
        identity
    }

    pub fn challenge_count(&self) -> usize {
        self.challenges.lock().len()
    }

    pub fn network_calls(&self) -> usize {
        self.challenge_count() + self.password_checks.lock().len() + self.code_checks.lock().len()
    }
}

pub fn token_for(target: TargetAction) -> VerifyToken {
    VerifyToken::new(format!("verify-{}", target))
}

#[async_trait]
impl IdentityServer for FakeIdentity {
    async fn request_federated_challenge(&self, target: TargetAction) -> Result<(), RemoteError> {
        self.challenges.lock().push(target);
        match self.challenge_failures.lock().pop_front() {
            Some(Some(message)) => Err(RemoteError::new(message)),
            _ => Ok(()),
        }
    }

    async fn verify_federated_code(
        &self,
        target: TargetAction,
        code: &str,
    ) -> Result<VerifyToken, RemoteError> {
        self.code_checks.lock().push(code.to_string());
        if code == CODE {
            Ok(token_for(target))
        } else {
            Err(RemoteError::new(self.rejection.clone()))
        }
    }

    async fn verify_password(
        &self,
        target: TargetAction,
        password: &str,
    ) -> Result<VerifyToken, RemoteError> {
        self.password_checks.lock().push(password.to_string());
        if password == PASSWORD {
            Ok(token_for(target))
        } else {
            Err(RemoteError::new(self.rejection.clone()))
        }
    }
}

/// One scripted user answer
pub enum Answer {
    Submit(&'static str),
    Resend,
    Cancel,
}

/// Prompt that answers from a script and records what it was asked
#[derive(Default)]
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<Answer>>,
    pub requests: Mutex<Vec<PromptRequest>>,
    pub states: Mutex<Vec<VerificationState>>,
    pub resend_failures: Mutex<Vec<AuthzError>>,
}

impl ScriptedPrompt {
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn password_prompts(&self) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| matches!(r, PromptRequest::Password { .. }))
            .count()
    }

    pub fn code_prompts(&self) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| matches!(r, PromptRequest::ConfirmationCode { .. }))
            .count()
    }
}

#[async_trait]
impl VerificationPrompt for ScriptedPrompt {
    async fn ask(&self, request: PromptRequest) -> PromptInput {
        self.requests.lock().push(request);
        match self.answers.lock().pop_front() {
            Some(Answer::Submit(text)) => PromptInput::submit(text),
            Some(Answer::Resend) => PromptInput::Resend,
            Some(Answer::Cancel) | None => PromptInput::Cancel,
        }
    }

    fn on_state_changed(&self, state: &VerificationState) {
        self.states.lock().push(state.clone());
    }

    fn on_resend_failed(&self, error: &AuthzError) {
        self.resend_failures.lock().push(error.clone());
    }
}

/// Policy server that records every submission
#[derive(Default)]
pub struct RecordingPolicy {
    pub submissions: Mutex<Vec<(PrivilegedAction, Value, Vec<(String, String)>)>>,
    pub reject_with: Option<String>,
}

#[async_trait]
impl PolicyServer for RecordingPolicy {
    async fn submit(
        &self,
        action: PrivilegedAction,
        payload: &Value,
        bundle: &AuthorizationBundle,
    ) -> Result<Value, RemoteError> {
        self.submissions
            .lock()
            .push((action, payload.clone(), bundle.to_headers()));
        match &self.reject_with {
            Some(message) => Err(RemoteError::new(message.clone())),
            None => Ok(json!({ "status": "accepted", "action": action })),
        }
    }
}
