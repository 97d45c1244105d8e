//! Privileged wallet actions and the flow that authorizes them

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use tapguard_core::{RemoteError, SecurityQuestionToken, TargetAction};

use crate::aggregator::{QuorumAggregator, SignatureSet};
use crate::bundle::AuthorizationBundle;
use crate::error::{AuthzError, Result};
use crate::identity::Account;
use crate::verification::{StepUpGate, VerificationPrompt};

/// Actions the policy server only accepts with an authorization bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivilegedAction {
    DeleteWallet,
    EmergencyLockdown,
    CreateInheritance,
    UpdateInheritance,
    CancelInheritance,
    RequestInheritancePlanning,
    UpdateSecurityQuestions,
    EditGroupMembers,
    RequestKeyRecovery,
    UpdateServerKey,
    ClaimInheritance,
}

impl PrivilegedAction {
    pub const ALL: [PrivilegedAction; 11] = [
        PrivilegedAction::DeleteWallet,
        PrivilegedAction::EmergencyLockdown,
        PrivilegedAction::CreateInheritance,
        PrivilegedAction::UpdateInheritance,
        PrivilegedAction::CancelInheritance,
        PrivilegedAction::RequestInheritancePlanning,
        PrivilegedAction::UpdateSecurityQuestions,
        PrivilegedAction::EditGroupMembers,
        PrivilegedAction::RequestKeyRecovery,
        PrivilegedAction::UpdateServerKey,
        PrivilegedAction::ClaimInheritance,
    ];

    /// Step-up verification the action needs, if any
    ///
    /// Claiming an inheritance and asking for planning are authorized by
    /// signatures alone.
    pub fn step_up_target(&self) -> Option<TargetAction> {
        match self {
            PrivilegedAction::DeleteWallet => Some(TargetAction::DeleteWallet),
            PrivilegedAction::EmergencyLockdown => Some(TargetAction::EmergencyLockdown),
            PrivilegedAction::CreateInheritance
            | PrivilegedAction::UpdateInheritance
            | PrivilegedAction::CancelInheritance => Some(TargetAction::UpdateInheritancePlan),
            PrivilegedAction::UpdateSecurityQuestions => {
                Some(TargetAction::UpdateSecurityQuestions)
            }
            PrivilegedAction::EditGroupMembers => Some(TargetAction::EditGroupMembers),
            PrivilegedAction::RequestKeyRecovery => Some(TargetAction::DownloadKeyBackup),
            PrivilegedAction::UpdateServerKey => Some(TargetAction::UpdateServerKey),
            PrivilegedAction::RequestInheritancePlanning | PrivilegedAction::ClaimInheritance => {
                None
            }
        }
    }
}

impl fmt::Display for PrivilegedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Server that applies privileged actions
#[async_trait]
pub trait PolicyServer: Send + Sync {
    /// Apply `action`; the reply is passed back untouched
    async fn submit(
        &self,
        action: PrivilegedAction,
        payload: &Value,
        bundle: &AuthorizationBundle,
    ) -> std::result::Result<Value, RemoteError>;
}

/// One privileged action ready to be authorized
#[derive(Debug, Clone)]
pub struct PrivilegedRequest {
    pub action: PrivilegedAction,
    /// Action body sent to the server
    pub payload: Value,
    /// Signatures over the action's challenge message
    pub signatures: SignatureSet,
    pub security_question_token: Option<SecurityQuestionToken>,
}

impl PrivilegedRequest {
    pub fn new(action: PrivilegedAction, payload: Value, signatures: SignatureSet) -> Self {
        Self {
            action,
            payload,
            signatures,
            security_question_token: None,
        }
    }

    pub fn with_security_question_token(mut self, token: SecurityQuestionToken) -> Self {
        self.security_question_token = Some(token);
        self
    }
}

/// Step-up, aggregate, submit once
pub struct PrivilegedActionFlow {
    gate: StepUpGate,
    aggregator: QuorumAggregator,
    policy: Arc<dyn PolicyServer>,
    account: Account,
}

impl PrivilegedActionFlow {
    pub fn new(
        gate: StepUpGate,
        aggregator: QuorumAggregator,
        policy: Arc<dyn PolicyServer>,
        account: Account,
    ) -> Self {
        Self {
            gate,
            aggregator,
            policy,
            account,
        }
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Authorize and submit `request`
    ///
    /// Nothing reaches the policy server unless step-up (when needed) and
    /// every token derivation succeeded. The server is called at most once.
    pub async fn execute<P>(&self, request: PrivilegedRequest, prompt: &P) -> Result<Value>
    where
        P: VerificationPrompt + ?Sized,
    {
        let verify_token = match request.action.step_up_target() {
            Some(target) => Some(self.gate.verify(&self.account, target, prompt).await?),
            None => None,
        };

        let bundle = self.aggregator.build(
            &request.signatures,
            verify_token,
            request.security_question_token,
        )?;

        info!(
            "Submitting {} with {} signer tokens",
            request.action,
            bundle.signer_count()
        );

        self.policy
            .submit(request.action, &request.payload, &bundle)
            .await
            .map_err(|e| AuthzError::Submission(e.message_or_unknown()))
    }
}
