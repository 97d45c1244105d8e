//! Target actions a step-up verification token can be bound to

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Privileged operation a verification token is issued for
///
/// The server binds every token to exactly one of these, so a token obtained
/// for one action cannot be replayed against another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetAction {
    EmergencyLockdown,
    DownloadKeyBackup,
    UpdateSecurityQuestions,
    UpdateInheritancePlan,
    UpdateServerKey,
    DeleteWallet,
    ProtectWallet,
    EditGroupMembers,
    ClaimKey,
    ChangeEmail,
    RegisterBiometricPublicKey,
}

impl TargetAction {
    /// All known target actions
    pub const ALL: [TargetAction; 11] = [
        TargetAction::EmergencyLockdown,
        TargetAction::DownloadKeyBackup,
        TargetAction::UpdateSecurityQuestions,
        TargetAction::UpdateInheritancePlan,
        TargetAction::UpdateServerKey,
        TargetAction::DeleteWallet,
        TargetAction::ProtectWallet,
        TargetAction::EditGroupMembers,
        TargetAction::ClaimKey,
        TargetAction::ChangeEmail,
        TargetAction::RegisterBiometricPublicKey,
    ];

    /// Wire name sent to the identity server
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetAction::EmergencyLockdown => "EMERGENCY_LOCKDOWN",
            TargetAction::DownloadKeyBackup => "DOWNLOAD_KEY_BACKUP",
            TargetAction::UpdateSecurityQuestions => "UPDATE_SECURITY_QUESTIONS",
            TargetAction::UpdateInheritancePlan => "UPDATE_INHERITANCE_PLAN",
            TargetAction::UpdateServerKey => "UPDATE_SERVER_KEY",
            TargetAction::DeleteWallet => "DELETE_WALLET",
            TargetAction::ProtectWallet => "PROTECT_WALLET",
            TargetAction::EditGroupMembers => "EDIT_GROUP_MEMBERS",
            TargetAction::ClaimKey => "CLAIM_KEY",
            TargetAction::ChangeEmail => "CHANGE_EMAIL",
            TargetAction::RegisterBiometricPublicKey => "REGISTER_BIOMETRIC_PUBLIC_KEY",
        }
    }
}

impl fmt::Display for TargetAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetAction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TargetAction::ALL
            .iter()
            .copied()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| CoreError::UnknownTargetAction(s.to_string()))
    }
}
