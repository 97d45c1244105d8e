//! Authorization bundle handed to the policy server

use tapguard_core::{AuthorizationToken, SecurityQuestionToken, VerifyToken};

/// Header carrying the step-up token
pub const VERIFY_TOKEN_HEADER: &str = "Verify-token";

/// Header carrying the security-question token
pub const SECURITY_QUESTION_TOKEN_HEADER: &str = "Security-Question-token";

/// Prefix of the numbered per-signer token headers
pub const AUTHORIZATION_HEADER_PREFIX: &str = "AuthorizationX-";

/// Everything the server needs to accept one privileged action
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthorizationBundle {
    /// One token per signer, in signature-set order
    pub tokens: Vec<AuthorizationToken>,
    pub verify_token: Option<VerifyToken>,
    pub security_question_token: Option<SecurityQuestionToken>,
}

impl AuthorizationBundle {
    /// Render as request headers
    ///
    /// Signer headers are numbered from 1. An empty security-question token
    /// is left out.
    pub fn to_headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::with_capacity(self.tokens.len() + 2);

        if let Some(token) = &self.verify_token {
            headers.push((VERIFY_TOKEN_HEADER.to_string(), token.as_str().to_string()));
        }

        if let Some(token) = self.security_question_token.as_ref().filter(|t| !t.is_empty()) {
            headers.push((
                SECURITY_QUESTION_TOKEN_HEADER.to_string(),
                token.as_str().to_string(),
            ));
        }

        for (index, token) in self.tokens.iter().enumerate() {
            headers.push((
                format!("{}{}", AUTHORIZATION_HEADER_PREFIX, index + 1),
                token.as_str().to_string(),
            ));
        }

        headers
    }

    pub fn signer_count(&self) -> usize {
        self.tokens.len()
    }
}
