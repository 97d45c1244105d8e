//! # tapguard-authz
//!
//! Authorization for privileged multi-party wallet actions: step-up identity
//! verification, per-signer token derivation, and the bundle the policy
//! server accepts.
//!
//! ```text
//! PrivilegedActionFlow::execute
//!     StepUpGate::verify        (password or federated code)
//!     QuorumAggregator::build   (one token per signer, all or nothing)
//!     PolicyServer::submit      (exactly once)
//! ```

pub mod action;
pub mod aggregator;
pub mod bundle;
pub mod error;
pub mod identity;
pub mod token;
pub mod verification;

pub use action::{PolicyServer, PrivilegedAction, PrivilegedActionFlow, PrivilegedRequest};
pub use aggregator::{QuorumAggregator, SignatureSet};
pub use bundle::{
    AuthorizationBundle, AUTHORIZATION_HEADER_PREFIX, SECURITY_QUESTION_TOKEN_HEADER,
    VERIFY_TOKEN_HEADER,
};
pub use error::{AuthzError, DeriveError, Result};
pub use identity::{Account, AuthMode, IdentityServer};
pub use token::{CompactTokenDeriver, TokenDeriver};
pub use verification::{
    PromptInput, PromptRequest, StepUpGate, VerificationPrompt, VerificationSession,
    VerificationState, EMPTY_PASSWORD_MESSAGE,
};
