//! Harness for tapguard end-to-end scenarios
//!
//! Simulated cards backed by the software signer, a simulated NFC tag, and
//! in-memory identity and policy servers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tapguard_authz::{
    AuthorizationBundle, IdentityServer, PolicyServer, PrivilegedAction, PromptInput,
    PromptRequest, VerificationPrompt,
};
use tapguard_card::{
    CardStatus, CardTransport, Cvc, DataRecord, NativeCardApi, NativeError, SatscardStatus,
    TagTransport, TransportError, UnsealedSlot,
};
use tapguard_core::{
    Fingerprint, RemoteError, SignatureEntry, SoftwareSigner, TargetAction, VerifyToken,
};

/// Failed CVC attempts before the simulated card locks
pub const LOCKOUT_AFTER: u32 = 3;

/// Lockout delay the simulated card reports
pub const LOCKOUT_DELAY_SECS: u32 = 15;

const DEFAULT_LOG_FILTER: &str = "tapguard_card=debug,tapguard_authz=debug,tapguard_tests=debug";

/// Install a test-writer subscriber once per process
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// NFC tag in the simulated field
pub struct SimulatedTag {
    tag_id: Vec<u8>,
    connected: bool,
    closes: Arc<AtomicUsize>,
    written: Arc<Mutex<Vec<DataRecord>>>,
}

impl SimulatedTag {
    pub fn new(tag_id: &[u8]) -> Self {
        Self {
            tag_id: tag_id.to_vec(),
            connected: false,
            closes: Arc::new(AtomicUsize::new(0)),
            written: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Counter of close calls, readable after the tag is handed off
    pub fn closes(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }

    pub fn written(&self) -> Arc<Mutex<Vec<DataRecord>>> {
        Arc::clone(&self.written)
    }
}

#[async_trait]
impl CardTransport for SimulatedTag {
    fn tag_id(&self) -> &[u8] {
        &self.tag_id
    }

    fn set_timeout(&mut self, _timeout: Duration) {}

    async fn connect(&mut self) -> Result<(), TransportError> {
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.connected = false;
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>, TransportError> {
        if !self.connected {
            return Err(TransportError::TagLost);
        }
        Ok(command.to_vec())
    }
}

#[async_trait]
impl TagTransport for SimulatedTag {
    async fn write_records(&mut self, records: &[DataRecord]) -> Result<(), TransportError> {
        self.written.lock().extend_from_slice(records);
        Ok(())
    }
}

struct CardState {
    cvc: String,
    failures: u32,
    locked: bool,
    is_setup: bool,
}

/// TapSigner simulation with a software key and a CVC lockout
///
/// After [`LOCKOUT_AFTER`] wrong codes the card answers `RATE_LIMIT` once
/// and then `BAD_AUTH` to every attempt until it is waited out.
pub struct SoftwareCard {
    signer: SoftwareSigner,
    state: Mutex<CardState>,
    waits: AtomicUsize,
}

impl SoftwareCard {
    pub fn new(cvc: &str) -> Self {
        Self {
            signer: SoftwareSigner::random(),
            state: Mutex::new(CardState {
                cvc: cvc.to_string(),
                failures: 0,
                locked: false,
                is_setup: true,
            }),
            waits: AtomicUsize::new(0),
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.signer.fingerprint()
    }

    pub fn public_key(&self) -> [u8; 33] {
        self.signer.public_key()
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock().locked
    }

    pub fn waits(&self) -> usize {
        self.waits.load(Ordering::SeqCst)
    }

    fn authenticate(&self, cvc: &Cvc) -> Result<(), NativeError> {
        let mut state = self.state.lock();
        if state.locked {
            return Err(NativeError(
                "TapProtocolException: BAD_AUTH (auth delay active)".to_string(),
            ));
        }
        if cvc.as_str() != state.cvc {
            state.failures += 1;
            if state.failures >= LOCKOUT_AFTER {
                state.locked = true;
                debug!(failures = state.failures, "Simulated card locked");
                return Err(NativeError(format!(
                    "TapProtocolException: RATE_LIMIT (wait {}s)",
                    LOCKOUT_DELAY_SECS
                )));
            }
            return Err(NativeError("TapProtocolException: BAD_AUTH".to_string()));
        }
        state.failures = 0;
        Ok(())
    }

    fn status(&self) -> CardStatus {
        let state = self.state.lock();
        CardStatus {
            auth_delay_secs: if state.locked { LOCKOUT_DELAY_SECS } else { 0 },
            is_setup: state.is_setup,
            birth_height: Some(840_000),
            applet_version: "1.0.3".to_string(),
        }
    }
}

#[async_trait]
impl NativeCardApi for SoftwareCard {
    async fn card_status(
        &self,
        _transport: &mut dyn CardTransport,
    ) -> Result<CardStatus, NativeError> {
        Ok(self.status())
    }

    async fn wait_for_unlock(
        &self,
        _transport: &mut dyn CardTransport,
    ) -> Result<CardStatus, NativeError> {
        self.waits.fetch_add(1, Ordering::SeqCst);
        {
            let mut state = self.state.lock();
            state.locked = false;
            state.failures = 0;
        }
        debug!("Simulated card unlocked");
        Ok(self.status())
    }

    async fn setup(
        &self,
        _transport: &mut dyn CardTransport,
        starting_cvc: &Cvc,
        new_cvc: &Cvc,
        _chain_code: Option<[u8; 32]>,
    ) -> Result<(), NativeError> {
        self.authenticate(starting_cvc)?;
        let mut state = self.state.lock();
        state.cvc = new_cvc.as_str().to_string();
        state.is_setup = true;
        Ok(())
    }

    async fn change_cvc(
        &self,
        _transport: &mut dyn CardTransport,
        old_cvc: &Cvc,
        new_cvc: &Cvc,
    ) -> Result<(), NativeError> {
        self.authenticate(old_cvc)?;
        self.state.lock().cvc = new_cvc.as_str().to_string();
        Ok(())
    }

    async fn health_check(
        &self,
        _transport: &mut dyn CardTransport,
        cvc: &Cvc,
    ) -> Result<Fingerprint, NativeError> {
        self.authenticate(cvc)?;
        Ok(self.fingerprint())
    }

    async fn sign_transaction(
        &self,
        _transport: &mut dyn CardTransport,
        cvc: &Cvc,
        psbt: &str,
    ) -> Result<String, NativeError> {
        self.authenticate(cvc)?;
        // PSBTs are passed through; only the CVC path is simulated
        Ok(psbt.to_string())
    }

    async fn sign_message(
        &self,
        _transport: &mut dyn CardTransport,
        cvc: &Cvc,
        message: &[u8],
        _derivation_path: &str,
    ) -> Result<SignatureEntry, NativeError> {
        self.authenticate(cvc)?;
        Ok(self.signer.sign(message))
    }

    async fn get_backup(
        &self,
        _transport: &mut dyn CardTransport,
        cvc: &Cvc,
    ) -> Result<Vec<u8>, NativeError> {
        self.authenticate(cvc)?;
        Ok(self.public_key().to_vec())
    }

    async fn cache_xpubs(
        &self,
        _transport: &mut dyn CardTransport,
        cvc: &Cvc,
    ) -> Result<(), NativeError> {
        self.authenticate(cvc)
    }

    async fn create_signer(
        &self,
        _transport: &mut dyn CardTransport,
        cvc: &Cvc,
        _name: &str,
    ) -> Result<Fingerprint, NativeError> {
        self.authenticate(cvc)?;
        Ok(self.fingerprint())
    }

    async fn satscard_status(
        &self,
        _transport: &mut dyn CardTransport,
    ) -> Result<SatscardStatus, NativeError> {
        Err(NativeError("card is not a Satscard".to_string()))
    }

    async fn unseal(
        &self,
        _transport: &mut dyn CardTransport,
        _cvc: &Cvc,
    ) -> Result<UnsealedSlot, NativeError> {
        Err(NativeError("card is not a Satscard".to_string()))
    }

    fn transaction_records(&self, psbt: &str) -> Result<Vec<DataRecord>, NativeError> {
        Ok(vec![DataRecord::mime("application/psbt", psbt.as_bytes())])
    }

    fn wallet_records(&self, wallet_config: &str) -> Result<Vec<DataRecord>, NativeError> {
        Ok(vec![DataRecord::text(wallet_config)])
    }
}

/// Identity server accepting one password and one confirmation code
pub struct InMemoryIdentity {
    password: String,
    code: String,
    challenges: Mutex<Vec<TargetAction>>,
}

impl InMemoryIdentity {
    pub fn new(password: &str, code: &str) -> Self {
        Self {
            password: password.to_string(),
            code: code.to_string(),
            challenges: Mutex::new(Vec::new()),
        }
    }

    pub fn challenges(&self) -> Vec<TargetAction> {
        self.challenges.lock().clone()
    }

    fn issue(target: TargetAction) -> VerifyToken {
        VerifyToken::new(format!("vt-{}", target.as_str().to_lowercase()))
    }
}

#[async_trait]
impl IdentityServer for InMemoryIdentity {
    async fn request_federated_challenge(&self, target: TargetAction) -> Result<(), RemoteError> {
        self.challenges.lock().push(target);
        Ok(())
    }

    async fn verify_federated_code(
        &self,
        target: TargetAction,
        code: &str,
    ) -> Result<VerifyToken, RemoteError> {
        if code == self.code {
            Ok(Self::issue(target))
        } else {
            Err(RemoteError::new("Invalid confirmation code"))
        }
    }

    async fn verify_password(
        &self,
        target: TargetAction,
        password: &str,
    ) -> Result<VerifyToken, RemoteError> {
        if password == self.password {
            Ok(Self::issue(target))
        } else {
            Err(RemoteError::new(""))
        }
    }
}

/// One recorded policy submission
#[derive(Debug, Clone)]
pub struct Submission {
    pub action: PrivilegedAction,
    pub payload: Value,
    pub headers: Vec<(String, String)>,
}

/// Policy server that accepts everything and keeps what it saw
#[derive(Default)]
pub struct InMemoryPolicy {
    submissions: Mutex<Vec<Submission>>,
}

impl InMemoryPolicy {
    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().clone()
    }
}

#[async_trait]
impl PolicyServer for InMemoryPolicy {
    async fn submit(
        &self,
        action: PrivilegedAction,
        payload: &Value,
        bundle: &AuthorizationBundle,
    ) -> Result<Value, RemoteError> {
        let mut submissions = self.submissions.lock();
        submissions.push(Submission {
            action,
            payload: payload.clone(),
            headers: bundle.to_headers(),
        });
        Ok(json!({ "accepted": true, "sequence": submissions.len() }))
    }
}

/// Prompt answering from a queue; cancels when the queue runs dry
#[derive(Default)]
pub struct QueuedPrompt {
    answers: Mutex<VecDeque<PromptInput>>,
    asked: Mutex<Vec<PromptRequest>>,
}

impl QueuedPrompt {
    pub fn new(answers: impl IntoIterator<Item = PromptInput>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> Vec<PromptRequest> {
        self.asked.lock().clone()
    }
}

#[async_trait]
impl VerificationPrompt for QueuedPrompt {
    async fn ask(&self, request: PromptRequest) -> PromptInput {
        self.asked.lock().push(request);
        self.answers
            .lock()
            .pop_front()
            .unwrap_or(PromptInput::Cancel)
    }
}
