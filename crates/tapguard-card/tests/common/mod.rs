//! Fakes shared by the card integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use tapguard_card::{
    CardStatus, CardTransport, Cvc, DataRecord, NativeCardApi, NativeError, SatscardStatus,
    TagTransport, TransportError, UnsealedSlot,
};
use tapguard_core::{Fingerprint, SignatureEntry};

pub const TAG_ID: [u8; 7] = [0x04, 0x5a, 0x2b, 0x91, 0x33, 0x60, 0x80];

/// What a fake transport saw
#[derive(Default)]
pub struct Probe {
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
    pub timeouts: Mutex<Vec<Duration>>,
    pub written: Mutex<Vec<DataRecord>>,
}

impl Probe {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

pub struct FakeTransport {
    pub probe: Arc<Probe>,
    pub connectable: bool,
    pub close_fails: bool,
    pub write_fails: bool,
    connected: bool,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            probe: Arc::new(Probe::default()),
            connectable: true,
            close_fails: false,
            write_fails: false,
            connected: false,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            connectable: false,
            ..Self::new()
        }
    }
}

#[async_trait]
impl CardTransport for FakeTransport {
    fn tag_id(&self) -> &[u8] {
        &TAG_ID
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.probe.timeouts.lock().push(timeout);
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        self.probe.connects.fetch_add(1, Ordering::SeqCst);
        if self.connectable {
            self.connected = true;
            Ok(())
        } else {
            Err(TransportError::TagLost)
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        self.connected = false;
        if self.close_fails {
            Err(TransportError::TagLost)
        } else {
            Ok(())
        }
    }

    async fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>, TransportError> {
        if !self.connected {
            return Err(TransportError::TagLost);
        }
        // Echo with a success status word
        let mut response = command.to_vec();
        response.extend_from_slice(&[0x90, 0x00]);
        Ok(response)
    }
}

#[async_trait]
impl TagTransport for FakeTransport {
    async fn write_records(&mut self, records: &[DataRecord]) -> Result<(), TransportError> {
        if self.write_fails {
            return Err(TransportError::Unsupported("tag is read-only".to_string()));
        }
        self.probe.written.lock().extend_from_slice(records);
        Ok(())
    }
}

/// Native engine whose authenticated calls follow a script
#[derive(Default)]
pub struct ScriptedNative {
    /// Outcomes handed out to CVC-authenticated calls, in order; success once empty
    pub auth_outcomes: Mutex<VecDeque<Result<(), String>>>,
    pub wait_fails: bool,
    pub waits: AtomicUsize,
    pub calls: Mutex<Vec<&'static str>>,
    pub delay_secs: u32,
}

impl ScriptedNative {
    pub fn with_outcomes(outcomes: impl IntoIterator<Item = Result<(), &'static str>>) -> Self {
        Self {
            auth_outcomes: Mutex::new(
                outcomes
                    .into_iter()
                    .map(|o| o.map_err(str::to_string))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    pub fn waits(&self) -> usize {
        self.waits.load(Ordering::SeqCst)
    }

    fn authenticate(&self, call: &'static str) -> Result<(), NativeError> {
        self.calls.lock().push(call);
        match self.auth_outcomes.lock().pop_front() {
            Some(Err(message)) => Err(NativeError(message)),
            _ => Ok(()),
        }
    }

    fn status(&self) -> CardStatus {
        CardStatus {
            auth_delay_secs: self.delay_secs,
            is_setup: true,
            birth_height: Some(840_000),
            applet_version: "1.0.3".to_string(),
        }
    }
}

pub fn card_fingerprint() -> Fingerprint {
    Fingerprint::new([0x73, 0xc5, 0xda, 0x0a])
}

#[async_trait]
impl NativeCardApi for ScriptedNative {
    async fn card_status(
        &self,
        _transport: &mut dyn CardTransport,
    ) -> Result<CardStatus, NativeError> {
        self.calls.lock().push("card_status");
        Ok(self.status())
    }

    async fn wait_for_unlock(
        &self,
        _transport: &mut dyn CardTransport,
    ) -> Result<CardStatus, NativeError> {
        self.waits.fetch_add(1, Ordering::SeqCst);
        if self.wait_fails {
            return Err(NativeError("wait command failed".to_string()));
        }
        Ok(CardStatus {
            auth_delay_secs: 0,
            ..self.status()
        })
    }

    async fn setup(
        &self,
        _transport: &mut dyn CardTransport,
        _starting_cvc: &Cvc,
        _new_cvc: &Cvc,
        _chain_code: Option<[u8; 32]>,
    ) -> Result<(), NativeError> {
        self.authenticate("setup")
    }

    async fn change_cvc(
        &self,
        _transport: &mut dyn CardTransport,
        _old_cvc: &Cvc,
        _new_cvc: &Cvc,
    ) -> Result<(), NativeError> {
        self.authenticate("change_cvc")
    }

    async fn health_check(
        &self,
        _transport: &mut dyn CardTransport,
        _cvc: &Cvc,
    ) -> Result<Fingerprint, NativeError> {
        self.authenticate("health_check")?;
        Ok(card_fingerprint())
    }

    async fn sign_transaction(
        &self,
        _transport: &mut dyn CardTransport,
        _cvc: &Cvc,
        psbt: &str,
    ) -> Result<String, NativeError> {
        self.authenticate("sign_transaction")?;
        Ok(format!("{}signed", psbt))
    }

    async fn sign_message(
        &self,
        _transport: &mut dyn CardTransport,
        _cvc: &Cvc,
        _message: &[u8],
        _derivation_path: &str,
    ) -> Result<SignatureEntry, NativeError> {
        self.authenticate("sign_message")?;
        Ok(SignatureEntry::new(card_fingerprint(), "ab".repeat(64)))
    }

    async fn get_backup(
        &self,
        _transport: &mut dyn CardTransport,
        _cvc: &Cvc,
    ) -> Result<Vec<u8>, NativeError> {
        self.authenticate("get_backup")?;
        Ok(vec![0xbb; 16])
    }

    async fn cache_xpubs(
        &self,
        _transport: &mut dyn CardTransport,
        _cvc: &Cvc,
    ) -> Result<(), NativeError> {
        self.authenticate("cache_xpubs")
    }

    async fn create_signer(
        &self,
        _transport: &mut dyn CardTransport,
        _cvc: &Cvc,
        _name: &str,
    ) -> Result<Fingerprint, NativeError> {
        self.authenticate("create_signer")?;
        Ok(card_fingerprint())
    }

    async fn satscard_status(
        &self,
        _transport: &mut dyn CardTransport,
    ) -> Result<SatscardStatus, NativeError> {
        self.calls.lock().push("satscard_status");
        Ok(SatscardStatus {
            active_slot: 2,
            num_slots: 10,
            auth_delay_secs: self.delay_secs,
        })
    }

    async fn unseal(
        &self,
        _transport: &mut dyn CardTransport,
        _cvc: &Cvc,
    ) -> Result<UnsealedSlot, NativeError> {
        self.authenticate("unseal")?;
        Ok(UnsealedSlot {
            index: 2,
            address: "bc1qslot2".to_string(),
        })
    }

    fn transaction_records(&self, psbt: &str) -> Result<Vec<DataRecord>, NativeError> {
        if psbt.is_empty() {
            return Err(NativeError("empty psbt".to_string()));
        }
        Ok(vec![DataRecord::text(psbt)])
    }

    fn wallet_records(&self, wallet_config: &str) -> Result<Vec<DataRecord>, NativeError> {
        Ok(vec![DataRecord::mime(
            "application/x-wallet-config",
            wallet_config.as_bytes(),
        )])
    }
}
