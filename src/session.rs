//! ESB session: owns the radio driver, the outbound packet and the
//! transmit/retry engine.
//!
//! [`EsbSession::handle_event`] is invoked from interrupt context while
//! the control loop calls [`EsbSession::transmit_once`], so all state
//! lives behind a critical-section mutex and every method takes `&self`.
//! Firmware typically places the session in a `static` and shares the
//! reference with the radio interrupt.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use crate::Error;
use crate::board::{ATTEMPTS_MASK, DiagnosticPort, NullDiagnostic};
use crate::config::SessionConfig;
use crate::driver::{RadioDriver, RadioEvent};
use crate::log::{debug, warn};
use crate::packet::TxPacket;

/// Decides whether a failed transmission is re-armed.
///
/// The production policy is [`Unbounded`]: retry forever, immediately,
/// with no backoff. Tests bound the count with [`Limited`].
pub trait RetryPolicy {
    fn should_retry(&mut self, attempts: u8) -> bool;
}

/// Retry forever. The production policy.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unbounded;

impl RetryPolicy for Unbounded {
    fn should_retry(&mut self, _attempts: u8) -> bool {
        true
    }
}

/// Allow a fixed number of re-arms, then give up.
#[derive(Debug, Clone, Copy)]
pub struct Limited {
    remaining: u8,
}

impl Limited {
    pub fn new(max_retries: u8) -> Self {
        Self {
            remaining: max_retries,
        }
    }
}

impl RetryPolicy for Limited {
    fn should_retry(&mut self, _attempts: u8) -> bool {
        if self.remaining == 0 {
            false
        } else {
            self.remaining -= 1;
            true
        }
    }
}

struct State<D, P, G> {
    driver: D,
    config: SessionConfig,
    tx: TxPacket,
    retry: P,
    diag: G,
    last_attempts: u8,
}

/// Configuration, transmission and event handling for the proprietary
/// packet-radio protocol.
pub struct EsbSession<D, P = Unbounded, G = NullDiagnostic> {
    state: Mutex<CriticalSectionRawMutex, RefCell<State<D, P, G>>>,
}

impl<D: RadioDriver> EsbSession<D> {
    /// Session with the default telemetry packet, unbounded retry and no
    /// diagnostic output.
    pub fn new(driver: D, config: SessionConfig) -> Self {
        Self::with_parts(driver, config, TxPacket::default(), Unbounded, NullDiagnostic)
    }
}

impl<D: RadioDriver, P: RetryPolicy, G: DiagnosticPort> EsbSession<D, P, G> {
    pub fn with_parts(
        driver: D,
        config: SessionConfig,
        packet: TxPacket,
        retry: P,
        diag: G,
    ) -> Self {
        Self {
            state: Mutex::new(RefCell::new(State {
                driver,
                config,
                tx: packet,
                retry,
                diag,
                last_attempts: 0,
            })),
        }
    }

    /// Configure the driver for ESB operation and program the addresses.
    ///
    /// Any underlying failure is fatal for entering ESB mode and surfaces
    /// as [`Error::Configuration`].
    pub fn initialize(&self) -> Result<(), Error> {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            let State { driver, config, .. } = &mut *state;
            driver.init(config).map_err(Error::Configuration)?;
            driver
                .set_addresses(&config.addresses)
                .map_err(Error::Configuration)?;
            Ok(())
        })
    }

    /// Handle a radio event. Safe to call from interrupt context.
    pub fn handle_event(&self, event: RadioEvent) {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            let State { driver, retry, .. } = &mut *state;
            match event {
                RadioEvent::TxSucceeded { .. } => {
                    // Sequence bookkeeping happens at the transmit call
                    // site; nothing to mutate here.
                    debug!("tx success");
                }
                RadioEvent::TxFailed { attempts } => {
                    debug!("tx failed");
                    if retry.should_retry(attempts) {
                        // Drop the stuck queue entry and re-arm the same,
                        // unmodified packet. Statuses are ignored; the
                        // next event decides.
                        let _ = driver.flush_pending();
                        let _ = driver.restart_tx();
                    }
                }
                RadioEvent::RxAvailable { .. } => {
                    while let Some(rx) = driver.read_one() {
                        if !rx.is_empty() {
                            debug!("rx payload: {} bytes", rx.len());
                        }
                    }
                }
            }
            state.last_attempts = event.attempts() & ATTEMPTS_MASK;
            let nibble = state.last_attempts;
            state.diag.set(nibble);
        })
    }

    /// Send the shared packet once, with acknowledgement required.
    ///
    /// On success the sequence counter advances by exactly one (wrapping
    /// at 256). On failure the packet is left byte-identical, to be
    /// retried on the next send interval.
    pub fn transmit_once(&self) -> Result<(), Error> {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            let State { driver, tx, .. } = &mut *state;
            tx.set_ack(true);
            match driver.write(tx) {
                Ok(()) => {
                    tx.advance_sequence();
                    Ok(())
                }
                Err(e) => {
                    warn!("sending packet failed: {:?}", e);
                    Err(Error::Transmit(e))
                }
            }
        })
    }

    /// Blocking shutdown of the radio driver. The hardware bound is tens
    /// of milliseconds; callers must not assume instantaneous return.
    pub fn disable(&self) {
        self.state.lock(|state| state.borrow_mut().driver.disable());
    }

    /// Current value of the packet's sequence counter.
    pub fn sequence(&self) -> u8 {
        self.state.lock(|state| state.borrow().tx.sequence())
    }

    /// Snapshot of the shared outbound packet.
    pub fn packet(&self) -> TxPacket {
        self.state.lock(|state| state.borrow().tx)
    }

    /// Attempt count of the most recent event, masked to four bits.
    pub fn last_attempts(&self) -> u8 {
        self.state.lock(|state| state.borrow().last_attempts)
    }

    /// Run `f` against the driver inside the critical section. Mainly for
    /// tests and firmware glue.
    pub fn with_driver<R>(&self, f: impl FnOnce(&mut D) -> R) -> R {
        self.state.lock(|state| f(&mut state.borrow_mut().driver))
    }
}
