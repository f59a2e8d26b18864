//! Mode arbitration: which stack owns the radio, and the ordered
//! teardown/bring-up sequencing between them.

use crate::Error;
use crate::board::{Board, DiagnosticPort, Indication, ModeButton};
use crate::driver::RadioDriver;
use crate::log::{info, warn};
use crate::session::{EsbSession, RetryPolicy};
use crate::stack::{LinkStack, LinkService};

/// The two radio owners. Exactly one is current at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioMode {
    /// Connection-oriented link reporting sensor data to a paired peer.
    Ble,
    /// Proprietary low-latency packet transmission with retry.
    Esb,
}

/// Single authority over the current mode and all transition sequencing.
///
/// Transitions are edge-triggered: each control-loop iteration feeds the
/// desired mode into [`ModeController::update`]; a transition fires at
/// most once per edge, never on a repeated sample.
pub struct ModeController {
    current: RadioMode,
    previous: RadioMode,
    debounce_samples: u8,
    pending: RadioMode,
    pending_count: u8,
}

impl ModeController {
    /// Controller starting in BLE mode, acting on the first differing
    /// trigger sample (no debounce).
    pub fn new() -> Self {
        Self::with_debounce(1)
    }

    /// Controller requiring `samples` consecutive identical differing
    /// trigger samples before a transition fires. The inputs themselves
    /// carry no debounce guarantee, so boards with noisy buttons raise
    /// this; `1` reproduces the undebounced behavior.
    pub fn with_debounce(samples: u8) -> Self {
        Self {
            current: RadioMode::Ble,
            previous: RadioMode::Ble,
            debounce_samples: samples.max(1),
            pending: RadioMode::Ble,
            pending_count: 0,
        }
    }

    pub fn current(&self) -> RadioMode {
        self.current
    }

    pub fn previous(&self) -> RadioMode {
        self.previous
    }

    /// Query the trigger source. Level-sensitive: when strictly one mode
    /// button is held, that mode is desired; when both or neither are
    /// held, the running mode wins.
    pub fn poll_desired<B: Board>(&self, board: &mut B) -> RadioMode {
        let ble = board.is_pressed(ModeButton::Ble);
        let esb = board.is_pressed(ModeButton::Esb);
        match (ble, esb) {
            (true, false) => RadioMode::Ble,
            (false, true) => RadioMode::Esb,
            _ => self.current,
        }
    }

    /// Record one desired-mode sample; fire the transition once the edge
    /// is confirmed. Returns `Ok(true)` when a transition ran.
    ///
    /// A failure partway through leaves the system partially migrated;
    /// there is no rollback, and every error surfaced here is fatal.
    pub fn update<D, P, G, B, LS, SV>(
        &mut self,
        desired: RadioMode,
        board: &mut B,
        stack: &mut LS,
        service: &mut SV,
        session: &EsbSession<D, P, G>,
    ) -> Result<bool, Error>
    where
        D: RadioDriver,
        P: RetryPolicy,
        G: DiagnosticPort,
        B: Board,
        LS: LinkStack,
        SV: LinkService,
    {
        if !self.edge(desired) {
            return Ok(false);
        }
        self.transition(desired, board, stack, service, session)?;
        self.previous = self.current;
        self.current = desired;
        self.pending = desired;
        self.pending_count = 0;
        Ok(true)
    }

    fn edge(&mut self, desired: RadioMode) -> bool {
        if desired == self.current {
            self.pending_count = 0;
            return false;
        }
        if self.pending == desired {
            self.pending_count = self.pending_count.saturating_add(1);
        } else {
            self.pending = desired;
            self.pending_count = 1;
        }
        self.pending_count >= self.debounce_samples
    }

    /// Teardown of the outgoing mode always precedes bring-up of the
    /// incoming one; both compete for the same radio hardware and overlap
    /// is invalid.
    fn transition<D, P, G, B, LS, SV>(
        &mut self,
        to: RadioMode,
        board: &mut B,
        stack: &mut LS,
        service: &mut SV,
        session: &EsbSession<D, P, G>,
    ) -> Result<(), Error>
    where
        D: RadioDriver,
        P: RetryPolicy,
        G: DiagnosticPort,
        B: Board,
        LS: LinkStack,
        SV: LinkService,
    {
        match to {
            RadioMode::Esb => {
                info!("esb transmitting mode");
                // Drop the peer link before the stack underneath it. Stop
                // failures are logged and ignored: teardown has to finish
                // so the radio is free.
                if let Err(e) = service.stop() {
                    warn!("service stop failed: {:?}", e);
                }
                if let Err(e) = stack.stop() {
                    warn!("stack stop failed: {:?}", e);
                }
                board.set_indication(Indication::Idle).map_err(Error::Board)?;
                session.initialize()?;
            }
            RadioMode::Ble => {
                info!("ble mode");
                // Blocking, up to tens of milliseconds.
                session.disable();
                board.set_indication(Indication::Idle).map_err(Error::Board)?;
                stack.start().map_err(Error::Stack)?;
                service.start().map_err(Error::Stack)?;
            }
        }
        Ok(())
    }
}

impl Default for ModeController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::driver::DriverError;
    use crate::mock::{CallOrder, MockBoard, MockDriver, MockService, MockStack};
    use crate::stack::StackError;

    struct Rig<'a> {
        board: MockBoard<'a>,
        stack: MockStack<'a>,
        service: MockService<'a>,
        session: EsbSession<MockDriver<'a>>,
        modes: ModeController,
    }

    impl<'a> Rig<'a> {
        fn new(order: &'a CallOrder) -> Self {
            Self::with_driver(order, MockDriver::with_order(order))
        }

        fn with_driver(order: &'a CallOrder, driver: MockDriver<'a>) -> Self {
            Self {
                board: MockBoard::with_order(order),
                stack: MockStack::with_order(order),
                service: MockService::with_order(order),
                session: EsbSession::new(driver, SessionConfig::default()),
                modes: ModeController::new(),
            }
        }

        fn update(&mut self, desired: RadioMode) -> Result<bool, Error> {
            self.modes.update(
                desired,
                &mut self.board,
                &mut self.stack,
                &mut self.service,
                &self.session,
            )
        }

        fn poll_and_update(&mut self) -> Result<bool, Error> {
            let desired = self.modes.poll_desired(&mut self.board);
            self.update(desired)
        }
    }

    #[test]
    fn starts_in_ble_mode() {
        let m = ModeController::new();
        assert_eq!(m.current(), RadioMode::Ble);
        assert_eq!(m.previous(), RadioMode::Ble);
    }

    #[test]
    fn desired_follows_a_single_held_button() {
        let order = CallOrder::new();
        let mut rig = Rig::new(&order);
        rig.board.esb_pressed = true;
        assert_eq!(rig.modes.poll_desired(&mut rig.board), RadioMode::Esb);
        rig.board.esb_pressed = false;
        rig.board.ble_pressed = true;
        assert_eq!(rig.modes.poll_desired(&mut rig.board), RadioMode::Ble);
    }

    #[test]
    fn current_mode_wins_when_both_or_neither_held() {
        let order = CallOrder::new();
        let mut rig = Rig::new(&order);
        assert_eq!(rig.modes.poll_desired(&mut rig.board), RadioMode::Ble);
        rig.board.ble_pressed = true;
        rig.board.esb_pressed = true;
        assert_eq!(rig.modes.poll_desired(&mut rig.board), RadioMode::Ble);
    }

    #[test]
    fn trigger_sequence_fires_exactly_twice() {
        let order = CallOrder::new();
        let mut rig = Rig::new(&order);
        let mut transitions = 0;

        // [neither, esb, esb, ble]
        for (ble, esb) in [(false, false), (false, true), (false, true), (true, false)] {
            rig.board.ble_pressed = ble;
            rig.board.esb_pressed = esb;
            if rig.poll_and_update().unwrap() {
                transitions += 1;
            }
        }
        assert_eq!(transitions, 2);
        assert_eq!(rig.modes.current(), RadioMode::Ble);
        assert_eq!(rig.modes.previous(), RadioMode::Esb);
    }

    #[test]
    fn enter_esb_sequencing_is_ordered() {
        let order = CallOrder::new();
        let mut rig = Rig::new(&order);
        assert!(rig.update(RadioMode::Esb).unwrap());

        let service_stop = rig.service.stop_order.unwrap();
        let stack_stop = rig.stack.stop_order.unwrap();
        let indication = rig.board.indication_order.unwrap();
        let init = rig.session.with_driver(|d| d.init_order.unwrap());
        assert!(service_stop < stack_stop);
        assert!(stack_stop < indication);
        assert!(indication < init);
    }

    #[test]
    fn enter_ble_sequencing_is_ordered() {
        let order = CallOrder::new();
        let mut rig = Rig::new(&order);
        assert!(rig.update(RadioMode::Esb).unwrap());
        assert!(rig.update(RadioMode::Ble).unwrap());

        let disable = rig.session.with_driver(|d| d.disable_order.unwrap());
        let indication = rig.board.indication_order.unwrap();
        let stack_start = rig.stack.start_order.unwrap();
        let service_start = rig.service.start_order.unwrap();
        assert!(disable < indication);
        assert!(indication < stack_start);
        assert!(stack_start < service_start);
    }

    #[test]
    fn exactly_one_owner_after_each_transition() {
        let order = CallOrder::new();
        let mut rig = Rig::new(&order);

        assert!(rig.update(RadioMode::Esb).unwrap());
        assert_eq!(rig.stack.stops, 1);
        rig.session.with_driver(|d| {
            assert_eq!(d.init_calls, 1);
            assert_eq!(d.disables, 0);
        });

        assert!(rig.update(RadioMode::Ble).unwrap());
        assert_eq!(rig.stack.starts, 1);
        rig.session.with_driver(|d| assert_eq!(d.disables, 1));
    }

    #[test]
    fn esb_bring_up_failure_propagates() {
        let order = CallOrder::new();
        let mut driver = MockDriver::with_order(&order);
        driver.init_result = Err(DriverError::Hardware);
        let mut rig = Rig::with_driver(&order, driver);

        let r = rig.update(RadioMode::Esb);
        assert_eq!(r, Err(Error::Configuration(DriverError::Hardware)));
        // The edge did not commit; the controller still reports BLE.
        assert_eq!(rig.modes.current(), RadioMode::Ble);
    }

    #[test]
    fn stack_start_failure_is_fatal() {
        let order = CallOrder::new();
        let mut rig = Rig::new(&order);
        assert!(rig.update(RadioMode::Esb).unwrap());

        rig.stack.start_result = Err(StackError(4));
        let r = rig.update(RadioMode::Ble);
        assert_eq!(r, Err(Error::Stack(StackError(4))));
    }

    #[test]
    fn stop_failures_do_not_block_teardown() {
        let order = CallOrder::new();
        let mut rig = Rig::new(&order);
        rig.service.stop_result = Err(StackError(7));
        rig.stack.stop_result = Err(StackError(8));

        assert!(rig.update(RadioMode::Esb).unwrap());
        rig.session.with_driver(|d| assert_eq!(d.init_calls, 1));
    }

    #[test]
    fn debounce_requires_consecutive_samples() {
        let order = CallOrder::new();
        let mut rig = Rig::new(&order);
        rig.modes = ModeController::with_debounce(2);

        assert!(!rig.update(RadioMode::Esb).unwrap());
        // A sample agreeing with the current mode resets the filter.
        assert!(!rig.update(RadioMode::Ble).unwrap());
        assert!(!rig.update(RadioMode::Esb).unwrap());
        assert!(rig.update(RadioMode::Esb).unwrap());
        assert_eq!(rig.modes.current(), RadioMode::Esb);
    }
}
