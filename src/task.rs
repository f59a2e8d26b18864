//! The main control loop.

use core::convert::Infallible;

use crate::Error;
use crate::board::{Board, DiagnosticPort};
use crate::driver::RadioDriver;
use crate::idle::{Delay, IdleManager};
use crate::log::{error, info};
use crate::mode::{ModeController, RadioMode};
use crate::session::{EsbSession, RetryPolicy};
use crate::stack::{LinkStack, LinkService};

/// Ties the mode controller, idle manager and ESB session together.
///
/// Each iteration runs the active mode's idle strategy, polls the trigger
/// source and fires a transition if the desired mode changed. The session
/// is borrowed rather than owned because the radio interrupt shares it;
/// firmware keeps it in a `static`.
pub struct DualModeTask<'a, D, P, G, B, LS, SV, DL> {
    session: &'a EsbSession<D, P, G>,
    board: B,
    stack: LS,
    service: SV,
    idle: IdleManager<DL>,
    modes: ModeController,
}

impl<'a, D, P, G, B, LS, SV, DL> DualModeTask<'a, D, P, G, B, LS, SV, DL>
where
    D: RadioDriver,
    P: RetryPolicy,
    G: DiagnosticPort,
    B: Board,
    LS: LinkStack,
    SV: LinkService,
    DL: Delay,
{
    pub fn new(
        session: &'a EsbSession<D, P, G>,
        board: B,
        stack: LS,
        service: SV,
        idle: IdleManager<DL>,
    ) -> Self {
        Self::with_modes(session, board, stack, service, idle, ModeController::new())
    }

    /// As [`DualModeTask::new`], with a preconfigured controller (e.g. a
    /// debounced one).
    pub fn with_modes(
        session: &'a EsbSession<D, P, G>,
        board: B,
        stack: LS,
        service: SV,
        idle: IdleManager<DL>,
        modes: ModeController,
    ) -> Self {
        Self {
            session,
            board,
            stack,
            service,
            idle,
            modes,
        }
    }

    /// Initial BLE bring-up. Both failures are fatal: the device has no
    /// defined degraded mode.
    pub fn start(&mut self) -> Result<(), Error> {
        info!("application starts");
        self.stack.start().map_err(Error::Stack)?;
        self.service.start().map_err(Error::Stack)?;
        info!("ble mode");
        Ok(())
    }

    /// One control-loop iteration: idle strategy, trigger poll, possibly a
    /// transition. Returns `Ok(true)` when a transition ran.
    pub fn run_once(&mut self) -> Result<bool, Error> {
        self.idle
            .run(self.modes.current(), &mut self.stack, self.session);
        let desired = self.modes.poll_desired(&mut self.board);
        self.modes.update(
            desired,
            &mut self.board,
            &mut self.stack,
            &mut self.service,
            self.session,
        )
    }

    /// Bring up BLE and loop forever. Returns only with a fatal error;
    /// the caller halts or resets.
    pub fn run(&mut self) -> Result<Infallible, Error> {
        if let Err(e) = self.start() {
            error!("bring-up failed: {:?}", e);
            return Err(e);
        }
        loop {
            if let Err(e) = self.run_once() {
                error!("mode transition failed: {:?}", e);
                return Err(e);
            }
        }
    }

    pub fn mode(&self) -> RadioMode {
        self.modes.current()
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    pub fn stack(&self) -> &LS {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut LS {
        &mut self.stack
    }

    pub fn service(&self) -> &SV {
        &self.service
    }

    pub fn service_mut(&mut self) -> &mut SV {
        &mut self.service
    }
}
