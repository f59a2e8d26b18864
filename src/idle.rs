//! Per-iteration idle strategy for whichever mode is active.

use embassy_time::Duration;

use crate::board::DiagnosticPort;
use crate::driver::RadioDriver;
use crate::mode::RadioMode;
use crate::session::{EsbSession, RetryPolicy};
use crate::stack::LinkStack;

/// Blocking wait for a fixed interval.
///
/// Firmware implements this with `embassy_time::block_for`; host tests
/// inject a recording mock. Injected rather than called directly so the
/// control loop runs without a time driver.
pub trait Delay {
    fn delay(&mut self, duration: Duration);
}

/// Chooses the "nothing else to do" behavior executed once per
/// control-loop iteration.
///
/// In BLE mode that is a cooperative sleep until the stack signals
/// activity. In ESB mode it is one transmit followed by a fixed interval:
/// not idle in the traditional sense, but the mode's entire send cadence.
pub struct IdleManager<DL> {
    delay: DL,
    send_interval: Duration,
}

impl<DL: Delay> IdleManager<DL> {
    pub fn new(delay: DL, send_interval: Duration) -> Self {
        Self {
            delay,
            send_interval,
        }
    }

    pub fn run<D, P, G, LS>(
        &mut self,
        mode: RadioMode,
        stack: &mut LS,
        session: &EsbSession<D, P, G>,
    ) where
        D: RadioDriver,
        P: RetryPolicy,
        G: DiagnosticPort,
        LS: LinkStack,
    {
        match mode {
            RadioMode::Ble => stack.wait_event(),
            RadioMode::Esb => {
                // A failed send keeps the packet untouched; it goes out on
                // the next interval. The delay runs regardless of outcome.
                let _ = session.transmit_once();
                self.delay.delay(self.send_interval);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::mock::{MockDelay, MockDriver, MockStack};

    const INTERVAL: Duration = Duration::from_micros(7000);

    #[test]
    fn ble_idle_blocks_on_the_stack() {
        let mut idle = IdleManager::new(MockDelay::default(), INTERVAL);
        let mut stack = MockStack::default();
        let session = EsbSession::new(MockDriver::default(), SessionConfig::default());

        idle.run(RadioMode::Ble, &mut stack, &session);
        assert_eq!(stack.waits, 1);
        assert_eq!(idle.delay.delays, 0);
        session.with_driver(|d| assert_eq!(d.writes, 0));
    }

    #[test]
    fn esb_idle_transmits_then_waits_the_interval() {
        let mut idle = IdleManager::new(MockDelay::default(), INTERVAL);
        let mut stack = MockStack::default();
        let session = EsbSession::new(MockDriver::default(), SessionConfig::default());

        idle.run(RadioMode::Esb, &mut stack, &session);
        assert_eq!(stack.waits, 0);
        session.with_driver(|d| assert_eq!(d.writes, 1));
        assert_eq!(idle.delay.delays, 1);
        assert_eq!(idle.delay.total_us, INTERVAL.as_micros());
    }

    #[test]
    fn esb_idle_delays_even_when_the_send_fails() {
        let mut idle = IdleManager::new(MockDelay::default(), INTERVAL);
        let mut stack = MockStack::default();
        let mut driver = MockDriver::default();
        driver.fail_writes = 1;
        let session = EsbSession::new(driver, SessionConfig::default());

        idle.run(RadioMode::Esb, &mut stack, &session);
        assert_eq!(idle.delay.delays, 1);
        assert_eq!(session.sequence(), 0);
    }
}
