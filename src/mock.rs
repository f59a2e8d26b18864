//! Test doubles for every collaborator trait.
//!
//! Fixed-capacity and `no_std`-clean so the same doubles serve the
//! crate's own tests and downstream simulators. Each double counts its
//! calls; doubles created with [`with_order`](MockDriver::with_order)
//! additionally record a global call index, which is how the transition
//! ordering contract is asserted.

use core::cell::Cell;

use embassy_time::Duration;

use crate::addresses::Addresses;
use crate::board::{Board, BoardError, DiagnosticPort, Indication, ModeButton};
use crate::config::SessionConfig;
use crate::driver::{DriverError, RadioDriver};
use crate::idle::Delay;
use crate::packet::{RxPacket, TxPacket};
use crate::stack::{LinkStack, LinkService, StackError};

const RX_QUEUE_CAP: usize = 8;

/// Shared monotonic counter stamping the order of calls across doubles.
#[derive(Default)]
pub struct CallOrder(Cell<u32>);

impl CallOrder {
    pub const fn new() -> Self {
        Self(Cell::new(0))
    }

    pub fn next(&self) -> u32 {
        let n = self.0.get();
        self.0.set(n + 1);
        n
    }
}

fn stamp(order: Option<&CallOrder>) -> Option<u32> {
    order.map(CallOrder::next)
}

/// Scriptable [`RadioDriver`].
pub struct MockDriver<'a> {
    order: Option<&'a CallOrder>,
    pub init_calls: usize,
    pub init_order: Option<u32>,
    pub init_result: Result<(), DriverError>,
    pub addr_calls: usize,
    pub addr_result: Result<(), DriverError>,
    pub last_addresses: Option<Addresses>,
    pub writes: usize,
    /// Fail this many upcoming writes with [`DriverError::Busy`].
    pub fail_writes: usize,
    pub last_written: Option<TxPacket>,
    pub flushes: usize,
    pub restarts: usize,
    pub disables: usize,
    pub disable_order: Option<u32>,
    /// Successful pops from the receive queue.
    pub reads: usize,
    /// Total `read_one` invocations, including the terminating empty one.
    pub read_calls: usize,
    rx_queue: [Option<RxPacket>; RX_QUEUE_CAP],
    rx_count: usize,
    rx_next: usize,
}

impl<'a> MockDriver<'a> {
    pub fn with_order(order: &'a CallOrder) -> Self {
        Self {
            order: Some(order),
            ..Self::default()
        }
    }

    /// Queue a packet for the drain loop. Panics when the fixed-capacity
    /// queue is full.
    pub fn push_rx(&mut self, packet: RxPacket) {
        assert!(self.rx_count < RX_QUEUE_CAP, "mock rx queue full");
        self.rx_queue[self.rx_count] = Some(packet);
        self.rx_count += 1;
    }
}

impl Default for MockDriver<'_> {
    fn default() -> Self {
        Self {
            order: None,
            init_calls: 0,
            init_order: None,
            init_result: Ok(()),
            addr_calls: 0,
            addr_result: Ok(()),
            last_addresses: None,
            writes: 0,
            fail_writes: 0,
            last_written: None,
            flushes: 0,
            restarts: 0,
            disables: 0,
            disable_order: None,
            reads: 0,
            read_calls: 0,
            rx_queue: [None; RX_QUEUE_CAP],
            rx_count: 0,
            rx_next: 0,
        }
    }
}

impl RadioDriver for MockDriver<'_> {
    fn init(&mut self, _config: &SessionConfig) -> Result<(), DriverError> {
        self.init_calls += 1;
        self.init_order = stamp(self.order);
        self.init_result
    }

    fn set_addresses(&mut self, addresses: &Addresses) -> Result<(), DriverError> {
        self.addr_calls += 1;
        self.last_addresses = Some(addresses.clone());
        self.addr_result
    }

    fn write(&mut self, packet: &TxPacket) -> Result<(), DriverError> {
        self.writes += 1;
        self.last_written = Some(*packet);
        if self.fail_writes > 0 {
            self.fail_writes -= 1;
            Err(DriverError::Busy)
        } else {
            Ok(())
        }
    }

    fn read_one(&mut self) -> Option<RxPacket> {
        self.read_calls += 1;
        if self.rx_next < self.rx_count {
            let packet = self.rx_queue[self.rx_next].take();
            self.rx_next += 1;
            self.reads += 1;
            packet
        } else {
            None
        }
    }

    fn flush_pending(&mut self) -> Result<(), DriverError> {
        self.flushes += 1;
        Ok(())
    }

    fn restart_tx(&mut self) -> Result<(), DriverError> {
        self.restarts += 1;
        Ok(())
    }

    fn disable(&mut self) {
        self.disables += 1;
        self.disable_order = stamp(self.order);
    }
}

/// Scriptable [`LinkStack`]. `wait_event` returns immediately.
pub struct MockStack<'a> {
    order: Option<&'a CallOrder>,
    pub starts: usize,
    pub stops: usize,
    pub waits: usize,
    pub start_order: Option<u32>,
    pub stop_order: Option<u32>,
    pub start_result: Result<(), StackError>,
    pub stop_result: Result<(), StackError>,
}

impl<'a> MockStack<'a> {
    pub fn with_order(order: &'a CallOrder) -> Self {
        Self {
            order: Some(order),
            ..Self::default()
        }
    }
}

impl Default for MockStack<'_> {
    fn default() -> Self {
        Self {
            order: None,
            starts: 0,
            stops: 0,
            waits: 0,
            start_order: None,
            stop_order: None,
            start_result: Ok(()),
            stop_result: Ok(()),
        }
    }
}

impl LinkStack for MockStack<'_> {
    fn start(&mut self) -> Result<(), StackError> {
        self.starts += 1;
        self.start_order = stamp(self.order);
        self.start_result
    }

    fn stop(&mut self) -> Result<(), StackError> {
        self.stops += 1;
        self.stop_order = stamp(self.order);
        self.stop_result
    }

    fn wait_event(&mut self) {
        self.waits += 1;
    }
}

/// Scriptable [`LinkService`].
pub struct MockService<'a> {
    order: Option<&'a CallOrder>,
    pub starts: usize,
    pub stops: usize,
    pub start_order: Option<u32>,
    pub stop_order: Option<u32>,
    pub start_result: Result<(), StackError>,
    pub stop_result: Result<(), StackError>,
}

impl<'a> MockService<'a> {
    pub fn with_order(order: &'a CallOrder) -> Self {
        Self {
            order: Some(order),
            ..Self::default()
        }
    }
}

impl Default for MockService<'_> {
    fn default() -> Self {
        Self {
            order: None,
            starts: 0,
            stops: 0,
            start_order: None,
            stop_order: None,
            start_result: Ok(()),
            stop_result: Ok(()),
        }
    }
}

impl LinkService for MockService<'_> {
    fn start(&mut self) -> Result<(), StackError> {
        self.starts += 1;
        self.start_order = stamp(self.order);
        self.start_result
    }

    fn stop(&mut self) -> Result<(), StackError> {
        self.stops += 1;
        self.stop_order = stamp(self.order);
        self.stop_result
    }
}

/// [`Board`] with directly settable button levels.
pub struct MockBoard<'a> {
    order: Option<&'a CallOrder>,
    pub ble_pressed: bool,
    pub esb_pressed: bool,
    pub indications: usize,
    pub last_indication: Option<Indication>,
    pub indication_order: Option<u32>,
    pub indication_result: Result<(), BoardError>,
}

impl<'a> MockBoard<'a> {
    pub fn with_order(order: &'a CallOrder) -> Self {
        Self {
            order: Some(order),
            ..Self::default()
        }
    }
}

impl Default for MockBoard<'_> {
    fn default() -> Self {
        Self {
            order: None,
            ble_pressed: false,
            esb_pressed: false,
            indications: 0,
            last_indication: None,
            indication_order: None,
            indication_result: Ok(()),
        }
    }
}

impl Board for MockBoard<'_> {
    fn is_pressed(&mut self, button: ModeButton) -> bool {
        match button {
            ModeButton::Ble => self.ble_pressed,
            ModeButton::Esb => self.esb_pressed,
        }
    }

    fn set_indication(&mut self, indication: Indication) -> Result<(), BoardError> {
        self.indications += 1;
        self.last_indication = Some(indication);
        self.indication_order = stamp(self.order);
        self.indication_result
    }
}

/// Recording [`Delay`]; does not actually wait.
#[derive(Default)]
pub struct MockDelay {
    pub delays: usize,
    pub total_us: u64,
}

impl Delay for MockDelay {
    fn delay(&mut self, duration: Duration) {
        self.delays += 1;
        self.total_us += duration.as_micros();
    }
}

/// [`DiagnosticPort`] mirroring writes into a caller-owned cell.
pub struct MockDiagnostic<'a> {
    target: &'a Cell<u8>,
}

impl<'a> MockDiagnostic<'a> {
    pub fn new(target: &'a Cell<u8>) -> Self {
        Self { target }
    }
}

impl DiagnosticPort for MockDiagnostic<'_> {
    fn set(&mut self, value: u8) {
        self.target.set(value);
    }
}
