//! Contracts of the connection-oriented (BLE) side.
//!
//! The stack and its sensor service are black boxes to this crate; pairing,
//! notifications and profile logic stay in the platform crate. The core
//! only sequences their lifecycles around mode changes.

/// Status code surfaced by the BLE stack or service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StackError(pub u32);

/// Lifecycle of the BLE protocol stack.
///
/// `start` may block briefly. A failed `start` is fatal: both radio modes
/// are unusable once the stack is in an undefined state.
pub trait LinkStack {
    fn start(&mut self) -> Result<(), StackError>;

    fn stop(&mut self) -> Result<(), StackError>;

    /// Block until the stack signals activity. This is the whole BLE-mode
    /// idle strategy: the control loop sleeps here and the stack's own
    /// event-driven processing gets the CPU.
    fn wait_event(&mut self);
}

/// Lifecycle of the peer-notification service running on top of the stack.
///
/// Assumed to require a started [`LinkStack`].
pub trait LinkService {
    fn start(&mut self) -> Result<(), StackError>;

    fn stop(&mut self) -> Result<(), StackError>;
}
