//! Register access for the DisplayPort receiver core.
//!
//! The control plane never touches MMIO directly; it talks to a [`RegisterBus`]. Every DPRX
//! register is an 8-bit value on a 32-bit stride, so wider quantities (M/N values, timings) are
//! assembled from several registers by the helpers in [`bus`].
//!
//! [`MockRegisters`] is a host-side model of that register file used by tests.

pub mod bus;
pub mod map;
pub mod mask;
pub mod mock;

pub use bus::RegisterBus;
pub use mask::MaskRegister;
pub use mock::MockRegisters;
