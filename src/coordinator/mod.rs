//! Island coordination
//!
//! The phase protocol lives in [`protocol`] and runs over a [`Transport`].
//! Two transports exist: threads sharing one process ([`shared`]) and ranks
//! exchanging frames over a [`Wire`] ([`distributed`]), either in-process
//! channels or TCP ([`tcp`]).
//!
//! [`Transport`]: protocol::Transport
//! [`Wire`]: wire::Wire

pub mod distributed;
pub mod protocol;
pub mod shared;
pub mod tcp;
pub mod wire;

pub mod prelude {
    pub use super::distributed::{DistributedCoordinator, MessagePassingTransport};
    pub use super::protocol::{run_island, Immigrants, Phase, RunSettings, Transport};
    pub use super::shared::{PhaseBarrier, SharedMemoryCoordinator};
    pub use super::tcp::TcpWire;
    pub use super::wire::{Frame, LocalNetwork, LocalWire, SendHandle, Wire};
}
