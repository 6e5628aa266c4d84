//! Network transport.
//!
//! Every record lives within exactly one UDP datagram: no framing, no
//! retransmission, no acknowledgement. The listener socket is held for the
//! life of the process; each outbound send opens its own ephemeral socket.

mod udp;

pub use udp::{send, Listener, MAX_RECORD_BYTES};
