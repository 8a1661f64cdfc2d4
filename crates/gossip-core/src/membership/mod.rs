//! Membership: the local node's view of known peers.
//!
//! The directory keeps three structures in step:
//! - id → `PeerRecord` map (addresses)
//! - insertion-ordered id list (uniform random sampling)
//! - id → last-seen map (age-out failure detection)
//!
//! Peers are adopted on first mention (bootstrap or gossip), never
//! re-addressed, and evicted once their last-seen time exceeds the
//! stale threshold.

pub mod directory;
pub mod record;

pub use directory::MembershipDirectory;
pub use record::{PeerAddress, PeerRecord};
