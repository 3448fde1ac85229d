//! Session processes.
//!
//! Both processes are [`SequentialProcess`](peerdrive_process::SequentialProcess)
//! trees whose steps share one typed scratch struct:
//!
//! ```text
//! post-login:  GetLocations -> ContactPeers -> PutLocations      (LoginData)
//! logout:      RemoveOwnLocation -> WritePersistent             (LogoutData)
//! ```

mod contact_peers;
mod login;
mod logout;

pub use contact_peers::{contact_peers, ContactPeersStep, ContactResult, ReplyCollector};
pub use login::{post_login_process, GetLocationsStep, LoginData, PutLocationsStep};
pub use logout::{logout_process, LogoutData, RemoveOwnLocationStep, WritePersistentStep};
