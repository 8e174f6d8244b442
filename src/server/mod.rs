//! Network side: the socket seam, shared application state and the tokio
//! accept loop that plays the readiness source for the dispatcher.

pub mod listener;
pub mod socket;
pub mod state;
