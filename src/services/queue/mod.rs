//! Coda job sul broker Redis
//!
//! I worker girano fuori processo: questo modulo si occupa solo di
//! accodare i job e di rileggerne stato e risultato per identificativo.

mod broker;
mod jobs;

pub use broker::BrokerPool;
pub use jobs::JobQueue;
