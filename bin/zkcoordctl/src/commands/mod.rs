pub mod coordinator;
pub mod elect;
pub mod sequence;
pub mod server;
