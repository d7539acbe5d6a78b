pub mod capabilities;
pub mod client;
pub mod events;
pub mod peer;
