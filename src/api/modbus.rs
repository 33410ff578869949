mod client;
mod endpoint;

pub use self::{client::Client, endpoint::Endpoint};
