mod client;
mod upstream;

pub use upstream::RemoteUpstream;
