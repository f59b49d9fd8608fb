// Adapters layer: ingress, ingress client and the mock external systems the examples talk to

pub mod client;
pub mod http;
pub mod stubs;
