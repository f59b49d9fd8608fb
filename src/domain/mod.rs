// Domain layer: request/response records and the ports (interfaces) the examples talk to.

pub mod model;
pub mod ports;
