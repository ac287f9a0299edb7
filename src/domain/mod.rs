//! Domain types of the order lifecycle and the ports to the outside world.

pub mod money;
pub mod order;
pub mod order_lines;
pub mod payload;
pub mod ports;
pub mod remote;
