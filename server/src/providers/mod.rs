pub mod bus_api;
pub mod xml;
