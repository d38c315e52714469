#[macro_use]
extern crate log;
extern crate slab;
extern crate uuid;

#[macro_use]
pub mod table;
pub mod execute;
pub mod functions;
pub mod time;
