//! Hardware initialisation, supervision timer and embedded-hal
//! peripheral wrappers.

pub mod hw_init;
pub mod hw_timer;
