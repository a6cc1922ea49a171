//! Domain Layer
//!
//! The administrative hierarchy, the resolution algorithm and the ports
//! it needs from the outside world. No I/O happens here.

pub mod entities;
pub mod error;
pub mod ports;
pub mod services;
pub mod value_objects;
