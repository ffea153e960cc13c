//! Transit Tangle simulation library
//!
//! Road-building and traffic-flow simulation core that runs headless,
//! independent of any rendering or input frontend.

pub mod simulation;
