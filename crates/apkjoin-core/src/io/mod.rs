//! IO modules - filesystem side effects (containers, archives, work area)

pub mod container;
pub mod extract;
pub mod workdir;
