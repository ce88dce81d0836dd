pub mod calibrate;
pub mod collection;
pub mod consts;
pub mod cosmic;
pub mod error;
pub mod filters;
pub mod frame;
pub mod io;
pub mod mask;
pub mod pipeline;
pub mod stack;
