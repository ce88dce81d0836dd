pub mod fits;
pub mod naming;
