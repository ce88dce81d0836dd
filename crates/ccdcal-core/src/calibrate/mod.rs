pub mod dark_current;

pub use dark_current::{dark_current, dark_current_map};
