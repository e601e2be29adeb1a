mod loader;

pub use loader::{ConfigFlags, ConfigLoader, Location};
