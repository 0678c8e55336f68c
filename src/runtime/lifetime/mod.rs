pub mod startup;

pub use startup::{StartupContext, install_crypto_provider, prepare_server_startup};
