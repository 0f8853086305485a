//! Terminal widgets shared by the binaries

pub mod key_indicator;

pub use key_indicator::KeyPressIndicator;
