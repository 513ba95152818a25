mod retry;
pub use retry::FixedDelay;
