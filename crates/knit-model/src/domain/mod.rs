mod kv;
pub use kv::KeyValue;

mod env;
pub use env::Env;

mod ids;
pub use ids::{AppId, ContainerId};

mod constants;
pub use constants::{DEFAULT_APP_NAME, DEFAULT_QUEUE, STAGING_DIR, SUPERVISOR_ORDINAL};
