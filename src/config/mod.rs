pub use self::parser::{
    Config, DatabaseConfig, DbType, LoggingConfig, RelayConfig, ServerConfig,
};
pub use self::validator::ConfigError;

mod parser;
mod validator;
