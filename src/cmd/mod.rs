//! CLI command implementations.
//!
//! | Module    | Commands handled |
//! |-----------|------------------|
//! | `serve`   | `Serve`          |
//! | `init`    | `Init`           |
//! | `schema`  | `Schema`         |
//! | `config`  | `Config`         |

pub mod config;
pub mod init;
pub mod schema;
pub mod serve;

pub use config::cmd_config;
pub use init::cmd_init;
pub use schema::cmd_schema;
pub use serve::{ServeArgs, cmd_serve};
