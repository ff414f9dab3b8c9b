//! RESP wire layer: streaming parser, encoder, dispatch, TCP listener
//!
//! The dispatch table is the seam shared by both front doors: the RESP
//! TCP listener in this crate and any HTTP control surface outside the
//! core call the same [`dispatch`] function with
//! `(engine, namespace, argv)`. Nothing below the table knows which wire
//! the command arrived on.

pub mod conn;
pub mod dispatch;
pub mod parse;
pub mod reply;
pub mod server;

pub use conn::ConnState;
pub use dispatch::{dispatch, dispatch_pipeline, is_write_command, CommandContext};
pub use parse::RespParser;
pub use reply::Reply;
pub use server::{EngineResolver, MutationObserver, RespServer, RespServerConfig};
