mod client;
mod command;

pub use client::{Client, ClientError, Response};
pub use command::{Command, CommandError, CommandKind, Parser};
