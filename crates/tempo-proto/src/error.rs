use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtoError {
    /// Ran out of bytes mid field.
    #[error("truncated packet")]
    Truncated,
    #[error("series name length {0} out of range")]
    NameLength(usize),
    #[error("series name is not valid utf-8")]
    BadName(#[from] std::string::FromUtf8Error),
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),
}
