//! The closed error-kind set for the file-container core.
//!
//! Every surface operation in this crate returns this single `Error` type.
//! No kind is locally recovered here; the one exception is the superblock
//! signature probe, which treats a miss at a single candidate offset as
//! "keep searching" and only ever surfaces [`Error::NotHdf5`] once every
//! candidate has been exhausted.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    Io(#[from] std::io::Error),
    NotHdf5,
    BadValue(String),
    BadRange(String),
    Truncated,
    CantInit(String),
    CantOpen(String),
    Unsupported(&'static str),
    CantGet(String),
    CantSet(String),
    CantCreate(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
