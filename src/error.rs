/// Errors raised by the build, load and query paths of this crate.
#[derive(Debug)]
pub enum Error {
    /// `build` was called against an FM-index of length 0.
    EmptyIndex,
    /// A pattern contained a symbol outside `[0, 6)`.
    InvalidChar(u8),
    /// `magic`, row size, checksum or length mismatch while loading a file.
    CorruptFile(String),
    /// Reading or writing the on-disk representation failed.
    Io(std::io::Error),
    /// A `locate_all` φ-chain broke before reaching the start of the
    /// requested interval.
    Incomplete,
    /// The query requires a component that was never built (e.g. matching
    /// statistics without an LCP index).
    Unavailable(&'static str),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::EmptyIndex => write!(f, "cannot build an index over an empty FM-index"),
            Error::InvalidChar(c) => write!(f, "character code {} is outside the alphabet", c),
            Error::CorruptFile(msg) => write!(f, "corrupt file: {}", msg),
            Error::Io(err) => write!(f, "i/o error: {}", err),
            Error::Incomplete => {
                write!(f, "locate chain broke before reaching the interval start")
            }
            Error::Unavailable(what) => write!(f, "{} was not built", what),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
