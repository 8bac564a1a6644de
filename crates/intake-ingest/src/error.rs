#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a file: {0}")]
    NotAFile(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unreadable archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("archive nesting exceeds {0} levels")]
    TooDeep(usize),

    #[error("nested archive of {size} bytes exceeds {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },
}
