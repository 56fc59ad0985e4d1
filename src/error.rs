use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("couldn't read '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("XYZ data not found in '{path}'")]
    MissingPositions { path: PathBuf },
    #[error("'{path}' ends before all announced data was read")]
    Truncated { path: PathBuf },
    #[error("triangle index {index} is out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },
    #[error("attribute stream doesn't match the mesh surface (colored vs textured)")]
    SurfaceMismatch,
    #[error("cube map faces must be square and share one resolution")]
    FaceMismatch,
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Obj(#[from] obj::ObjError),
}

pub type Result<T> = std::result::Result<T, Error>;
