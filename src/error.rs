//! Error types shared across the engine.

use thiserror::Error;

use crate::stars::CatalogError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    /// The J2000 reference instant could not be resolved. Nothing can be
    /// positioned without it.
    #[error("could not resolve the J2000 epoch")]
    Epoch,

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
