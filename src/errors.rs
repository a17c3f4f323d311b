//! Fracture errors

use crate::fracture::ChunkId;
use std::fmt::Display;

/// Everything that can make a fracture operation refuse or abort.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FractureError {
    /// (InvalidChunk) No chunk with this id exists
    InvalidChunk(ChunkId),
    /// (ReplaceSourceChunk) The source chunk cannot be replaced by its fragments
    ReplaceSourceChunk,
    /// (NotEnoughSites) Voronoi fracturing needs at least two sites
    NotEnoughSites(usize),
    /// (UnbalancedBoundary) A facet produced different numbers of boundary starts and ends
    UnbalancedBoundary { facet: usize },
    /// (InvalidMesh) The mesh is missing vertices, edges or facets, or is otherwise unusable
    InvalidMesh(String),
    /// (NoSourceMesh) An operation needs a source mesh but none was set
    NoSourceMesh,
    /// (CutoutSetEmpty) A cutout set holds no usable outline
    CutoutSetEmpty,
    /// (Image) A cutout bitmap could not be read
    Image(String),
}

impl Display for FractureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FractureError::InvalidChunk(id) => write!(f, "(InvalidChunk) No chunk with id {}", id),
            FractureError::ReplaceSourceChunk => write!(f, "(ReplaceSourceChunk) Chunk 0 is the source mesh and cannot be replaced"),
            FractureError::NotEnoughSites(count) => write!(f, "(NotEnoughSites) At least 2 sites are required, got {}", count),
            FractureError::UnbalancedBoundary { facet } => write!(
                f,
                "(UnbalancedBoundary) Not equal number of starting and ending vertices on facet {}! Probably input mesh has open edges.",
                facet
            ),
            FractureError::InvalidMesh(reason) => write!(f, "(InvalidMesh) {}", reason),
            FractureError::NoSourceMesh => write!(f, "(NoSourceMesh) Source mesh is not set"),
            FractureError::CutoutSetEmpty => write!(f, "(CutoutSetEmpty) Cutout set has no outlines"),
            FractureError::Image(reason) => write!(f, "(Image) {}", reason),
        }
    }
}
