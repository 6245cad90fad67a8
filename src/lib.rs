pub mod types;
pub mod error;
pub mod parsers;
pub mod kpoints;
pub mod symmetry;
pub mod grid;
pub mod bands;
pub mod isosurface;
pub mod pipeline;
pub mod export;
pub mod settings;
pub mod commands;
pub mod cli;

pub use types::Result;
pub use cli::OptProcess;

pub use error::Error;

pub use parsers::{
    KlistRecord,
    EnergyBlock,
    EigenvalueTable,
    MeshListing,
    RelationRow,
    Lattice,
    Structure,
};

pub use kpoints::{
    IrreducibleKPoint,
    KPointSet,
};

pub use symmetry::{
    SymmetryOperation,
    ExpandedKPoint,
    expand,
    wrap,
};

pub use grid::{
    EnergyGrid,
    trilinear_weights,
};

pub use bands::{
    crossing_bands,
    band_color,
};

pub use isosurface::{
    IsosurfaceMesh,
    extract,
    polygonise,
};

pub use pipeline::{
    CancelFlag,
    CaseFiles,
    GenericInputs,
    OptimizedInputs,
    FermiSurface,
    FermiSurfaceSummary,
    BandSurface,
};

pub use settings::{
    Settings,
    ExportFormat,
};
