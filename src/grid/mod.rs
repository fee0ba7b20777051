// Load modules
mod build_grids;
mod estimation_grid;
mod source_grid;

// Expose to public
pub use build_grids::build_grids;
pub use estimation_grid::EstimationGrid;
pub use source_grid::SourceGrid;
