// Load modules
mod distances;
mod kernel_configuration;
mod kernel_matrices;

// Expose functions to public
pub use distances::distance_matrix;

// Expose structs to public
pub use kernel_configuration::KernelConfiguration;
pub use kernel_matrices::{ElectrodeKernel, KernelMatrices};
