pub mod derivation;
pub mod propagation;
