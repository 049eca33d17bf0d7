//! Bundled example problems.

pub mod cartpole;

pub use cartpole::CartPole;
