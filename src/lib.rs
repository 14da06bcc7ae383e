/*!
Interactive ink simulation on a fixed 2D grid using the "stable fluids" method.

The solver core lives in the simulation modules (re-exported at the crate
root); the platform layer adds the command line runner and the viewer.
*/

mod platform;
mod simulation;

pub use simulation::*;

pub use platform::start;
