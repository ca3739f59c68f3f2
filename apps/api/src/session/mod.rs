// Session workflow: state machine, transcript rendering, and HTTP handlers.
// Handlers hold the session lock for the whole event, so a build and an ask
// on the same session never interleave.

pub mod controller;
pub mod handlers;
pub mod render;
