//! # monocast-host — Display Mirror Daemon
//!
//! Runs on (or beside) the device whose monochrome panel is being
//! mirrored. Serves any number of TCP viewers, streams frame updates
//! through `monocast-core`'s engine, and feeds control-channel button
//! events back into the application as if a physical button had fired.
//!
//! The bundled demo scene stands in for the real device application;
//! anything that can render into a packed 1-bpp buffer can take its
//! place.

pub mod config;
pub mod scene;
pub mod service;
