//! Rename services used by the watcher loop, the HTTP routes, and the CLI.
//!
//! ARCHITECTURE
//! ============
//! `pass` owns the read/plan/rename/persist cycle; `scheduler` decides when
//! passes run and funnels every trigger through one worker so passes never
//! overlap.

pub mod pass;
pub mod scheduler;
