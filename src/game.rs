//! Code for game systems.

pub mod mods;
