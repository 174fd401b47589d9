//! The loader's own systems: settings and the files it keeps on disk. These don't touch the game.

pub mod resources;
pub mod settings;
