pub mod assets;
pub mod geometry;
pub mod input;     // Key mapping and release emulation
pub mod page;
pub mod protocol;  // JSON envelope shared with the server
pub mod raster;
pub mod renderer;
pub mod snapshot;
pub mod sprite;
pub mod surface;   // Drawing surface and recorded draw lists
pub mod terminal;  // Terminal session and canvas widget
