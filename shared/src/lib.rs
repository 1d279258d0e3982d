pub mod boundary;
pub mod colors;
pub mod grid;
pub mod hex;
pub mod lighting;
pub mod overlay;

pub use boundary::BoundarySet;
pub use colors::{faction_color, parse_hex_color};
pub use grid::{HexGridIndex, HexTile, parse_grid_dataset};
pub use hex::{Contour, HexId, find_shared_edge_index, make_id, neighbors};
pub use lighting::LightingModel;
pub use overlay::*;
