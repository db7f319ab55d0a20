mod api;
mod lookup;
mod render;
mod utils;

pub use utils::{test_db, test_utils};
