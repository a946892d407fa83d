//! Stats module - reducers for grouped rollups

mod reducer;

pub use reducer::Reducer;
