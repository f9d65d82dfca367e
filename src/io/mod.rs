//! File output.

mod g2o;

pub use g2o::{to_g2o_string, write_g2o};
