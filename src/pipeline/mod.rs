// Batch pipeline: shared data layout, batch selection, tabular core and processing stages

pub mod frame;
pub mod layout;
pub mod locator;
pub mod processing;

pub use frame::{Cell, Frame};
pub use layout::DataLayout;
pub use locator::{BatchLocator, RecencyOrder};
