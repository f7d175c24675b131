pub mod finding;
pub mod scan_result;
pub mod verdict;
pub mod report;

pub use finding::*;
pub use scan_result::*;
pub use verdict::*;
pub use report::*;
