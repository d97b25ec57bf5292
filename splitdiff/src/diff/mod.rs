//! Table by table comparison of the rows held by the source and destination worker tablets.

pub mod differ;
pub mod pipeline;
pub mod report;
pub mod row;
pub mod scan;
