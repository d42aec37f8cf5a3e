pub mod replay;
pub mod scan;
