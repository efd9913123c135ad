pub mod records;
pub mod staff;
