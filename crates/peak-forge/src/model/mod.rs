pub mod assignment;
pub mod coords;
pub mod diagnostic;
pub mod dimension;
pub mod peak;
pub mod reparse;
pub mod shifts;
pub mod transfer;
pub mod types;
pub mod value;
