pub mod pad;
pub mod registry;
