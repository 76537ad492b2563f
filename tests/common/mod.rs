pub mod helpers;
pub mod mocks;
