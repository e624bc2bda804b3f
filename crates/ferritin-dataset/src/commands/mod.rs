pub mod inspect;
pub mod sample;
pub mod subset;
