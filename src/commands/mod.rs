pub mod extract;
pub mod view;
