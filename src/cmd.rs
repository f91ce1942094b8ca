pub mod assume;
