pub mod filter;
pub mod hasher;
pub mod parallel;
pub mod reader;
