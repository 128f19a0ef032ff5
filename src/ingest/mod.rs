pub mod hasher;
pub mod scanner;
