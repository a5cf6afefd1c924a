mod basic;
mod errors;
mod tools;
