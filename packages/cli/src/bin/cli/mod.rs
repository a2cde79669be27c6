pub mod atoms;
pub mod run;
