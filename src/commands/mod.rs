pub mod run;
pub mod status;
pub mod steps;
