pub mod capture;
pub mod manifest;
pub mod planner;
pub mod prune;
pub mod selector;
pub mod workdir;
