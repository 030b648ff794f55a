pub mod analyzers;
pub mod config;
pub mod fetch;
pub mod inspections;
pub mod output;
pub mod pipeline;
pub mod present;
pub mod regions;
pub mod stats;
