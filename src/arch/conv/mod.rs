pub mod bank;
pub mod core_model;
pub mod drain;
pub mod engine;
pub mod fixed;
pub mod loader;
pub mod mac;
pub mod main;
pub mod mapper;
pub mod reference;
pub mod regs;
pub mod resolver;
pub mod shape;
pub mod window;
pub mod writer;

pub use bank::{BankLayout, BankSet};
pub use engine::{ConvEngine, EngineError, EngineState, EngineStats};
pub use fixed::Q24;
pub use main::create_simulation;
pub use regs::{ConfigError, StartCommand};
pub use shape::FilterShape;
