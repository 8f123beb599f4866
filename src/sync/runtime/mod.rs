pub mod orchestrator;
pub mod presenter;

pub use orchestrator::ListOrchestrator;
pub use presenter::{render, ConsolePresenter, Presenter};
