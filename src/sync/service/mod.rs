pub mod api;
pub mod file_client;
pub mod mock;

pub use api::{Completion, DataService, RequestId, ServiceReply};
pub use file_client::FileDataService;
pub use mock::MockDataService;
