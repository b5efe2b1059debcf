pub mod args;
pub mod errors;
pub mod ext;
pub mod interceptor;
pub mod record;
pub mod scan;
pub mod session;
pub mod utils;
