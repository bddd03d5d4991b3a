mod expectation;
mod mock;
mod response;

pub use expectation::{Expectation, RequestFilterFn, RequestMapFn};
pub use mock::Mock;
pub use response::{BodyProducer, ResponseFilterFn, ResponseMapFn, ResponseTemplate};
