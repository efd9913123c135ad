pub mod order;
pub mod order_request;

pub use order::{Order, PromotionForm};
pub use order_request::{OrderRequest, PatientSubmission};
