pub mod inputs;
pub mod outputs;

pub use inputs::UploadReceiptQuery;
pub use outputs::{CategoryResponse, ReceiptResponse};
