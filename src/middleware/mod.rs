pub mod read_limit;
pub mod request_id;
