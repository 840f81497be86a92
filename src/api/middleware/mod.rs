pub mod trace;

pub use trace::{trace_id_middleware, TraceId, TRACE_ID_HEADER};
