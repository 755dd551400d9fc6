pub mod batch;
pub mod interactive;

pub use batch::{run_batch, BatchOutput};
pub use interactive::{
    prepare_payload, validate_target, ExecutionOutcome, ExecutionReport, InteractiveRunner,
    MAX_PAYLOAD_BYTES, MAX_TRANSCRIPT_BYTES,
};
