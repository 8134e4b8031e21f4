/// One scheduled invocation of a transaction type.
///
/// `start_time_ns` is stamped when the item is *submitted* to the work
/// queue, not when a worker picks it up, so measured latency includes
/// queue delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmittedProcedure {
    pub type_id: usize,
    pub start_time_ns: u64,
}

impl SubmittedProcedure {
    pub fn new(type_id: usize, start_time_ns: u64) -> Self {
        Self {
            type_id,
            start_time_ns,
        }
    }
}
