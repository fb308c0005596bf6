pub mod error;
pub mod partition_score;
pub mod schema;
pub mod stream;

pub use error::ResultsError;
pub use partition_score::PartitionScore;
pub use schema::results;
pub use stream::{Readable, StreamInput, StreamOutput, Writeable};
