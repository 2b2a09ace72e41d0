mod launchpad;
mod pipeline;

pub use launchpad::{LaunchReceipt, Launchpad};
pub use pipeline::{ConfirmPolicy, SubmissionPipeline};
