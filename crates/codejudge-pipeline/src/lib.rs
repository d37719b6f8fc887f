pub mod adjudication;
pub mod aggregator;
mod orchestrator;
pub mod prompts;
pub mod retry;
pub mod sandbox;
pub mod segmenter;
pub mod synthesis;

pub use adjudication::{AdjudicationClient, AdjudicationRequest, LlmAdjudicator};
pub use aggregator::{aggregate, VerdictSink};
pub use orchestrator::Orchestrator;
pub use sandbox::{PistonClient, SandboxExecutionClient};
pub use segmenter::segment;
pub use synthesis::{CodeSynthesisClient, LlmSynthesizer, SynthesisRequest, SynthesizedDriver};

pub use tokio_util::sync::CancellationToken;
