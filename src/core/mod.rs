pub mod live;
pub mod relay;

// Re-export commonly used types for convenience
pub use live::{
    GeminiLive, GeminiLiveConfig, LiveConnector, LiveError, LiveProvider, LiveResponse,
    LiveResult, LiveSender, LiveSession, LiveSessionConfig, MediaChunk, ResponsePart,
    create_live_connector,
};

pub use relay::{
    ClientFrame, RelayError, SessionCoordinator, SessionEnd, SessionReport, SessionSettings,
};
