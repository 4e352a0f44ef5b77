// Chunk stream channels used by this client
pub const CONTROL_CHANNEL: u32 = 2;
pub const COMMAND_CHANNEL: u32 = 3;
pub const STREAM_CHANNEL: u32 = 5;

// Default values
pub const DEFAULT_CHUNK_SIZE: u32 = 128;
pub const DEFAULT_WINDOW_ACK_SIZE: u32 = 2_500_000;

// Buffer length (ms) requested for played streams
pub const STREAM_BUFFER_LENGTH_MS: u32 = 5000;

// Play command arguments: start from the current live position, play
// a live stream or recorded stream by name
pub const PLAY_START_LIVE: f64 = 0.0;
pub const PLAY_DURATION_UNTIL_END: f64 = -2.0;

// Connect command capability flags
pub const CAPABILITIES: f64 = 239.0;
pub const AUDIO_CODECS: f64 = 3575.0;
pub const VIDEO_CODECS: f64 = 252.0;
pub const VIDEO_FUNCTION: f64 = 1.0;
pub const FLASH_VERSION: &str = "LNX 11,2,202,233";
