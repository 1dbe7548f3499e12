// config.rs — muxing session configuration.
//
// All knobs that influence clustering, block encoding and file splitting
// live here as a plain value type. The defaults match what a stock muxing
// run uses; a front end fills the struct from its own option parsing.

/// Lacing flavor passed down to the block writer.
///
/// `Auto` lets the writer pick per block; the explicit variants force one
/// encoding for streams whose players only cope with a specific one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LacingMode {
    #[default]
    Auto,
    Xiph,
    Ebml,
}

/// Session-wide muxing configuration.
#[derive(Debug, Clone)]
pub struct MuxConfig {
    /// Nanoseconds per on-wire tick. Every ingested timecode is rounded to
    /// this precision.
    pub timecode_scale: u64,
    /// Maximum timecode span a single cluster may cover, in nanoseconds.
    pub max_ns_per_cluster: i64,
    /// Maximum number of blocks per cluster.
    pub max_blocks_per_cluster: u32,
    /// Emit BlockDuration elements even where a default duration would
    /// reconstruct them.
    pub use_durations: bool,
    /// Allow SimpleBlock encoding where nothing forces a full BlockGroup.
    pub use_simpleblock: bool,
    /// Lacing flavor for multi-frame blocks.
    pub lacing: LacingMode,
    /// Write cue (index) entries.
    pub write_cues: bool,
    /// Do not link split output files; each file restarts its timecodes.
    pub no_linking: bool,
    /// Upper bound on the number of output files a split run may produce.
    pub split_max_num_files: u32,
}

impl Default for MuxConfig {
    fn default() -> Self {
        MuxConfig {
            timecode_scale: 1_000_000,
            max_ns_per_cluster: 5_000_000_000,
            max_blocks_per_cluster: 65535,
            use_durations: false,
            use_simpleblock: false,
            lacing: LacingMode::Auto,
            write_cues: true,
            no_linking: true,
            split_max_num_files: 65535,
        }
    }
}
